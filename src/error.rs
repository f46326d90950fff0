use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a run. Everything else (declined confirmations, unreadable
/// files in a read batch, failing shell commands) is reported back to the model as
/// ordinary tool output.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid arguments for tool `{tool}`")]
    ArgumentParse {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("model backend request failed: {0}")]
    Backend(String),

    #[error("no choices returned by the model")]
    NoChoices,

    #[error("filesystem operation failed on {}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("turn limit of {0} reached before the task completed")]
    TurnLimit(usize),
}
