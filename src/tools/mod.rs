//! # Tool Trait
//!
//! This module defines the `Tool` trait implemented by the five tools offered to the
//! model, and the argument parsing they share.

use crate::context::ExecutionContext;
use crate::error::AgentError;
use crate::message::FunctionDescription;
use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;

pub mod ask_question;
pub mod get_file_contents;
pub mod modify_files;
pub mod run_command;
pub mod task_complete;
pub use self::ask_question::AskQuestionTool;
pub use self::get_file_contents::GetFileContentsTool;
pub use self::modify_files::ModifyFilesTool;
pub use self::run_command::RunCommandTool;
pub use self::task_complete::TaskCompleteTool;

/// What a tool hands back to the agent loop: the content of the tool-result message,
/// and whether the call marks the task as finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: String,
    pub completes_task: bool,
}

impl ToolOutput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            completes_task: false,
        }
    }
}

/// A trait representing a self-contained, executable tool.
///
/// This trait is designed to be object-safe, allowing for dynamic dispatch
/// via `Box<dyn Tool>`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique, static name of the tool.
    fn name(&self) -> &'static str;

    /// Returns the JSON schema for the tool's arguments, used by the LLM.
    fn schema(&self) -> FunctionDescription;

    /// Parses the raw argument text, performs the side effect (asking the user
    /// first where required) and returns the result for the model.
    ///
    /// Anything the model should adapt to, such as a declined confirmation, an
    /// unreadable file or a failing command, is part of the returned content.
    /// An `Err` aborts the whole run.
    async fn execute(&self, arguments: &str, ctx: &mut ExecutionContext) -> Result<ToolOutput>;
}

/// Deserializes a tool's arguments. Models sometimes send an empty string for
/// tools without parameters, which is read as `{}`.
pub fn parse_arguments<T: DeserializeOwned>(tool: &str, arguments: &str) -> Result<T> {
    let arguments = if arguments.trim().is_empty() {
        "{}"
    } else {
        arguments
    };
    serde_json::from_str(arguments).map_err(|source| {
        AgentError::ArgumentParse {
            tool: tool.to_string(),
            source,
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    struct Args {
        command: String,
    }

    #[test]
    fn test_parse_arguments_reports_tool_name() {
        let err = parse_arguments::<Args>("run_command", "{\"cmd\": \"ls\"}").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgentError>(),
            Some(AgentError::ArgumentParse { tool, .. }) if tool == "run_command"
        ));
    }

    #[test]
    fn test_parse_arguments_accepts_valid_json() {
        let args: Args = parse_arguments("run_command", "{\"command\": \"ls -la\"}").unwrap();
        assert_eq!(args.command, "ls -la");
    }
}
