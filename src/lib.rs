pub mod agent;
pub mod backend;
pub mod cli;
pub mod client;
pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod ignore_patterns;
pub mod logging;
pub mod message;
pub mod snapshot;
pub mod streaming_executor;
pub mod task_source;
pub mod tool_collection;
pub mod tools;

pub use agent::{Agent, CompletionReason, RunSummary};
pub use config::Config;
pub use context::ExecutionContext;
pub use error::AgentError;
pub use tool_collection::ToolCollection;
