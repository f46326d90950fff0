use crate::context::ExecutionContext;
use crate::message::FunctionDescription;
use crate::tools::{Tool, ToolOutput};
use anyhow::Result;
use async_trait::async_trait;

pub const ACKNOWLEDGED: &str = "Task completion acknowledged";

/// Lets the model declare the task finished. Arguments are ignored.
pub struct TaskCompleteTool;

#[async_trait]
impl Tool for TaskCompleteTool {
    fn name(&self) -> &'static str {
        "task_complete"
    }

    fn schema(&self) -> FunctionDescription {
        FunctionDescription {
            name: self.name().to_string(),
            description: "Mark the task as completed".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    async fn execute(&self, _arguments: &str, _ctx: &mut ExecutionContext) -> Result<ToolOutput> {
        Ok(ToolOutput {
            content: ACKNOWLEDGED.to_string(),
            completes_task: true,
        })
    }
}
