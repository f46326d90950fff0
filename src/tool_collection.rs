//! # Tool Collection
//!
//! The `ToolCollection` is the registry of tools offered to the model. It hands out
//! their definitions for each request and dispatches tool calls to the matching
//! implementation by name.

use crate::{
    config::Config,
    context::ExecutionContext,
    error::AgentError,
    message::{Message, ToolCall, ToolDefinition},
    tools::{
        AskQuestionTool, GetFileContentsTool, ModifyFilesTool, RunCommandTool, TaskCompleteTool,
        Tool,
    },
};
use anyhow::Result;
use console::style;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// The result of dispatching one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// The tool-result message answering the call.
    pub message: Message,
    pub completes_task: bool,
}

/// A collection responsible for registering and dispatching tool calls.
pub struct ToolCollection {
    tools: Vec<Box<dyn Tool>>,
    by_name: HashMap<&'static str, usize>,
}

impl ToolCollection {
    /// Creates a new, empty `ToolCollection`.
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// The five tools of an agent run, in the order they are offered to the model.
    pub fn standard() -> Self {
        let mut collection = Self::new();
        collection.register(Box::new(GetFileContentsTool));
        collection.register(Box::new(ModifyFilesTool));
        collection.register(Box::new(RunCommandTool));
        collection.register(Box::new(AskQuestionTool));
        collection.register(Box::new(TaskCompleteTool));
        collection
    }

    /// Registers a new tool, replacing any earlier tool of the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        match self.by_name.get(tool.name()) {
            Some(&index) => self.tools[index] = tool,
            None => {
                self.by_name.insert(tool.name(), self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Gathers the definitions of all registered tools to be sent to the LLM.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition::Function {
                function: tool.schema(),
            })
            .collect()
    }

    /// Executes one tool call and returns the tool-result message answering it.
    ///
    /// Unknown tool names, malformed arguments and fatal handler failures are
    /// returned as errors; they end the run.
    pub async fn dispatch(
        &self,
        tool_call: &ToolCall,
        config: &Config,
        ctx: &mut ExecutionContext,
    ) -> Result<DispatchOutcome> {
        let function_name = tool_call.name();
        let arguments = &tool_call.function_call.arguments;

        let tool = self
            .by_name
            .get(function_name)
            .map(|&index| &self.tools[index])
            .ok_or_else(|| AgentError::UnknownTool(function_name.to_string()))?;

        debug!(tool = function_name, id = %tool_call.id, "dispatching tool call");
        ctx.println(style(format!("Tool: {function_name}")).magenta().bold())?;
        if config.debug_tool_calls {
            let pretty_args = serde_json::from_str::<Value>(arguments)
                .and_then(|value| serde_json::to_string_pretty(&value))
                .unwrap_or_else(|_| arguments.clone());
            ctx.println(style(pretty_args).dim())?;
        }

        let output = tool.execute(arguments, ctx).await?;

        if config.debug_tool_calls {
            ctx.println(style(format!("Tool output:\n{}", output.content)).dim())?;
        }

        Ok(DispatchOutcome {
            message: Message::tool_result(tool_call.id.clone(), output.content),
            completes_task: output.completes_task,
        })
    }
}

impl Default for ToolCollection {
    fn default() -> Self {
        Self::new()
    }
}
