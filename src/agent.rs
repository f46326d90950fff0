//! # Agent Loop
//!
//! Drives one task from the initial prompt to completion. The loop is a small state
//! machine: a model turn either ends the task or produces tool calls, which are
//! dispatched in order before the next turn is requested.

use crate::client::ModelBackend;
use crate::config::Config;
use crate::context::ExecutionContext;
use crate::error::AgentError;
use crate::ignore_patterns::IgnorePatterns;
use crate::message::{ChatCompletionRequest, Conversation, Message, ToolCall};
use crate::snapshot::build_snapshot;
use crate::streaming_executor::collect_turn;
use crate::tool_collection::ToolCollection;
use anyhow::Result;
use console::style;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Words in a tool-free reply that mean the model considers the task finished.
pub const COMPLETION_KEYWORDS: [&str; 3] = ["done", "complete", "finished"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// The model called `task_complete`.
    TaskCompleteTool,
    /// The model replied without tool calls and with a completion keyword.
    CompletionKeyword,
    /// The model replied without tool calls and without a completion keyword.
    EmptyResponse,
}

#[derive(Debug)]
pub enum AgentState {
    AwaitingModel,
    DispatchingTools(Vec<ToolCall>),
    Completed(CompletionReason),
    /// A fatal error ended the run; it is returned from `Agent::execute`.
    Failed(anyhow::Error),
}

/// The state after a model turn produced `message`.
pub fn next_state_after_turn(message: &Message) -> AgentState {
    let tool_calls = message.tool_calls();
    if !tool_calls.is_empty() {
        return AgentState::DispatchingTools(tool_calls.to_vec());
    }
    let content = message.content.to_lowercase();
    if COMPLETION_KEYWORDS.iter().any(|k| content.contains(k)) {
        AgentState::Completed(CompletionReason::CompletionKeyword)
    } else {
        AgentState::Completed(CompletionReason::EmptyResponse)
    }
}

/// The state after a whole batch of tool calls was dispatched.
pub fn next_state_after_dispatch(task_complete_called: bool) -> AgentState {
    if task_complete_called {
        AgentState::Completed(CompletionReason::TaskCompleteTool)
    } else {
        AgentState::AwaitingModel
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub reason: CompletionReason,
    /// Number of model turns requested.
    pub turns: usize,
    pub conversation: Conversation,
}

pub struct Agent {
    pub config: Config,
    backend: Arc<dyn ModelBackend>,
    tools: Arc<ToolCollection>,
}

impl Agent {
    pub fn new(
        config: Config,
        backend: Arc<dyn ModelBackend>,
        tools: Arc<ToolCollection>,
    ) -> Self {
        Self {
            config,
            backend,
            tools,
        }
    }

    /// The system prompt plus the project structure and task as the first user message.
    pub fn initial_conversation(
        &self,
        task: &str,
        ctx: &ExecutionContext,
    ) -> Result<Conversation> {
        let patterns = IgnorePatterns::load(&ctx.root)?;
        let structure = build_snapshot(&ctx.root, &patterns, self.config.snippet_max_lines)?;
        Ok(Conversation::new(
            &self.config.system_prompt,
            format!("Project structure:\n{structure}\n\nTask: {task}"),
        ))
    }

    /// Runs `task` until the model completes it. A fatal error moves the loop to
    /// `Failed` and is returned as is.
    pub async fn execute(&self, task: &str, ctx: &mut ExecutionContext) -> Result<RunSummary> {
        let mut conversation = self.initial_conversation(task, ctx)?;
        let mut state = AgentState::AwaitingModel;
        let mut turns = 0;

        loop {
            state = match state {
                AgentState::AwaitingModel => self
                    .await_model(&mut conversation, &mut turns, ctx)
                    .await
                    .unwrap_or_else(AgentState::Failed),
                AgentState::DispatchingTools(tool_calls) => self
                    .dispatch_batch(&tool_calls, &mut conversation, ctx)
                    .await
                    .unwrap_or_else(AgentState::Failed),
                AgentState::Completed(reason) => {
                    info!(?reason, turns, "task finished");
                    match reason {
                        CompletionReason::EmptyResponse => ctx.eprintln(
                            style("Empty response from AI, exiting...").yellow(),
                        )?,
                        _ => ctx.println(style("Task completed!").green().bold())?,
                    }
                    return Ok(RunSummary {
                        reason,
                        turns,
                        conversation,
                    });
                }
                AgentState::Failed(error) => {
                    warn!(turns, error = %error, "task failed");
                    return Err(error);
                }
            };
            debug!(turn = turns, ?state, "agent state");
        }
    }

    async fn await_model(
        &self,
        conversation: &mut Conversation,
        turns: &mut usize,
        ctx: &mut ExecutionContext,
    ) -> Result<AgentState> {
        if self.config.max_turns > 0 && *turns >= self.config.max_turns {
            return Err(AgentError::TurnLimit(self.config.max_turns).into());
        }
        *turns += 1;
        let message = self.request_turn(conversation, ctx).await?;
        let next = next_state_after_turn(&message);
        conversation.push(message);
        Ok(next)
    }

    /// Runs every call of the batch in order, answering each with one tool message.
    async fn dispatch_batch(
        &self,
        tool_calls: &[ToolCall],
        conversation: &mut Conversation,
        ctx: &mut ExecutionContext,
    ) -> Result<AgentState> {
        let mut task_complete_called = false;
        for tool_call in tool_calls {
            let outcome = self.tools.dispatch(tool_call, &self.config, ctx).await?;
            task_complete_called |= outcome.completes_task;
            conversation.push(outcome.message);
        }
        Ok(next_state_after_dispatch(task_complete_called))
    }

    async fn request_turn(
        &self,
        conversation: &Conversation,
        ctx: &mut ExecutionContext,
    ) -> Result<Message> {
        if self.config.print_messages {
            ctx.println("")?;
            ctx.println(style("Messages being sent to API:").yellow().bold())?;
            for message in conversation.messages() {
                let message_json = serde_json::to_string_pretty(message)
                    .unwrap_or_else(|e| format!("Failed to serialize message: {e}"));
                ctx.println(message_json)?;
            }
            ctx.println("")?;
        }

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: conversation.messages().to_vec(),
            tools: self.tools.definitions(),
            stream: None,
        };
        collect_turn(&self.backend, request, self.config.stream, ctx).await
    }
}
