//! # Turn Collection
//!
//! Requests one model turn and turns it into a single assistant message, in either
//! plain or streaming mode, while a spinner shows that the request is alive.

use crate::client::ModelBackend;
use crate::context::ExecutionContext;
use crate::error::AgentError;
use crate::message::{
    ChatCompletionChunk, ChatCompletionRequest, Message, ToolCall, ToolCallDelta,
};
use anyhow::Result;
use console::style;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::debug;

const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];
const SPINNER_INTERVAL: Duration = Duration::from_millis(100);

/// Merges streamed fragments into one assistant message.
///
/// Tool-call fragments are keyed by their index, so fragments may arrive in any
/// order and indices may have gaps. The id and name are taken from the first
/// fragment that carries them; argument pieces are appended in arrival order.
#[derive(Debug, Default)]
pub struct StreamCollector {
    content: String,
    tool_calls: BTreeMap<usize, ToolCall>,
}

impl StreamCollector {
    /// Adds one chunk. Returns `true` once the chunk carries a finish signal.
    pub fn push(&mut self, chunk: &ChatCompletionChunk) -> bool {
        let Some(choice) = chunk.choices.first() else {
            return false;
        };
        if let Some(text) = &choice.delta.content {
            self.content.push_str(text);
        }
        for delta in choice.delta.tool_calls.iter().flatten() {
            self.merge(delta);
        }
        choice.finish_reason.is_some()
    }

    fn merge(&mut self, delta: &ToolCallDelta) {
        let entry = self
            .tool_calls
            .entry(delta.index)
            .or_insert_with(|| ToolCall::new("", "", ""));
        if let Some(id) = &delta.id {
            if entry.id.is_empty() {
                entry.id = id.clone();
            }
        }
        if let Some(function) = &delta.function {
            if let Some(name) = &function.name {
                if entry.function_call.name.is_empty() {
                    entry.function_call.name = name.clone();
                }
            }
            if let Some(arguments) = &function.arguments {
                entry.function_call.arguments.push_str(arguments);
            }
        }
    }

    /// The assembled message, with tool calls ordered by index.
    pub fn finish(self) -> Message {
        Message::assistant(self.content, self.tool_calls.into_values().collect())
    }
}

/// The `Executing AI request...` progress line, redrawn on a fixed wall-clock cadence.
pub struct Spinner {
    started: Instant,
    frame: usize,
    ticker: Interval,
}

impl Spinner {
    pub fn start() -> Self {
        let mut ticker = tokio::time::interval(SPINNER_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            started: Instant::now(),
            frame: 0,
            ticker,
        }
    }

    /// Drives `future` to completion, redrawing the spinner on every tick meanwhile.
    pub async fn run<F: Future>(
        &mut self,
        future: F,
        ctx: &mut ExecutionContext,
    ) -> Result<F::Output> {
        tokio::pin!(future);
        loop {
            tokio::select! {
                output = &mut future => return Ok(output),
                _ = self.ticker.tick() => self.draw(ctx)?,
            }
        }
    }

    fn draw(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let frame = SPINNER_FRAMES[self.frame % SPINNER_FRAMES.len()];
        self.frame += 1;
        let line = format!("Executing AI request... {frame} ({:.1} s)", self.elapsed());
        write!(ctx.output, "\r{}", style(line).cyan())?;
        ctx.output.flush()?;
        Ok(())
    }

    pub fn finish(self, ctx: &mut ExecutionContext) -> Result<()> {
        let line = format!("Executing AI request... ✓ ({:.1} s)", self.elapsed());
        ctx.println(format!("\r{}", style(line).green()))
    }

    fn elapsed(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/// Requests one model turn and returns the assistant message it produced.
///
/// In plain mode the request runs as a background task; in streaming mode the
/// chunks are pulled and merged as they arrive. Both render the same way.
pub async fn collect_turn(
    backend: &Arc<dyn ModelBackend>,
    request: ChatCompletionRequest,
    stream: bool,
    ctx: &mut ExecutionContext,
) -> Result<Message> {
    let mut spinner = Spinner::start();
    let message = if stream {
        collect_streamed(backend, request, &mut spinner, ctx).await?
    } else {
        collect_plain(backend, request, &mut spinner, ctx).await?
    };
    spinner.finish(ctx)?;

    debug!(
        content_len = message.content.len(),
        tool_calls = message.tool_calls().len(),
        "model turn collected"
    );
    if !message.content.is_empty() {
        ctx.println(style("\nModel message:").blue())?;
        ctx.println(format!("{}\n", message.content))?;
    }
    Ok(message)
}

async fn collect_plain(
    backend: &Arc<dyn ModelBackend>,
    request: ChatCompletionRequest,
    spinner: &mut Spinner,
    ctx: &mut ExecutionContext,
) -> Result<Message> {
    let backend = Arc::clone(backend);
    let handle = tokio::spawn(async move { backend.chat_completion(request).await });
    let response = spinner
        .run(handle, ctx)
        .await?
        .map_err(|e| AgentError::Backend(e.to_string()))??;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(AgentError::NoChoices)?;
    let message = choice.message;
    Ok(Message::assistant(
        message.content,
        message.tool_calls.unwrap_or_default(),
    ))
}

async fn collect_streamed(
    backend: &Arc<dyn ModelBackend>,
    request: ChatCompletionRequest,
    spinner: &mut Spinner,
    ctx: &mut ExecutionContext,
) -> Result<Message> {
    let mut chunks = spinner
        .run(backend.chat_completion_stream(request), ctx)
        .await??;

    let mut collector = StreamCollector::default();
    while let Some(chunk) = spinner.run(chunks.next(), ctx).await? {
        if collector.push(&chunk?) {
            break;
        }
    }
    Ok(collector.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChunkStream;
    use crate::context::testing::scripted_context;
    use crate::message::ChatCompletionResponse;
    use async_trait::async_trait;
    use futures::stream;
    use serde_json::json;
    use tempfile::Builder;

    fn chunk(value: serde_json::Value) -> ChatCompletionChunk {
        serde_json::from_value(value).unwrap()
    }

    fn fragmented_turn() -> Vec<ChatCompletionChunk> {
        vec![
            chunk(json!({"choices": [{"delta": {"content": "Reading "}}]})),
            chunk(json!({"choices": [{"delta": {"content": "files.", "tool_calls": [
                {"index": 0, "id": "call_a", "function": {"name": "get_file_contents", "arguments": "{\"fi"}}
            ]}}]})),
            chunk(json!({"choices": [{"delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": "les\": [\"a.txt\"]}"}}
            ]}}]})),
            chunk(json!({"choices": [{"delta": {"tool_calls": [
                {"index": 1, "id": "call_b", "function": {"name": "task_complete", "arguments": ""}}
            ]}}]})),
            chunk(json!({"choices": [{"delta": {"tool_calls": [
                {"index": 1, "function": {"arguments": "{}"}}
            ]}, "finish_reason": "tool_calls"}]})),
        ]
    }

    fn complete_turn() -> Message {
        Message::assistant(
            "Reading files.",
            vec![
                ToolCall::new("call_a", "get_file_contents", "{\"files\": [\"a.txt\"]}"),
                ToolCall::new("call_b", "task_complete", "{}"),
            ],
        )
    }

    struct ScriptedBackend;

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        async fn chat_completion(
            &self,
            _request: ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse> {
            Ok(serde_json::from_value(json!({
                "choices": [{"message": serde_json::to_value(complete_turn()).unwrap(),
                             "finish_reason": "tool_calls"}]
            }))?)
        }

        async fn chat_completion_stream(
            &self,
            _request: ChatCompletionRequest,
        ) -> Result<ChunkStream> {
            Ok(stream::iter(fragmented_turn().into_iter().map(Ok)).boxed())
        }
    }

    struct EmptyBackend;

    #[async_trait]
    impl ModelBackend for EmptyBackend {
        async fn chat_completion(
            &self,
            _request: ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse> {
            Ok(serde_json::from_value(json!({"choices": []}))?)
        }

        async fn chat_completion_stream(
            &self,
            _request: ChatCompletionRequest,
        ) -> Result<ChunkStream> {
            Ok(stream::empty().boxed())
        }
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "test-model".to_string(),
            messages: vec![Message::user("hi")],
            tools: Vec::new(),
            stream: None,
        }
    }

    #[test]
    fn test_collector_merges_fragments_by_index() {
        let mut collector = StreamCollector::default();
        let turn = fragmented_turn();
        let finished: Vec<bool> = turn.iter().map(|c| collector.push(c)).collect();

        assert_eq!(finished, vec![false, false, false, false, true]);
        assert_eq!(collector.finish(), complete_turn());
    }

    #[test]
    fn test_collector_tolerates_out_of_order_and_sparse_indices() {
        let mut collector = StreamCollector::default();
        collector.push(&chunk(json!({"choices": [{"delta": {"tool_calls": [
            {"index": 4, "id": "call_late", "function": {"name": "run_command", "arguments": "{\"command\":"}}
        ]}}]})));
        collector.push(&chunk(json!({"choices": [{"delta": {"tool_calls": [
            {"index": 2, "function": {"arguments": "{}"}},
            {"index": 4, "function": {"arguments": "\"ls\"}"}}
        ]}}]})));
        collector.push(&chunk(json!({"choices": [{"delta": {"tool_calls": [
            {"index": 2, "id": "call_early", "function": {"name": "task_complete"}}
        ]}}]})));

        let message = collector.finish();
        let calls = message.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], ToolCall::new("call_early", "task_complete", "{}"));
        assert_eq!(
            calls[1],
            ToolCall::new("call_late", "run_command", "{\"command\":\"ls\"}")
        );
    }

    #[test]
    fn test_text_only_stream_has_no_tool_calls() {
        let mut collector = StreamCollector::default();
        collector.push(&chunk(json!({"choices": [{"delta": {"content": "All done!"}}]})));
        let message = collector.finish();
        assert_eq!(message.content, "All done!");
        assert!(message.tool_calls.is_none());
    }

    #[tokio::test]
    async fn test_streamed_and_plain_turns_are_equivalent() {
        let tmp_dir = Builder::new().prefix("turn-test-").tempdir().unwrap();
        let backend: Arc<dyn ModelBackend> = Arc::new(ScriptedBackend);

        let (mut ctx, streamed_out, _) = scripted_context(tmp_dir.path(), false, "");
        let streamed = collect_turn(&backend, request(), true, &mut ctx).await.unwrap();
        let (mut ctx, plain_out, _) = scripted_context(tmp_dir.path(), false, "");
        let plain = collect_turn(&backend, request(), false, &mut ctx).await.unwrap();

        assert_eq!(streamed, plain);
        assert_eq!(streamed, complete_turn());
        for printed in [streamed_out.contents(), plain_out.contents()] {
            assert!(printed.contains("✓"));
            assert!(printed.contains("Model message:"));
            assert!(printed.contains("Reading files."));
        }
    }

    #[tokio::test]
    async fn test_plain_turn_without_choices_is_an_error() {
        let tmp_dir = Builder::new().prefix("turn-test-").tempdir().unwrap();
        let backend: Arc<dyn ModelBackend> = Arc::new(EmptyBackend);
        let (mut ctx, _, _) = scripted_context(tmp_dir.path(), false, "");

        let err = collect_turn(&backend, request(), false, &mut ctx)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AgentError>(),
            Some(AgentError::NoChoices)
        ));
    }

    #[tokio::test]
    async fn test_stream_ending_without_finish_signal_yields_empty_turn() {
        let tmp_dir = Builder::new().prefix("turn-test-").tempdir().unwrap();
        let backend: Arc<dyn ModelBackend> = Arc::new(EmptyBackend);
        let (mut ctx, stdout, _) = scripted_context(tmp_dir.path(), false, "");

        let message = collect_turn(&backend, request(), true, &mut ctx).await.unwrap();

        assert_eq!(message, Message::assistant("", Vec::new()));
        assert!(!stdout.contents().contains("Model message:"));
    }
}
