use anyhow::Result;
use async_trait::async_trait;
use errand::{
    Agent, AgentError, CompletionReason, Config, ExecutionContext, ToolCollection,
    client::{ChunkStream, ModelBackend},
    message::{
        ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, Message, Role,
        ToolCall,
    },
};
use futures::StreamExt;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::Builder;

/// Plays back prepared assistant turns and records every request it receives.
struct ScriptedBackend {
    turns: Mutex<VecDeque<Message>>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl ScriptedBackend {
    fn new(turns: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn next_turn(&self, request: ChatCompletionRequest) -> Message {
        self.requests.lock().unwrap().push(request);
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .expect("the agent requested more turns than scripted")
    }

    fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        let message = self.next_turn(request);
        Ok(serde_json::from_value(json!({
            "choices": [{ "message": message, "finish_reason": "stop" }]
        }))?)
    }

    async fn chat_completion_stream(&self, request: ChatCompletionRequest) -> Result<ChunkStream> {
        let message = self.next_turn(request);
        Ok(futures::stream::iter(into_chunks(&message).into_iter().map(Ok)).boxed())
    }
}

/// Splits a turn into fragments the way a streaming API sends them: text first,
/// then every tool call's arguments in two pieces, then the finish signal.
fn into_chunks(message: &Message) -> Vec<ChatCompletionChunk> {
    let mut chunks = Vec::new();
    let mut push = |delta: Value, finish_reason: Option<&str>| {
        let chunk = json!({ "choices": [{ "delta": delta, "finish_reason": finish_reason }] });
        chunks.push(serde_json::from_value::<ChatCompletionChunk>(chunk).unwrap());
    };

    if !message.content.is_empty() {
        push(json!({ "content": message.content }), None);
    }
    for (index, call) in message.tool_calls().iter().enumerate() {
        let arguments = &call.function_call.arguments;
        let mid = (0..=arguments.len() / 2)
            .rev()
            .find(|&i| arguments.is_char_boundary(i))
            .unwrap_or(0);
        let (head, tail) = arguments.split_at(mid);
        push(
            json!({ "tool_calls": [{
                "index": index,
                "id": call.id,
                "function": { "name": call.name(), "arguments": head }
            }]}),
            None,
        );
        push(
            json!({ "tool_calls": [{ "index": index, "function": { "arguments": tail } }] }),
            None,
        );
    }
    push(json!({}), Some("stop"));
    chunks
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn context(root: &Path, auto_confirm: bool, input: &str) -> (ExecutionContext, SharedBuffer) {
    let output = SharedBuffer::default();
    let ctx = ExecutionContext::new(
        root,
        auto_confirm,
        Box::new(Cursor::new(input.as_bytes().to_vec())),
        Box::new(output.clone()),
        Box::new(SharedBuffer::default()),
    );
    (ctx, output)
}

fn agent(backend: &Arc<ScriptedBackend>, stream: bool) -> Agent {
    let config = Config {
        stream,
        ..Default::default()
    };
    Agent::new(
        config,
        backend.clone(),
        Arc::new(ToolCollection::standard()),
    )
}

fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall::new(id, name, arguments.to_string())
}

#[tokio::test]
async fn test_creates_requested_file_after_confirmation() -> Result<()> {
    let tmp_dir = Builder::new().prefix("agent-test-").tempdir()?;
    let backend = ScriptedBackend::new(vec![
        Message::assistant(
            "",
            vec![call(
                "call_1",
                "modify_files",
                json!({ "files": [{ "file_path": "hello.txt", "content": "hi" }] }),
            )],
        ),
        Message::assistant("All done!", Vec::new()),
    ]);
    let (mut ctx, stdout) = context(tmp_dir.path(), false, "y\n");

    let summary = agent(&backend, false)
        .execute("create hello.txt with content 'hi'", &mut ctx)
        .await?;

    assert_eq!(fs::read_to_string(tmp_dir.path().join("hello.txt"))?, "hi");
    assert_eq!(summary.reason, CompletionReason::CompletionKeyword);
    assert_eq!(summary.turns, 2);

    let messages = summary.conversation.messages();
    assert_eq!(messages[3].role, Role::Tool);
    assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(messages[3].content, "hello.txt: Updated");

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 4);
    assert_eq!(requests[0].tools.len(), 5);
    assert!(requests[0].messages[1].content.ends_with("Task: create hello.txt with content 'hi'"));

    assert_eq!(stdout.contents().matches("Task completed!").count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_completion_keyword_ends_run_once() -> Result<()> {
    let tmp_dir = Builder::new().prefix("agent-test-").tempdir()?;
    let backend = ScriptedBackend::new(vec![Message::assistant("All done!", Vec::new())]);
    let (mut ctx, stdout) = context(tmp_dir.path(), false, "");

    let summary = agent(&backend, true).execute("nothing to do", &mut ctx).await?;

    assert_eq!(summary.reason, CompletionReason::CompletionKeyword);
    assert_eq!(summary.turns, 1);
    assert_eq!(summary.conversation.len(), 3);
    let printed = stdout.contents();
    assert_eq!(printed.matches("Task completed!").count(), 1);
    assert!(printed.contains("All done!"));
    Ok(())
}

#[tokio::test]
async fn test_written_file_reads_back_in_streaming_mode() -> Result<()> {
    let tmp_dir = Builder::new().prefix("agent-test-").tempdir()?;
    let content = "fn main() {\n    println!(\"héllo\");\n}\n";
    let backend = ScriptedBackend::new(vec![
        Message::assistant(
            "Writing the file.",
            vec![call(
                "call_write",
                "modify_files",
                json!({ "files": [{ "file_path": "src/main.rs", "content": content }] }),
            )],
        ),
        Message::assistant(
            "",
            vec![call(
                "call_read",
                "get_file_contents",
                json!({ "files": ["src/main.rs"] }),
            )],
        ),
        Message::assistant("", vec![call("call_done", "task_complete", json!({}))]),
    ]);
    let (mut ctx, _) = context(tmp_dir.path(), true, "");

    let summary = agent(&backend, true).execute("write main", &mut ctx).await?;

    assert_eq!(summary.reason, CompletionReason::TaskCompleteTool);
    assert_eq!(summary.turns, 3);

    let read_result = summary
        .conversation
        .messages()
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("call_read"))
        .expect("read result");
    let files: Value = serde_json::from_str(&read_result.content)?;
    assert_eq!(files["src/main.rs"], content);

    // The streamed assistant turn is stored exactly as sent.
    let requests = backend.requests();
    let stored = &requests[1].messages[2];
    assert_eq!(stored.content, "Writing the file.");
    assert_eq!(stored.tool_calls()[0].id, "call_write");
    Ok(())
}

#[tokio::test]
async fn test_task_complete_lets_the_rest_of_the_batch_run() -> Result<()> {
    let tmp_dir = Builder::new().prefix("agent-test-").tempdir()?;
    let backend = ScriptedBackend::new(vec![Message::assistant(
        "",
        vec![
            call("call_done", "task_complete", json!({})),
            call(
                "call_cmd",
                "run_command",
                json!({ "command": "echo after > after.txt" }),
            ),
        ],
    )]);
    let (mut ctx, stdout) = context(tmp_dir.path(), true, "");

    let summary = agent(&backend, false).execute("finish up", &mut ctx).await?;

    assert_eq!(summary.reason, CompletionReason::TaskCompleteTool);
    assert_eq!(summary.turns, 1);
    assert!(tmp_dir.path().join("after.txt").exists());

    let ids: Vec<_> = summary.conversation.messages()[3..]
        .iter()
        .map(|m| m.tool_call_id.clone().unwrap_or_default())
        .collect();
    assert_eq!(ids, vec!["call_done", "call_cmd"]);
    assert_eq!(stdout.contents().matches("Task completed!").count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_reply_without_keyword_ends_without_success_message() -> Result<()> {
    let tmp_dir = Builder::new().prefix("agent-test-").tempdir()?;
    let backend = ScriptedBackend::new(vec![Message::assistant("Hmm.", Vec::new())]);
    let (mut ctx, stdout) = context(tmp_dir.path(), false, "");

    let summary = agent(&backend, false).execute("vague task", &mut ctx).await?;

    assert_eq!(summary.reason, CompletionReason::EmptyResponse);
    assert!(!stdout.contents().contains("Task completed!"));
    Ok(())
}

#[tokio::test]
async fn test_malformed_arguments_abort_the_run() -> Result<()> {
    let tmp_dir = Builder::new().prefix("agent-test-").tempdir()?;
    let backend = ScriptedBackend::new(vec![Message::assistant(
        "",
        vec![ToolCall::new("call_1", "run_command", "{\"command\": ")],
    )]);
    let (mut ctx, stdout) = context(tmp_dir.path(), true, "");

    let err = agent(&backend, false)
        .execute("break", &mut ctx)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AgentError>(),
        Some(AgentError::ArgumentParse { tool, .. }) if tool == "run_command"
    ));
    assert!(!stdout.contents().contains("Task completed!"));
    Ok(())
}
