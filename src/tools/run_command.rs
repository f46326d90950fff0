//! # Run Command Tool
//!
//! Runs one shell command through `sh -c` after confirmation. Output is shown live
//! and captured at the same time; the exit status goes back to the model as data,
//! so a failing command never ends the run.

use crate::context::ExecutionContext;
use crate::message::FunctionDescription;
use crate::tools::{Tool, ToolOutput, parse_arguments};
use anyhow::Result;
use async_trait::async_trait;
use console::style;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Deserialize, Debug)]
pub struct RunCommandArgs {
    pub command: String,
}

/// The structured result reported to the model.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct CommandReport {
    pub command: String,
    pub confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct RunCommandTool;

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &'static str {
        "run_command"
    }

    fn schema(&self) -> FunctionDescription {
        FunctionDescription {
            name: self.name().to_string(),
            description: "Execute a shell command (sh -c <your_command>)".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "Shell command to execute"
                    }
                },
                "required": ["command"]
            }),
        }
    }

    async fn execute(&self, arguments: &str, ctx: &mut ExecutionContext) -> Result<ToolOutput> {
        let args: RunCommandArgs = parse_arguments(self.name(), arguments)?;

        ctx.println(format!("Execute: {}", style(&args.command).bold()))?;

        let report = if ctx.confirm("Run this command?")? {
            let captured = run_tee(&args.command, ctx).await?;
            CommandReport {
                command: args.command,
                confirmed: true,
                exit_code: Some(captured.exit_code),
                stdout: Some(captured.stdout),
                stderr: Some(captured.stderr),
                message: None,
            }
        } else {
            CommandReport {
                command: args.command,
                confirmed: false,
                exit_code: None,
                stdout: None,
                stderr: None,
                message: Some("Command not executed".to_string()),
            }
        };

        Ok(ToolOutput::new(serde_json::to_string(&report)?))
    }
}

struct CapturedOutput {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

/// Runs the command, copying its output to the context's streams as it arrives
/// while keeping a copy of each.
async fn run_tee(command: &str, ctx: &mut ExecutionContext) -> Result<CapturedOutput> {
    let spawned = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(&ctx.root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            ctx.eprintln(style(format!("Command failed: {e}")).red())?;
            return Ok(CapturedOutput {
                exit_code: -1,
                stdout: String::new(),
                stderr: e.to_string(),
            });
        }
    };

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut stdout_chunk = [0u8; 4096];
    let mut stderr_chunk = [0u8; 4096];

    while stdout_pipe.is_some() || stderr_pipe.is_some() {
        tokio::select! {
            read = read_some(&mut stdout_pipe, &mut stdout_chunk), if stdout_pipe.is_some() => {
                match read {
                    Some(n) => {
                        ctx.output.write_all(&stdout_chunk[..n])?;
                        ctx.output.flush()?;
                        stdout.extend_from_slice(&stdout_chunk[..n]);
                    }
                    None => stdout_pipe = None,
                }
            }
            read = read_some(&mut stderr_pipe, &mut stderr_chunk), if stderr_pipe.is_some() => {
                match read {
                    Some(n) => {
                        ctx.error_output.write_all(&stderr_chunk[..n])?;
                        ctx.error_output.flush()?;
                        stderr.extend_from_slice(&stderr_chunk[..n]);
                    }
                    None => stderr_pipe = None,
                }
            }
        }
    }

    let status = child.wait().await?;
    debug!(command, ?status, "command finished");
    // Killed by a signal: no exit code.
    let exit_code = status.code().unwrap_or(-1);
    if !status.success() {
        ctx.eprintln(style(format!("Command failed: {status}")).red())?;
    }

    Ok(CapturedOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

/// Reads the next chunk from a pipe. `None` means the pipe is finished, either at
/// end of file or after a read error.
async fn read_some<R>(pipe: &mut Option<R>, buf: &mut [u8]) -> Option<usize>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let reader = pipe.as_mut()?;
    match reader.read(buf).await {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(n),
    }
}
