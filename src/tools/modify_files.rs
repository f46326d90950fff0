//! # Modify Files Tool
//!
//! Writes complete new contents for one or more files. Each file is previewed as a
//! colored unified diff and confirmed on its own, so the user can accept some
//! changes of a batch and skip others.

use crate::context::ExecutionContext;
use crate::diff::{colorize_diff, unified_diff};
use crate::error::AgentError;
use crate::message::FunctionDescription;
use crate::tools::{Tool, ToolOutput, parse_arguments};
use anyhow::Result;
use async_trait::async_trait;
use console::style;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug)]
pub struct FileModification {
    pub file_path: String,
    pub content: String,
}

#[derive(Deserialize, Debug)]
pub struct ModifyFilesArgs {
    pub files: Vec<FileModification>,
}

pub struct ModifyFilesTool;

#[async_trait]
impl Tool for ModifyFilesTool {
    fn name(&self) -> &'static str {
        "modify_files"
    }

    fn schema(&self) -> FunctionDescription {
        FunctionDescription {
            name: self.name().to_string(),
            description: "Modify or create multiple files with new content".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "files": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "file_path": {
                                    "type": "string",
                                    "description": "Path to the file to modify or create"
                                },
                                "content": {
                                    "type": "string",
                                    "description": "Complete new content for the file"
                                }
                            },
                            "required": ["file_path", "content"]
                        }
                    }
                },
                "required": ["files"]
            }),
        }
    }

    async fn execute(&self, arguments: &str, ctx: &mut ExecutionContext) -> Result<ToolOutput> {
        let args: ModifyFilesArgs = parse_arguments(self.name(), arguments)?;

        let mut results = Vec::with_capacity(args.files.len());
        for file in &args.files {
            results.push(apply_modification(file, ctx)?);
        }

        Ok(ToolOutput::new(results.join("\n")))
    }
}

fn apply_modification(file: &FileModification, ctx: &mut ExecutionContext) -> Result<String> {
    let path = ctx.resolve(&file.file_path);
    ctx.println(format!("Modifying: {}", style(&file.file_path).bold()))?;

    if path.exists() {
        let old_content = fs::read(&path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        preview_change(&old_content, file, ctx)?;
    } else {
        ctx.println(style("Creating new file").green())?;
    }

    if !ctx.confirm("Apply these changes?")? {
        return Ok(format!("{}: Skipped", file.file_path));
    }

    write_file(&path, &file.content)?;
    ctx.println(format!("Updated {}", file.file_path))?;
    Ok(format!("{}: Updated", file.file_path))
}

fn preview_change(
    old_content: &str,
    file: &FileModification,
    ctx: &mut ExecutionContext,
) -> Result<()> {
    if old_content.is_empty() {
        ctx.println(style("Existing file is empty").dim())?;
        return Ok(());
    }
    let diff = unified_diff(old_content, &file.content, &file.file_path);
    if diff.trim().is_empty() {
        ctx.println(style("No changes detected.").dim())?;
    } else {
        ctx.println("Proposed changes:")?;
        ctx.println(colorize_diff(&diff))?;
    }
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| AgentError::Filesystem {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| AgentError::Filesystem {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
