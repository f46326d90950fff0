//! # Get File Contents Tool
//!
//! Reads a batch of files for the model behind a single confirmation.

use crate::context::ExecutionContext;
use crate::ignore_patterns::{IgnorePatterns, resolve_within};
use crate::message::FunctionDescription;
use crate::tools::{Tool, ToolOutput, parse_arguments};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

pub const DENIED: &str = "ERROR: File reading denied by user";
pub const FORBIDDEN: &str = "ERROR: Access to this file is forbidden by ignore patterns";
pub const OUTSIDE_ROOT: &str = "ERROR: Access to files outside the project directory is forbidden";

#[derive(Deserialize, Debug)]
pub struct GetFileContentsArgs {
    pub files: Vec<String>,
}

pub struct GetFileContentsTool;

#[async_trait]
impl Tool for GetFileContentsTool {
    fn name(&self) -> &'static str {
        "get_file_contents"
    }

    fn schema(&self) -> FunctionDescription {
        FunctionDescription {
            name: self.name().to_string(),
            description: "Get contents of multiple files".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "files": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                },
                "required": ["files"]
            }),
        }
    }

    async fn execute(&self, arguments: &str, ctx: &mut ExecutionContext) -> Result<ToolOutput> {
        let args: GetFileContentsArgs = parse_arguments(self.name(), arguments)?;

        ctx.println("AI wants to read these files:")?;
        for file in &args.files {
            ctx.println(format!("  - {file}"))?;
        }

        let mut contents = Map::new();
        if ctx.confirm("Allow reading these files?")? {
            let patterns = IgnorePatterns::load(&ctx.root)?;
            for file in &args.files {
                contents.insert(file.clone(), Value::String(read_one(file, &patterns, ctx)));
            }
        } else {
            for file in &args.files {
                contents.insert(file.clone(), Value::String(DENIED.to_string()));
            }
        }

        let content = serde_json::to_string(&Value::Object(contents))?;
        Ok(ToolOutput::new(content))
    }
}

fn read_one(file: &str, patterns: &IgnorePatterns, ctx: &ExecutionContext) -> String {
    let Some(relative) = resolve_within(&ctx.root, Path::new(file)) else {
        return OUTSIDE_ROOT.to_string();
    };
    if patterns.is_ignored(&relative) {
        return FORBIDDEN.to_string();
    }
    match fs::read(ctx.resolve(file)) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => format!("ERROR: {e}"),
    }
}
