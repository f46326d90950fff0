use crate::context::ExecutionContext;
use crate::message::FunctionDescription;
use crate::tools::{Tool, ToolOutput, parse_arguments};
use anyhow::Result;
use async_trait::async_trait;
use console::style;
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct AskQuestionArgs {
    pub question: String,
}

/// Relays a clarifying question to the user. The answer is always read from the
/// terminal, even in auto-confirm mode.
pub struct AskQuestionTool;

#[async_trait]
impl Tool for AskQuestionTool {
    fn name(&self) -> &'static str {
        "ask_question"
    }

    fn schema(&self) -> FunctionDescription {
        FunctionDescription {
            name: self.name().to_string(),
            description: "Ask the user a clarifying question".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "Question to ask the user"
                    }
                },
                "required": ["question"]
            }),
        }
    }

    async fn execute(&self, arguments: &str, ctx: &mut ExecutionContext) -> Result<ToolOutput> {
        let args: AskQuestionArgs = parse_arguments(self.name(), arguments)?;

        ctx.println(format!("{} {}", style("Question:").yellow().bold(), args.question))?;
        let answer = ctx.read_answer("Your answer: ")?;

        Ok(ToolOutput::new(format!("Answer: {answer}")))
    }
}
