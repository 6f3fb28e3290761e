//! Human input channel and the `ask_human` tool.
//!
//! The loop and the tool read from the same [`HumanInput`]; in production it
//! is the process's standard input.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::error::Result;

use super::types::{optional_str, require_str};
use super::{Tool, ToolContext, ToolOutput};

/// Returned to the model when the human channel is closed.
pub const NO_HUMAN_RESPONSE: &str = "Human did not provide a response.";

/// A line-oriented source of human input.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HumanInput: Send + Sync {
    /// Show `prompt` and wait for one line. `Ok(None)` means end of input.
    async fn read_line(&self, prompt: &str) -> Result<Option<String>>;
}

/// Standard input as the human channel.
pub struct StdinInput {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HumanInput for StdinInput {
    async fn read_line(&self, prompt: &str) -> Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;
        let mut lines = self.lines.lock().await;
        Ok(lines.next_line().await?)
    }
}

/// Interrupt the agent to ask the human operator a question.
pub struct AskHumanTool {
    input: Arc<dyn HumanInput>,
}

impl AskHumanTool {
    pub const NAME: &'static str = "ask_human";

    pub fn new(input: Arc<dyn HumanInput>) -> Self {
        Self { input }
    }
}

#[async_trait]
impl Tool for AskHumanTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Interrupt your current work to request information or confirmation from the human \
         operator. Use it when you need clarification, more information, or confirmation \
         that you are on the right track."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question or request for the human operator."
                },
                "reason": {
                    "type": "string",
                    "description": "Optional explanation of why you need this."
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let question = require_str(&input, "question")?;
        let prompt = match optional_str(&input, "reason") {
            Some(reason) => format!(
                "{} is asking: {}\n(Reason: {})\nYour response: ",
                ctx.agent_name, question, reason
            ),
            None => format!("{} is asking: {}\nYour response: ", ctx.agent_name, question),
        };

        match self.input.read_line(&prompt).await? {
            Some(answer) => Ok(ToolOutput::text(answer)),
            None => Ok(ToolOutput::text(NO_HUMAN_RESPONSE)),
        }
    }
}
