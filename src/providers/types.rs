//! Provider types for crewloop
//!
//! This module defines the [`LLMProvider`] trait and the request/response
//! types shared by every provider implementation and decorator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{ContentBlock, Message, Role};

/// Definition of a tool that the reasoning service can call.
///
/// Serializes to the `{name, description, input_schema}` wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool input
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    ///
    /// # Example
    /// ```
    /// use crewloop::providers::ToolDefinition;
    /// use serde_json::json;
    ///
    /// let tool = ToolDefinition::new(
    ///     "wait",
    ///     "Pause for a number of seconds",
    ///     json!({"type": "object", "properties": {"seconds": {"type": "number"}}}),
    /// );
    /// assert_eq!(tool.name, "wait");
    /// ```
    pub fn new(name: &str, description: &str, input_schema: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

/// How the reasoning service may pick tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides.
    #[default]
    Auto,
    /// The model must call some tool.
    Any,
    /// The model must call the named tool.
    Tool { name: String },
    /// Tool calls are not allowed.
    None,
}

/// Per-call options.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    pub model: String,
    pub max_tokens: u32,
    /// Top-level system prompt
    pub system: Option<String>,
    pub tool_choice: ToolChoice,
}

impl ChatOptions {
    pub fn new(model: &str, max_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            max_tokens,
            system: None,
            tool_choice: ToolChoice::Auto,
        }
    }

    pub fn with_system(mut self, system: &str) -> Self {
        self.system = Some(system.to_string());
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }
}

/// A tool call requested by the reasoning service.
#[derive(Debug, Clone, PartialEq)]
pub struct LLMToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Token accounting for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Default::default()
        }
    }

    /// Tokens counted against the loop's budget. Cache reads are excluded.
    pub fn billable(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// The assistant's answer to one call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LLMResponse {
    /// Text and tool-use blocks, in the order the service produced them
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
    pub stop_reason: Option<String>,
}

impl LLMResponse {
    /// A response holding a single text block.
    ///
    /// # Example
    /// ```
    /// use crewloop::providers::LLMResponse;
    ///
    /// let response = LLMResponse::text("done");
    /// assert_eq!(response.text_content(), "done");
    /// assert!(!response.has_tool_calls());
    /// ```
    pub fn text(text: &str) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            ..Default::default()
        }
    }

    /// Append a tool-use block.
    pub fn with_tool_call(mut self, id: &str, name: &str, input: serde_json::Value) -> Self {
        self.content.push(ContentBlock::tool_use(id, name, input));
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    /// Concatenated text blocks.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool calls in request order.
    pub fn tool_calls(&self) -> Vec<LLMToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse {
                    id, name, input, ..
                } => Some(LLMToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }

    /// The assistant turn to append to the conversation. Every block carries
    /// a cache marker; pruning keeps only the newest ones.
    pub fn to_message(&self) -> Message {
        Message::with_blocks(
            Role::Assistant,
            self.content.iter().cloned().map(ContentBlock::cached).collect(),
        )
    }
}

/// Trait implemented by every reasoning-service client and decorator.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Run one completion over the full conversation.
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<LLMResponse>;
}
