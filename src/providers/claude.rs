//! Claude (Anthropic) provider implementation
//!
//! Conversations are already stored in the Messages API block layout, so the
//! request body borrows them directly. Only the response needs mapping: server
//! tool blocks and anything else this crate does not execute are dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use crewloop::providers::{claude::ClaudeProvider, ChatOptions, LLMProvider};
//! use crewloop::session::Message;
//!
//! async fn example() {
//!     let provider = ClaudeProvider::new("your-api-key");
//!     let options = ChatOptions::new("claude-sonnet-4-20250514", 1024);
//!     let response = provider
//!         .chat(&[Message::user("Hello!")], &[], &options)
//!         .await
//!         .unwrap();
//!     println!("Claude: {}", response.text_content());
//! }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CrewError, ProviderError, Result};
use crate::session::{ContentBlock, Message};

use super::error_classifier::classify_error_message;
use super::{parse_provider_error, ChatOptions, LLMProvider, LLMResponse, ToolChoice, ToolDefinition, Usage};

/// The Claude API endpoint base.
const CLAUDE_API_BASE: &str = "https://api.anthropic.com";

/// The Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude/Anthropic provider.
pub struct ClaudeProvider {
    api_key: String,
    api_base: String,
    client: Client,
}

impl ClaudeProvider {
    /// Create a new Claude provider with the given API key.
    ///
    /// # Example
    /// ```
    /// use crewloop::providers::claude::ClaudeProvider;
    /// use crewloop::providers::LLMProvider;
    ///
    /// let provider = ClaudeProvider::new("sk-ant-api03-xxx");
    /// assert_eq!(provider.name(), "claude");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: CLAUDE_API_BASE.to_string(),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Point the provider at a different API base (proxies, test servers).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.api_base)
    }
}

#[async_trait]
impl LLMProvider for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<LLMResponse> {
        let request = ClaudeRequest {
            model: &options.model,
            max_tokens: options.max_tokens,
            system: options.system.as_deref(),
            messages,
            tools: if tools.is_empty() { None } else { Some(tools) },
            tool_choice: if tools.is_empty() {
                None
            } else {
                Some(&options.tool_choice)
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();

            let body = if let Ok(error_response) =
                serde_json::from_str::<ClaudeErrorResponse>(&error_text)
            {
                format!(
                    "Claude API error: {} - {}",
                    error_response.error.r#type, error_response.error.message
                )
            } else {
                format!("Claude API error: {}", error_text)
            };

            return Err(CrewError::from(parse_provider_error(status, &body)));
        }

        let claude_response: ClaudeResponse = response.json().await?;
        Ok(convert_response(claude_response))
    }
}

/// Map a transport failure onto the typed taxonomy. Transport failures are
/// never in the retry allow-list.
fn transport_error(err: reqwest::Error) -> CrewError {
    if err.is_timeout() {
        CrewError::from(ProviderError::Timeout(err.to_string()))
    } else {
        match classify_error_message(&err.to_string()) {
            ProviderError::Timeout(msg) => CrewError::from(ProviderError::Timeout(msg)),
            _ => CrewError::Http(err),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a ToolChoice>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeResponseBlock>,
    #[serde(default)]
    usage: Usage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
    error: ClaudeError,
}

#[derive(Debug, Deserialize)]
struct ClaudeError {
    r#type: String,
    message: String,
}

fn convert_response(response: ClaudeResponse) -> LLMResponse {
    let mut content = Vec::with_capacity(response.content.len());
    for block in response.content {
        match block {
            ClaudeResponseBlock::Text { text } => content.push(ContentBlock::text(&text)),
            ClaudeResponseBlock::ToolUse { id, name, input } => {
                content.push(ContentBlock::tool_use(&id, &name, input))
            }
            ClaudeResponseBlock::Unsupported => {
                debug!("Dropping unsupported response block");
            }
        }
    }
    LLMResponse {
        content,
        usage: response.usage,
        stop_reason: response.stop_reason,
    }
}
