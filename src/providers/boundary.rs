//! Inference boundary.
//!
//! Owns the configuration of every reasoning call (tool definitions, system
//! prompt, model options) and nothing else. Before each call the conversation's
//! cache window is pruned in place; retries live in the wrapped provider.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::session::Message;

use super::cache::{prune_cache_markers, MAX_CACHE_MARKERS};
use super::{ChatOptions, LLMProvider, LLMResponse, ToolChoice, ToolDefinition, Usage};

/// Prompt appended to the conversation when a progress summary is needed.
pub const SUMMARY_REQUEST: &str = "Your context is about to be cleared and the program restarted. \
Write a concise summary of your progress so far: what you were working on, what is done, \
what remains, and any facts you will need to continue. Reply with the summary only.";

/// A forced check-in for the next call.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckIn {
    /// Tool the model must call, when it is registered.
    pub tool: Option<String>,
    /// Text appended to the system prompt for this call only.
    pub directive: String,
}

/// The result of one reasoning call.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub response: LLMResponse,
    pub usage: Usage,
}

pub struct InferenceBoundary {
    provider: Arc<dyn LLMProvider>,
    tools: Vec<ToolDefinition>,
    options: ChatOptions,
}

impl std::fmt::Debug for InferenceBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceBoundary")
            .field("provider", &self.provider.name())
            .field("tools", &self.tools.len())
            .field("model", &self.options.model)
            .finish()
    }
}

impl InferenceBoundary {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tools: Vec<ToolDefinition>,
        options: ChatOptions,
    ) -> Self {
        Self {
            provider,
            tools,
            options,
        }
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }

    /// Run one call over the conversation.
    ///
    /// Prunes cache markers down to the newest three first; the pruning is
    /// kept in the conversation so persisted state matches what was sent.
    pub async fn infer(
        &self,
        conversation: &mut [Message],
        check_in: Option<&CheckIn>,
    ) -> Result<Inference> {
        let removed = prune_cache_markers(conversation, MAX_CACHE_MARKERS);
        if removed > 0 {
            debug!(removed, "Pruned cache markers");
        }

        let options = match check_in {
            Some(check_in) => self.check_in_options(check_in),
            None => self.options.clone(),
        };

        let response = self
            .provider
            .chat(conversation, &self.tools, &options)
            .await?;
        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            tool_calls = response.tool_calls().len(),
            "Inference complete"
        );
        let usage = response.usage;
        Ok(Inference { response, usage })
    }

    /// Ask for a progress summary. Tools stay declared (the history refers to
    /// them) but calling them is disabled.
    pub async fn summarize(&self, conversation: &[Message]) -> Result<(String, Usage)> {
        let mut request = conversation.to_vec();
        request.push(Message::user(SUMMARY_REQUEST));
        prune_cache_markers(&mut request, MAX_CACHE_MARKERS);

        let options = self.options.clone().with_tool_choice(ToolChoice::None);
        let response = self.provider.chat(&request, &self.tools, &options).await?;
        Ok((response.text_content(), response.usage))
    }

    fn check_in_options(&self, check_in: &CheckIn) -> ChatOptions {
        let mut options = self.options.clone();
        options.system = Some(match options.system.take() {
            Some(system) => format!("{}\n\n{}", system, check_in.directive),
            None => check_in.directive.clone(),
        });
        if let Some(tool) = check_in.tool.as_deref().filter(|t| self.has_tool(t)) {
            options.tool_choice = ToolChoice::Tool {
                name: tool.to_string(),
            };
        }
        options
    }
}
