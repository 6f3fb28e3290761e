//! LLM providers for crewloop
//!
//! The [`LLMProvider`] trait is the seam between the loop and the reasoning
//! service. [`claude::ClaudeProvider`] speaks the Messages API,
//! [`retry::RetryProvider`] wraps it with the transient-error policy and
//! [`boundary::InferenceBoundary`] prepares every call (cache window, tool
//! list, check-in directive).

pub mod boundary;
pub mod cache;
pub mod claude;
pub mod error_classifier;
pub mod retry;
mod types;

pub use boundary::{CheckIn, Inference, InferenceBoundary};
pub use cache::{count_cache_markers, prune_cache_markers, MAX_CACHE_MARKERS};
pub use claude::ClaudeProvider;
pub use retry::RetryProvider;
pub use types::{
    ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolChoice, ToolDefinition, Usage,
};

use crate::error::ProviderError;
use error_classifier::classify_error_message;

/// Map an HTTP status code and response body to a structured [`ProviderError`].
///
/// A 500 whose body reports an overload is classed as `Overloaded`; other
/// statuses outside the known set fall back to message classification.
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    let msg = format!("HTTP {}: {}", status, body);
    match status {
        401 | 403 => ProviderError::Auth(msg),
        429 => ProviderError::RateLimit(msg),
        503 | 529 => ProviderError::Overloaded(msg),
        500 if body.to_lowercase().contains("overloaded") => ProviderError::Overloaded(msg),
        500 => ProviderError::ServerError(msg),
        400 | 413 | 422 => ProviderError::InvalidRequest(msg),
        404 => ProviderError::ModelNotFound(msg),
        _ => classify_error_message(&msg),
    }
}
