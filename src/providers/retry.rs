//! Retry provider - decorator that retries transient failures with a fixed delay.
//!
//! Wraps any [`LLMProvider`]. Only the three transient classes (rate limit,
//! overload, internal server error) are retried; every other error is
//! returned on first sight. The attempt count includes the first call.
//!
//! # Example
//!
//! ```rust,ignore
//! use crewloop::providers::retry::RetryProvider;
//! use crewloop::providers::claude::ClaudeProvider;
//!
//! let provider = RetryProvider::new(Box::new(ClaudeProvider::new("api-key")))
//!     .with_max_attempts(5)
//!     .with_delay_ms(3000);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::error::{CrewError, Result};
use crate::session::Message;

use super::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};

/// Default total attempts, including the first call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default constant delay between attempts.
pub const DEFAULT_DELAY_MS: u64 = 3000;

/// A decorator provider that retries transient errors.
pub struct RetryProvider {
    inner: Box<dyn LLMProvider>,
    max_attempts: u32,
    delay: Duration,
}

impl std::fmt::Debug for RetryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryProvider")
            .field("inner", &self.inner.name())
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .finish()
    }
}

impl RetryProvider {
    /// Wrap `inner` with 5 attempts and a 3-second delay.
    pub fn new(inner: Box<dyn LLMProvider>) -> Self {
        Self {
            inner,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
        }
    }

    /// Total attempts including the first call. Zero is treated as one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Constant delay between attempts in milliseconds.
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Check whether an error is one of the transient provider classes.
pub fn is_retryable(err: &CrewError) -> bool {
    err.is_transient_provider_error()
}

#[async_trait]
impl LLMProvider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<LLMResponse> {
        let mut attempt = 1;
        loop {
            match self.inner.chat(messages, tools, options).await {
                Ok(response) => return Ok(response),
                Err(err) if !is_retryable(&err) => return Err(err),
                Err(err) if attempt >= self.max_attempts => {
                    error!(
                        provider = self.inner.name(),
                        attempts = attempt,
                        error = %err,
                        "Giving up after transient errors"
                    );
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        provider = self.inner.name(),
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "Retrying chat request after transient error"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
