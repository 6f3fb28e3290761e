//! Error types for crewloop
//!
//! Uses `thiserror` for the crate-wide [`CrewError`] and a hand-written
//! [`ProviderError`] classification that drives the inference retry policy.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured classification of reasoning-service failures.
///
/// Only three classes are transient: rate limiting, overload and internal
/// server errors. Everything else propagates on the first occurrence.
#[derive(Debug)]
pub enum ProviderError {
    /// 401 — Invalid API key or authentication failure
    Auth(String),
    /// 429 — Rate limit or quota exceeded
    RateLimit(String),
    /// 529/503 — Service overloaded
    Overloaded(String),
    /// 500 — Internal server error
    ServerError(String),
    /// 400 — Bad request, malformed parameters
    InvalidRequest(String),
    /// 404 — Model not found or endpoint not available
    ModelNotFound(String),
    /// Connection or read timeout
    Timeout(String),
    /// Catch-all for unrecognized errors (other statuses, transport failures)
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::Overloaded(msg) => write!(f, "Overloaded error: {}", msg),
            ProviderError::ServerError(msg) => write!(f, "Server error: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
        }
    }
}

impl ProviderError {
    /// Returns `true` if this error is transient and the request should be retried.
    ///
    /// Retryable errors: RateLimit, Overloaded, ServerError.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit(_) | ProviderError::Overloaded(_) | ProviderError::ServerError(_)
        )
    }

    /// Returns the HTTP status code associated with this error, if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Auth(_) => Some(401),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::Overloaded(_) => Some(529),
            ProviderError::ServerError(_) => Some(500),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Timeout(_) | ProviderError::Unknown(_) => None,
        }
    }
}

impl From<ProviderError> for CrewError {
    fn from(err: ProviderError) -> Self {
        CrewError::ProviderTyped(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for crewloop operations.
#[derive(Error, Debug)]
pub enum CrewError {
    /// Configuration errors (invalid team config, duplicate tools, bad limits)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Untyped provider failures (empty responses, exhausted retries)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Structured provider error with classification for retry decisions.
    #[error("Provider error: {0}")]
    ProviderTyped(ProviderError),

    /// Tool execution errors (invalid parameters, execution failures, etc.)
    #[error("Tool error: {0}")]
    Tool(String),

    /// Session persistence errors (schema mismatch, unusable state dir)
    #[error("Session error: {0}")]
    Session(String),

    /// Relay delivery failures (unreachable peer, non-success status)
    #[error("Relay error: {0}")]
    Relay(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The human input channel reached end of input
    #[error("Input closed")]
    InputClosed,

    /// Resource not found (agents, tools, sessions)
    #[error("Not found: {0}")]
    NotFound(String),
}

impl CrewError {
    /// Returns `true` when the error is a provider failure that the retry
    /// policy treats as transient.
    pub fn is_transient_provider_error(&self) -> bool {
        matches!(self, CrewError::ProviderTyped(err) if err.is_retryable())
    }
}

/// A specialized `Result` type for crewloop operations.
pub type Result<T> = std::result::Result<T, CrewError>;
