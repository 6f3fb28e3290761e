//! Pattern-based error classification for reasoning-service failures.
//!
//! Used when the HTTP status alone does not settle the class, e.g. a 5xx
//! whose body says `overloaded_error`, or a transport error message.
//! Checks patterns in priority order: auth > rate_limit > overloaded > timeout.
//! Falls back to `Unknown` if no pattern matches.

use crate::error::ProviderError;

/// Classify an error message string into a `ProviderError`.
pub fn classify_error_message(msg: &str) -> ProviderError {
    let lower = msg.to_lowercase();

    if contains_any(
        &lower,
        &[
            "invalid_api_key",
            "invalid x-api-key",
            "authentication_error",
            "unauthorized",
            "permission_error",
        ],
    ) {
        return ProviderError::Auth(msg.to_string());
    }

    if contains_any(&lower, &["rate_limit", "rate limit", "too many requests"]) {
        return ProviderError::RateLimit(msg.to_string());
    }

    if contains_any(&lower, &["overloaded_error", "overloaded"]) {
        return ProviderError::Overloaded(msg.to_string());
    }

    if contains_any(&lower, &["timed out", "timeout", "deadline exceeded"]) {
        return ProviderError::Timeout(msg.to_string());
    }

    ProviderError::Unknown(msg.to_string())
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
