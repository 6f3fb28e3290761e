//! Usage counters for crewloop.
//!
//! [`UsageMetrics`] is a set of lock-free counters shared between the agent
//! loop and the inbox server. `/health` serves a [`UsageSnapshot`]; on exit
//! the CLI emits the same numbers as a `usage_summary` log line.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::info;

/// Lock-free counters for one agent process.
#[derive(Debug, Default)]
pub struct UsageMetrics {
    iterations: AtomicU64,
    inference_calls: AtomicU64,
    tool_calls: AtomicU64,
    tool_errors: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    messages_enqueued: AtomicU64,
    errors: AtomicU64,
    restarts: AtomicU64,
}

/// Point-in-time copy of [`UsageMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub iterations: u64,
    pub inference_calls: u64,
    pub tool_calls: u64,
    pub tool_errors: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub messages_enqueued: u64,
    pub errors: u64,
    pub restarts: u64,
}

impl UsageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one completed inference call and its token usage.
    pub fn record_inference(&self, input: u64, output: u64) {
        self.inference_calls.fetch_add(1, Ordering::Relaxed);
        self.input_tokens.fetch_add(input, Ordering::Relaxed);
        self.output_tokens.fetch_add(output, Ordering::Relaxed);
    }

    pub fn record_tool_call(&self, is_error: bool) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.tool_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_enqueued(&self) {
        self.messages_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            iterations: self.iterations.load(Ordering::Relaxed),
            inference_calls: self.inference_calls.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            tool_errors: self.tool_errors.load(Ordering::Relaxed),
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
            messages_enqueued: self.messages_enqueued.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
        }
    }

    /// Emit current counters as a structured log line.
    pub fn emit_usage(&self, reason: &str) {
        let s = self.snapshot();
        info!(
            event = "usage_summary",
            reason = reason,
            iterations = s.iterations,
            inference_calls = s.inference_calls,
            tool_calls = s.tool_calls,
            tool_errors = s.tool_errors,
            input_tokens = s.input_tokens,
            output_tokens = s.output_tokens,
            messages_enqueued = s.messages_enqueued,
            errors = s.errors,
            restarts = s.restarts,
            "Usage metrics"
        );
    }
}
