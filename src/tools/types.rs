//! Tool types for crewloop
//!
//! This module defines the core types for tool execution: the [`Tool`] trait
//! every handler implements, the [`ToolOutput`] it produces and the
//! [`ToolContext`] it runs in.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::AgentMode;
use crate::error::Result;

/// Control flags a tool result can carry back to the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlSignals {
    /// Replace the process, keeping the conversation.
    pub restart: bool,
    /// Discard the conversation before restarting. Only meaningful with `restart`.
    pub reset_context: bool,
    /// Stop cleanly.
    pub shutdown: bool,
}

impl ControlSignals {
    pub fn any(&self) -> bool {
        self.restart || self.shutdown
    }
}

/// Result of one tool execution.
///
/// The payload is either plain text or a JSON document; the loop only looks
/// at the boolean `restart`, `reset_context` and `shutdown` fields of an
/// object payload, everything else is opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub payload: Value,
    pub is_error: bool,
}

impl ToolOutput {
    /// Plain-text result.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            payload: Value::String(content.into()),
            is_error: false,
        }
    }

    /// Structured JSON result.
    ///
    /// # Example
    /// ```
    /// use crewloop::tools::ToolOutput;
    /// use serde_json::json;
    ///
    /// let output = ToolOutput::structured(json!({"restart": true}));
    /// assert!(output.signals().restart);
    /// assert!(!output.signals().reset_context);
    /// ```
    pub fn structured(payload: Value) -> Self {
        Self {
            payload,
            is_error: false,
        }
    }

    /// Error result; the description is what the model sees.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            payload: Value::String(content.into()),
            is_error: true,
        }
    }

    /// Text sent back in the tool-result block.
    pub fn to_content(&self) -> String {
        match &self.payload {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Scan the payload for control flags. Only literal `true` counts.
    pub fn signals(&self) -> ControlSignals {
        let flag = |key: &str| {
            self.payload
                .get(key)
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };
        ControlSignals {
            restart: flag("restart"),
            reset_context: flag("reset_context"),
            shutdown: flag("shutdown"),
        }
    }
}

/// Trait that all tools must implement.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use crewloop::tools::{Tool, ToolContext, ToolOutput};
/// use crewloop::error::Result;
///
/// struct PingTool;
///
/// #[async_trait]
/// impl Tool for PingTool {
///     fn name(&self) -> &str { "ping" }
///     fn description(&self) -> &str { "Reply with pong" }
///     fn parameters(&self) -> Value {
///         serde_json::json!({"type": "object", "properties": {}})
///     }
///     async fn execute(&self, _input: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
///         Ok(ToolOutput::text("pong"))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to call the tool.
    fn name(&self) -> &str;

    /// Description sent to the model.
    fn description(&self) -> &str;

    /// JSON schema of the input object.
    fn parameters(&self) -> Value;

    /// Execute the tool. An `Err` becomes an error result; it never stops the loop.
    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput>;
}

/// Context provided to tools during execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Name of the agent running the tool
    pub agent_name: String,
    pub mode: AgentMode,
}

impl ToolContext {
    pub fn new(agent_name: &str, mode: AgentMode) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            mode,
        }
    }
}

/// Read a required, non-empty string field from a tool input.
pub(crate) fn require_str<'a>(input: &'a Value, key: &str) -> Result<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| crate::error::CrewError::Tool(format!("Missing '{}' parameter", key)))
}

/// Read an optional string field, treating blanks as absent.
pub(crate) fn optional_str<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_output_content() {
        let output = ToolOutput::text("done");
        assert_eq!(output.to_content(), "done");
        assert!(!output.is_error);
        assert_eq!(output.signals(), ControlSignals::default());
    }

    #[test]
    fn test_structured_output_serializes_json() {
        let output = ToolOutput::structured(json!({"status": "ok"}));
        assert_eq!(output.to_content(), r#"{"status":"ok"}"#);
    }

    #[test]
    fn test_signals_require_literal_true() {
        let output = ToolOutput::structured(json!({"restart": "true", "reset_context": 1}));
        assert!(!output.signals().any());

        let output = ToolOutput::structured(json!({"restart": true, "reset_context": true}));
        let signals = output.signals();
        assert!(signals.restart);
        assert!(signals.reset_context);
        assert!(!signals.shutdown);
    }

    #[test]
    fn test_error_output() {
        let output = ToolOutput::error("Tool not found: x");
        assert!(output.is_error);
        assert_eq!(output.to_content(), "Tool not found: x");
    }

    #[test]
    fn test_require_str() {
        let input = json!({"message": "  hi ", "empty": "   "});
        assert_eq!(require_str(&input, "message").unwrap(), "hi");
        assert!(require_str(&input, "empty").is_err());
        assert!(require_str(&input, "missing").is_err());
        assert_eq!(optional_str(&input, "empty"), None);
    }

    #[test]
    fn test_tool_context_new() {
        let ctx = ToolContext::new("Alice", AgentMode::Team);
        assert_eq!(ctx.agent_name, "Alice");
        assert!(ctx.mode.is_team());
    }
}
