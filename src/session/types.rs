//! Session types for crewloop
//!
//! A conversation is an ordered list of [`Message`]s, each holding one or
//! more [`ContentBlock`]s. The block layout matches the reasoning service's
//! wire format so a conversation can be sent, persisted and restored without
//! conversion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema version written into every persisted session.
pub const SESSION_SCHEMA_VERSION: u32 = 1;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Cache hint attached to a content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheControl {
    Ephemeral,
}

/// One block of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
}

impl ContentBlock {
    pub fn text(text: &str) -> Self {
        ContentBlock::Text {
            text: text.to_string(),
            cache_control: None,
        }
    }

    pub fn tool_use(id: &str, name: &str, input: serde_json::Value) -> Self {
        ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
            cache_control: None,
        }
    }

    pub fn tool_result(tool_use_id: &str, content: &str, is_error: bool) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.to_string(),
            content: content.to_string(),
            is_error,
            cache_control: None,
        }
    }

    /// Attach an ephemeral cache marker.
    pub fn cached(mut self) -> Self {
        *self.cache_control_mut() = Some(CacheControl::Ephemeral);
        self
    }

    pub fn cache_control(&self) -> Option<CacheControl> {
        match self {
            ContentBlock::Text { cache_control, .. }
            | ContentBlock::ToolUse { cache_control, .. }
            | ContentBlock::ToolResult { cache_control, .. } => *cache_control,
        }
    }

    pub fn cache_control_mut(&mut self) -> &mut Option<CacheControl> {
        match self {
            ContentBlock::Text { cache_control, .. }
            | ContentBlock::ToolUse { cache_control, .. }
            | ContentBlock::ToolResult { cache_control, .. } => cache_control,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// A single turn in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// Create a user turn with a single text block.
    ///
    /// # Example
    /// ```
    /// use crewloop::session::{Message, Role};
    ///
    /// let msg = Message::user("Hello!");
    /// assert_eq!(msg.role, Role::User);
    /// assert_eq!(msg.text(), "Hello!");
    /// ```
    pub fn user(text: &str) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn assistant(text: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn with_blocks(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    /// Concatenated text of every text block.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// `true` when the turn carries tool results.
    pub fn has_tool_results(&self) -> bool {
        self.content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolResult { .. }))
    }

    /// Number of cache markers on this turn.
    pub fn cache_marker_count(&self) -> usize {
        self.content
            .iter()
            .filter(|b| b.cache_control().is_some())
            .count()
    }
}

/// Why a session was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartCause {
    /// A tool asked for a restart.
    ToolRequested,
    /// The token budget was crossed and the conversation was compacted.
    TokenBudget,
    /// The loop failed; the state is kept for a forensic resume.
    ErrorExit,
}

/// Everything the next incarnation needs to resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub version: u32,
    /// Stable across restarts, new for every fresh start.
    pub session_id: Uuid,
    pub agent: String,
    pub saved_at: DateTime<Utc>,
    pub cause: RestartCause,
    #[serde(default)]
    pub consecutive_tool_calls: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Timestamp of the newest group relay entry already delivered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_cursor: Option<String>,
    pub messages: Vec<Message>,
}

impl PersistedSession {
    pub fn new(
        session_id: Uuid,
        agent: &str,
        cause: RestartCause,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            version: SESSION_SCHEMA_VERSION,
            session_id,
            agent: agent.to_string(),
            saved_at: Utc::now(),
            cause,
            consecutive_tool_calls: 0,
            summary: None,
            group_cursor: None,
            messages,
        }
    }

    pub fn with_counter(mut self, consecutive_tool_calls: u32) -> Self {
        self.consecutive_tool_calls = consecutive_tool_calls;
        self
    }

    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn with_group_cursor(mut self, cursor: Option<&str>) -> Self {
        self.group_cursor = cursor.map(str::to_string);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_block_wire_format() {
        let block = ContentBlock::text("hi").cached();
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(
            value,
            json!({"type": "text", "text": "hi", "cache_control": {"type": "ephemeral"}})
        );
    }

    #[test]
    fn test_tool_result_omits_false_error_flag() {
        let block = ContentBlock::tool_result("toolu_1", "done", false);
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(
            value,
            json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "done"})
        );

        let failed = ContentBlock::tool_result("toolu_2", "boom", true);
        assert_eq!(serde_json::to_value(&failed).unwrap()["is_error"], true);
    }

    #[test]
    fn test_message_text_joins_blocks() {
        let msg = Message::with_blocks(
            Role::Assistant,
            vec![
                ContentBlock::text("Hello "),
                ContentBlock::tool_use("t1", "wait", json!({"seconds": 1})),
                ContentBlock::text("world"),
            ],
        );
        assert_eq!(msg.text(), "Hello world");
        assert!(!msg.has_tool_results());
    }

    #[test]
    fn test_cache_marker_count() {
        let msg = Message::with_blocks(
            Role::Assistant,
            vec![
                ContentBlock::text("a").cached(),
                ContentBlock::tool_use("t1", "wait", json!({})).cached(),
                ContentBlock::text("b"),
            ],
        );
        assert_eq!(msg.cache_marker_count(), 2);
    }

    #[test]
    fn test_restart_cause_serialization() {
        assert_eq!(
            serde_json::to_string(&RestartCause::ErrorExit).unwrap(),
            "\"error_exit\""
        );
        assert_eq!(
            serde_json::to_string(&RestartCause::TokenBudget).unwrap(),
            "\"token_budget\""
        );
    }

    #[test]
    fn test_group_cursor_is_optional_on_disk() {
        let session = PersistedSession::new(
            Uuid::new_v4(),
            "Alice",
            RestartCause::ToolRequested,
            vec![Message::user("hi")],
        );
        let value = serde_json::to_value(&session).unwrap();
        assert!(value.get("group_cursor").is_none());
        let parsed: PersistedSession = serde_json::from_value(value).unwrap();
        assert!(parsed.group_cursor.is_none());

        let session = session.with_group_cursor(Some("2026-10-19T10:00:00.000001"));
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["group_cursor"], "2026-10-19T10:00:00.000001");
    }
}
