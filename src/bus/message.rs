//! Message types for the inbound queue
//!
//! A [`QueuedMessage`] is what a relay handler hands to the agent loop. The
//! loop only ever sees the rendered text, the rest is bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a queued message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSource {
    /// Sent to this agent's inbox by a peer
    Direct,
    /// Picked up from the group relay
    Group,
    /// Produced locally (operator tooling, tests)
    Local,
}

/// A message waiting to be consumed by the agent loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMessage {
    /// Arrival order, assigned by the queue under its lock
    pub seq: u64,
    pub source: MessageSource,
    /// Identity of the sender
    pub sender: String,
    /// The message text
    pub content: String,
    pub received_at: DateTime<Utc>,
}

impl QueuedMessage {
    /// Build a message. `seq` is overwritten when the message is enqueued.
    ///
    /// # Example
    /// ```
    /// use crewloop::bus::{MessageSource, QueuedMessage};
    ///
    /// let msg = QueuedMessage::new(MessageSource::Direct, "agent2", "ping");
    /// assert_eq!(msg.render(), "[Direct message from agent2]: ping");
    /// ```
    pub fn new(source: MessageSource, sender: &str, content: &str) -> Self {
        Self {
            seq: 0,
            source,
            sender: sender.to_string(),
            content: content.to_string(),
            received_at: Utc::now(),
        }
    }

    pub fn direct(sender: &str, content: &str) -> Self {
        Self::new(MessageSource::Direct, sender, content)
    }

    pub fn group(sender: &str, content: &str) -> Self {
        Self::new(MessageSource::Group, sender, content)
    }

    pub fn local(content: &str) -> Self {
        Self::new(MessageSource::Local, "local", content)
    }

    /// Text appended to the conversation for this message.
    pub fn render(&self) -> String {
        match self.source {
            MessageSource::Direct => {
                format!("[Direct message from {}]: {}", self.sender, self.content)
            }
            MessageSource::Group => format!("[Group Chat] {}: {}", self.sender, self.content),
            MessageSource::Local => self.content.clone(),
        }
    }
}

/// Join a drained batch into the text of one user turn, one line per message.
pub fn render_batch(messages: &[QueuedMessage]) -> String {
    let mut out = String::new();
    for message in messages {
        out.push_str(&message.render());
        out.push('\n');
    }
    out
}
