//! Relay services: how agents reach each other.
//!
//! - [`group`]: the shared group relay, an append-only log served over HTTP
//! - [`inbox`]: each agent's own listener, feeding the inbound queue
//! - [`client`]: the HTTP client tools use to reach both
//! - [`feed`]: the per-iteration poll that pulls new group entries into the queue

pub mod client;
pub mod feed;
pub mod group;
pub mod inbox;

pub use client::{RelayClient, DEFAULT_RELAY_TIMEOUT};
pub use feed::GroupFeed;
pub use group::GroupLog;
pub use inbox::{InboxState, INBOX_ACCEPTED};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Format of server-assigned group timestamps (UTC, microsecond precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Parse a relay timestamp. Fractional seconds are optional.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S%.f").ok()
}

pub fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// One stored group message as returned by `GET /messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub username: String,
    pub timestamp: String,
    pub message: String,
}

/// Body of `POST /send` on the group relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    pub username: String,
    pub message: String,
}

/// Body of `POST /send-message` on an agent inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectMessage {
    pub message: String,
    pub from_agent: String,
}
