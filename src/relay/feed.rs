//! Group feed: pulls new group relay entries into the inbound queue.

use tracing::{debug, warn};

use crate::bus::{InboundQueue, QueuedMessage};
use crate::error::Result;

use super::RelayClient;

/// Remembers the newest timestamp seen so each entry is delivered once.
pub struct GroupFeed {
    client: RelayClient,
    self_name: String,
    last_seen: Option<String>,
}

impl GroupFeed {
    pub fn new(client: RelayClient, self_name: &str) -> Self {
        Self {
            client,
            self_name: self_name.to_string(),
            last_seen: None,
        }
    }

    /// Continue after an entry delivered by an earlier incarnation.
    pub fn with_cursor(mut self, cursor: Option<&str>) -> Self {
        self.resume_from(cursor);
        self
    }

    pub fn resume_from(&mut self, cursor: Option<&str>) {
        if let Some(cursor) = cursor {
            debug!(cursor, "Group feed resuming");
            self.last_seen = Some(cursor.to_string());
        }
    }

    pub fn last_seen(&self) -> Option<&str> {
        self.last_seen.as_deref()
    }

    /// Fetch entries after the last seen timestamp and enqueue the ones not
    /// written by this agent. Returns how many were enqueued.
    pub async fn fetch(&mut self, queue: &InboundQueue) -> Result<usize> {
        let entries = self.client.fetch_group(self.last_seen.as_deref()).await?;
        let mut enqueued = 0;
        for entry in entries {
            self.last_seen = Some(entry.timestamp.clone());
            if entry.username == self.self_name {
                continue;
            }
            queue.enqueue(QueuedMessage::group(&entry.username, &entry.message));
            enqueued += 1;
        }
        if enqueued > 0 {
            debug!(enqueued, "Group messages queued");
        }
        Ok(enqueued)
    }

    /// Like [`fetch`](Self::fetch), but a relay failure is only logged.
    pub async fn poll(&mut self, queue: &InboundQueue) -> usize {
        match self.fetch(queue).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, relay = self.client.group_url(), "Group relay poll failed");
                0
            }
        }
    }
}
