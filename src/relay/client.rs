//! HTTP client for the group relay and peer inboxes.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Serialize;
use tracing::debug;

use crate::error::{CrewError, Result};

use super::{DirectMessage, GroupEntry, SendRequest};

/// Timeout applied to every relay request unless configured otherwise.
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(5);

/// Talks to the group relay and to other agents' inboxes.
///
/// Every failure, transport or status, comes back as [`CrewError::Relay`] so
/// calling tools can turn it into an error result.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: Client,
    group_url: String,
}

impl RelayClient {
    pub fn new(group_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            group_url: group_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn group_url(&self) -> &str {
        &self.group_url
    }

    /// Post a message to the group relay.
    pub async fn send_group(&self, username: &str, message: &str) -> Result<()> {
        let url = format!("{}/send", self.group_url);
        self.post(&url, &SendRequest {
            username: username.to_string(),
            message: message.to_string(),
        })
        .await?;
        Ok(())
    }

    /// Fetch group entries, optionally only those strictly after `after`.
    pub async fn fetch_group(&self, after: Option<&str>) -> Result<Vec<GroupEntry>> {
        let url = format!("{}/messages", self.group_url);
        let mut request = self.client.get(&url);
        if let Some(after) = after {
            request = request.query(&[("after", after)]);
        }
        let response = request.send().await.map_err(|e| unreachable(&url, e))?;
        let response = check_status(&url, response).await?;
        response
            .json::<Vec<GroupEntry>>()
            .await
            .map_err(|e| CrewError::Relay(format!("Invalid response from {}: {}", url, e)))
    }

    /// Deliver a direct message to another agent's inbox.
    pub async fn send_direct(&self, inbox_url: &str, from_agent: &str, message: &str) -> Result<()> {
        self.post(inbox_url, &DirectMessage {
            message: message.to_string(),
            from_agent: from_agent.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Response> {
        debug!(url, "Relay POST");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| unreachable(url, e))?;
        check_status(url, response).await
    }
}

fn unreachable(url: &str, err: reqwest::Error) -> CrewError {
    CrewError::Relay(format!("Failed to reach {}: {}", url, err))
}

async fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CrewError::Relay(format!(
        "{} returned {}: {}",
        url,
        status.as_u16(),
        body
    )))
}
