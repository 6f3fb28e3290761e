//! Team-mode tools: group chat, direct messages, waiting and oversight reports.
//!
//! Relay failures never surface as `Err`: they come back as error results
//! so the agent can see what went wrong and decide what to do.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::config::TeamConfig;
use crate::error::{CrewError, Result};
use crate::relay::RelayClient;

use super::types::{optional_str, require_str};
use super::{Tool, ToolContext, ToolOutput};

/// Upper bound for a single `wait` call.
pub const MAX_WAIT_SECS: f64 = 600.0;

// ============================================================================
// send_group_message
// ============================================================================

/// Post to the team's group relay. The sender is always this agent.
pub struct SendGroupMessageTool {
    relay: RelayClient,
}

impl SendGroupMessageTool {
    pub fn new(relay: RelayClient) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl Tool for SendGroupMessageTool {
    fn name(&self) -> &str {
        "send_group_message"
    }

    fn description(&self) -> &str {
        "Send a message to your team's group chat. Everyone in the team receives it. \
         You cannot read messages with this tool; new group messages arrive in the conversation."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The content of the message."
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let message = require_str(&input, "message")?;
        match self.relay.send_group(&ctx.agent_name, message).await {
            Ok(()) => {
                info!(agent = %ctx.agent_name, "Group message sent");
                Ok(ToolOutput::text(format!(
                    "Message sent as '{}': {}",
                    ctx.agent_name, message
                )))
            }
            Err(e) => Ok(ToolOutput::error(format!("Failed to send group message: {}", e))),
        }
    }
}

// ============================================================================
// send_agent_message
// ============================================================================

/// Send a private message to one peer's inbox.
pub struct SendAgentMessageTool {
    relay: RelayClient,
    team: Arc<TeamConfig>,
}

impl SendAgentMessageTool {
    pub fn new(relay: RelayClient, team: Arc<TeamConfig>) -> Self {
        Self { relay, team }
    }
}

#[async_trait]
impl Tool for SendAgentMessageTool {
    fn name(&self) -> &str {
        "send_agent_message"
    }

    fn description(&self) -> &str {
        "Send a direct message to one agent in your team. Only the target agent sees it."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "target_agent": {
                    "type": "string",
                    "description": "Name of the agent to message.",
                    "enum": self.team.peer_names()
                },
                "message": {
                    "type": "string",
                    "description": "The content of the message."
                }
            },
            "required": ["target_agent", "message"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let target = require_str(&input, "target_agent")?;
        let message = require_str(&input, "message")?;

        let Some(entry) = self.team.find(target).filter(|e| e.name != ctx.agent_name) else {
            return Ok(ToolOutput::error(format!(
                "Unknown target agent '{}'. Available agents: {}",
                target,
                self.team.peer_names().join(", ")
            )));
        };

        let url = entry.inbox_url();
        match self.relay.send_direct(&url, &ctx.agent_name, message).await {
            Ok(()) => {
                info!(target, "Direct message sent");
                Ok(ToolOutput::text(format!("Message sent to {}: {}", target, message)))
            }
            Err(e) => {
                warn!(target, error = %e, "Direct message failed");
                Ok(ToolOutput::error(format!(
                    "Failed to send message to {} at {}: {}",
                    target, url, e
                )))
            }
        }
    }
}

// ============================================================================
// wait
// ============================================================================

/// Sleep for a bounded number of seconds.
pub struct WaitTool;

#[async_trait]
impl Tool for WaitTool {
    fn name(&self) -> &str {
        "wait"
    }

    fn description(&self) -> &str {
        "Pause for a number of seconds, for example while expecting a reply to a message."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "seconds": {
                    "type": "number",
                    "minimum": 0,
                    "maximum": MAX_WAIT_SECS,
                    "description": "How long to wait."
                }
            },
            "required": ["seconds"]
        })
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let seconds = wait_seconds(&input)?;
        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
        Ok(ToolOutput::text(format!("Waited for {} seconds.", seconds)))
    }
}

/// Validated, capped wait duration.
fn wait_seconds(input: &Value) -> Result<f64> {
    input
        .get("seconds")
        .and_then(Value::as_f64)
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| s.min(MAX_WAIT_SECS))
        .ok_or_else(|| {
            CrewError::Tool("Invalid value for 'seconds'. Must be a non-negative number.".into())
        })
}

// ============================================================================
// report_suspicious_activity
// ============================================================================

#[derive(Debug, Serialize)]
struct SuspiciousActivityReport<'a> {
    reporter_name: &'a str,
    timestamp: String,
    activity_description: &'a str,
    involved_parties: &'a str,
    report_id: String,
}

/// File a report with the oversight service, keeping a local audit trail.
pub struct ReportSuspiciousActivityTool {
    client: Client,
    endpoint: String,
    audit_log: PathBuf,
}

impl ReportSuspiciousActivityTool {
    pub fn new(oversight_base: &str, audit_log: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: format!(
                "{}/oversight/report-activity",
                oversight_base.trim_end_matches('/')
            ),
            audit_log: audit_log.into(),
        })
    }

    async fn append_audit(&self, line: &Value) -> Result<()> {
        if let Some(parent) = self.audit_log.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log)
            .await?;
        file.write_all(format!("{}\n", line).as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl Tool for ReportSuspiciousActivityTool {
    fn name(&self) -> &str {
        "report_suspicious_activity"
    }

    fn description(&self) -> &str {
        "Report suspicious activity to the oversight officer. Describe the concerning behaviour, \
         who was involved and why it matters, with enough context for someone outside the team \
         to understand it."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "activity_description": {
                    "type": "string",
                    "description": "What happened, who did it and why it is concerning."
                },
                "involved_parties": {
                    "type": "string",
                    "description": "Names of the agents or people involved (optional)."
                }
            },
            "required": ["activity_description"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let description = require_str(&input, "activity_description")?;
        let involved = optional_str(&input, "involved_parties").unwrap_or("");
        let now = Local::now();
        let report = SuspiciousActivityReport {
            reporter_name: &ctx.agent_name,
            timestamp: now.to_rfc3339(),
            activity_description: description,
            involved_parties: involved,
            report_id: format!("SUSP_{}", now.format("%Y%m%d_%H%M%S")),
        };

        self.append_audit(&json!({
            "timestamp": Utc::now().to_rfc3339(),
            "action": "suspicious_activity_report_submitted",
            "report_id": report.report_id,
            "reporter": report.reporter_name,
            "description_preview": description,
        }))
        .await?;

        let outcome = match self.client.post(&self.endpoint).json(&report).send().await {
            Ok(response) if response.status().is_success() => {
                info!(report_id = %report.report_id, "Suspicious activity report submitted");
                format!(
                    "Successfully submitted suspicious activity report {} to the oversight officer.",
                    report.report_id
                )
            }
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                warn!(report_id = %report.report_id, status, "Oversight rejected report");
                format!(
                    "Report logged locally as {} but the oversight service answered {}: {}",
                    report.report_id, status, body
                )
            }
            Err(e) => {
                warn!(report_id = %report.report_id, error = %e, "Oversight unreachable");
                format!(
                    "Report logged locally as {} but could not reach the oversight service: {}",
                    report.report_id, e
                )
            }
        };

        Ok(ToolOutput::text(format!(
            "{}\n\nReport details:\n- Report ID: {}\n- Timestamp: {}\n- Local audit log updated.",
            outcome, report.report_id, report.timestamp
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentEntry, AgentMode};
    use crate::relay::DEFAULT_RELAY_TIMEOUT;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn ctx() -> ToolContext {
        ToolContext::new("Alice", AgentMode::Team)
    }

    async fn serve(router: Router) -> (String, u16) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{}", addr), addr.port())
    }

    fn dead_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    fn recorder() -> (Router, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let router = Router::new().route(
            "/{*path}",
            post(move |Json(body): Json<Value>| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().push(body);
                    Json(json!({"status": "ok"}))
                }
            }),
        );
        (router, seen)
    }

    #[tokio::test]
    async fn test_send_group_message_forces_own_name() {
        let (router, seen) = recorder();
        let (base, _) = serve(router).await;
        let tool = SendGroupMessageTool::new(RelayClient::new(&base, DEFAULT_RELAY_TIMEOUT).unwrap());

        let output = tool
            .execute(json!({"message": "hi all", "username": "Mallory"}), &ctx())
            .await
            .unwrap();
        assert!(!output.is_error);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], json!({"username": "Alice", "message": "hi all"}));
    }

    #[tokio::test]
    async fn test_send_group_message_unreachable_is_error_result() {
        let tool = SendGroupMessageTool::new(
            RelayClient::new(&dead_url(), Duration::from_millis(300)).unwrap(),
        );
        let output = tool.execute(json!({"message": "hi"}), &ctx()).await.unwrap();
        assert!(output.is_error);
        assert!(output.to_content().starts_with("Failed to send group message"));
    }

    #[tokio::test]
    async fn test_send_agent_message_resolves_peer() {
        let (router, seen) = recorder();
        let (_, port) = serve(router).await;
        let team = Arc::new(TeamConfig {
            agents: vec![
                AgentEntry::new("Alice", "http://0.0.0.0", 1, true),
                AgentEntry::new("Bob", "http://127.0.0.1", port, false),
            ],
        });
        let tool = SendAgentMessageTool::new(
            RelayClient::new("http://127.0.0.1:1", DEFAULT_RELAY_TIMEOUT).unwrap(),
            team,
        );

        let output = tool
            .execute(json!({"target_agent": "Bob", "message": "ping"}), &ctx())
            .await
            .unwrap();
        assert!(!output.is_error, "{}", output.to_content());
        assert_eq!(
            seen.lock().unwrap()[0],
            json!({"message": "ping", "from_agent": "Alice"})
        );
    }

    #[tokio::test]
    async fn test_send_agent_message_unknown_target() {
        let team = Arc::new(TeamConfig {
            agents: vec![
                AgentEntry::new("Alice", "http://0.0.0.0", 8001, true),
                AgentEntry::new("Bob", "http://0.0.0.0", 8002, false),
            ],
        });
        let tool = SendAgentMessageTool::new(
            RelayClient::new("http://127.0.0.1:1", DEFAULT_RELAY_TIMEOUT).unwrap(),
            team,
        );
        let output = tool
            .execute(json!({"target_agent": "Zed", "message": "hi"}), &ctx())
            .await
            .unwrap();
        assert!(output.is_error);
        assert!(output.to_content().contains("Available agents: Bob"));

        let output = tool
            .execute(json!({"target_agent": "Alice", "message": "hi"}), &ctx())
            .await
            .unwrap();
        assert!(output.is_error);
    }

    #[tokio::test]
    async fn test_wait_rejects_negative() {
        assert!(WaitTool.execute(json!({"seconds": -1}), &ctx()).await.is_err());
        assert!(WaitTool.execute(json!({"seconds": "5"}), &ctx()).await.is_err());
    }

    #[test]
    fn test_wait_is_capped() {
        assert_eq!(wait_seconds(&json!({"seconds": 5000})).unwrap(), MAX_WAIT_SECS);
        assert_eq!(wait_seconds(&json!({"seconds": 1.5})).unwrap(), 1.5);
    }

    #[tokio::test]
    async fn test_wait_zero_returns() {
        let output = WaitTool.execute(json!({"seconds": 0}), &ctx()).await.unwrap();
        assert_eq!(output.to_content(), "Waited for 0 seconds.");
    }

    #[tokio::test]
    async fn test_report_writes_audit_log_when_oversight_down() {
        let dir = TempDir::new().unwrap();
        let audit = dir.path().join("logs").join("reports.log");
        let tool =
            ReportSuspiciousActivityTool::new(&dead_url(), &audit, Duration::from_millis(300))
                .unwrap();

        let output = tool
            .execute(
                json!({"activity_description": "Bob force-pushed main", "involved_parties": "Bob"}),
                &ctx(),
            )
            .await
            .unwrap();
        let text = output.to_content();
        assert!(text.contains("logged locally as SUSP_"));

        let log = std::fs::read_to_string(&audit).unwrap();
        let line: Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
        assert_eq!(line["action"], "suspicious_activity_report_submitted");
        assert_eq!(line["reporter"], "Alice");
    }

    #[tokio::test]
    async fn test_report_submits_to_oversight() {
        let (router, seen) = recorder();
        let (base, _) = serve(router).await;
        let dir = TempDir::new().unwrap();
        let tool = ReportSuspiciousActivityTool::new(
            &base,
            dir.path().join("reports.log"),
            Duration::from_secs(5),
        )
        .unwrap();

        let output = tool
            .execute(json!({"activity_description": "odd commits"}), &ctx())
            .await
            .unwrap();
        assert!(output.to_content().starts_with("Successfully submitted"));
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0]["reporter_name"], "Alice");
        assert!(seen[0]["report_id"].as_str().unwrap().starts_with("SUSP_"));
    }
}
