//! Per-agent inbox server.
//!
//! `POST /send-message` hands the message to the inbound queue and answers
//! right away; the loop picks it up on its next iteration. `GET /health`
//! reports identity, uptime, queue depth and usage counters.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::bus::{InboundQueue, QueuedMessage};
use crate::config::AgentMode;
use crate::error::Result;
use crate::health::UsageMetrics;
use crate::log_component;

use super::DirectMessage;

/// Reply body text for an accepted message.
pub const INBOX_ACCEPTED: &str =
    "Your message has been sent to the agent and will be processed in the conversation.";

struct InboxInner {
    agent_name: String,
    mode: AgentMode,
    queue: Arc<InboundQueue>,
    metrics: Arc<UsageMetrics>,
    started: Instant,
}

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct InboxState {
    inner: Arc<InboxInner>,
}

impl InboxState {
    pub fn new(
        agent_name: &str,
        mode: AgentMode,
        queue: Arc<InboundQueue>,
        metrics: Arc<UsageMetrics>,
    ) -> Self {
        Self {
            inner: Arc::new(InboxInner {
                agent_name: agent_name.to_string(),
                mode,
                queue,
                metrics,
                started: Instant::now(),
            }),
        }
    }
}

async fn send_message_handler(
    State(state): State<InboxState>,
    Json(body): Json<DirectMessage>,
) -> Response {
    if body.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"response": "message must not be empty", "status": "failed"})),
        )
            .into_response();
    }
    let sender = match body.from_agent.trim() {
        "" => "unknown",
        name => name,
    };

    let seq = state
        .inner
        .queue
        .enqueue(QueuedMessage::direct(sender, &body.message));
    state.inner.metrics.record_enqueued();
    log_component!(debug, "inbox", "Direct message queued", seq = seq, from = sender);

    Json(json!({"response": INBOX_ACCEPTED, "status": "sent"})).into_response()
}

async fn health_handler(State(state): State<InboxState>) -> Response {
    let inner = &state.inner;
    Json(json!({
        "status": "ok",
        "agent": inner.agent_name,
        "mode": inner.mode,
        "uptime_secs": inner.started.elapsed().as_secs(),
        "queue_depth": inner.queue.len(),
        "counters": inner.metrics.snapshot(),
    }))
    .into_response()
}

/// Build the inbox router.
pub fn router(state: InboxState) -> Router {
    Router::new()
        .route("/send-message", post(send_message_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve the inbox in the background.
///
/// Binding happens before returning so a busy port fails start-up.
pub async fn spawn(addr: &str, state: InboxState) -> Result<JoinHandle<()>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Agent inbox listening");
    let app = router(state);
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Agent inbox stopped");
        }
    }))
}
