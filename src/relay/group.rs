//! Group relay server.
//!
//! Messages live in memory and in an append-only log file, one line per
//! entry in the form `username||timestamp||message`. Timestamps are assigned
//! by the server and strictly increase, so `after=<t>` filtering is exact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::{CrewError, Result};
use crate::log_component;

use super::{format_timestamp, parse_timestamp, GroupEntry, SendRequest};

/// Sender of the seed message written on first start.
pub const SUPERVISOR: &str = "supervisor";

const FIELD_SEPARATOR: &str = "||";

struct StoredEntry {
    at: NaiveDateTime,
    entry: GroupEntry,
}

struct LogState {
    entries: Vec<StoredEntry>,
}

impl LogState {
    fn next_timestamp(&self) -> NaiveDateTime {
        let now = Utc::now().naive_utc();
        match self.entries.last() {
            Some(last) if now <= last.at => last.at + Duration::microseconds(1),
            _ => now,
        }
    }
}

/// The group relay's message log.
pub struct GroupLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

impl GroupLog {
    /// Open the log at `path`, loading existing entries. A missing file is
    /// created and seeded with `initial_message` from the supervisor.
    pub async fn open(path: impl AsRef<Path>, initial_message: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let log = Self {
            path: path.clone(),
            state: Mutex::new(LogState {
                entries: Vec::new(),
            }),
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let mut state = log.state.lock().await;
                for (lineno, line) in content.lines().enumerate() {
                    if line.is_empty() {
                        continue;
                    }
                    match parse_line(line) {
                        Some(stored) => state.entries.push(stored),
                        None => warn!(line = lineno + 1, path = %path.display(), "Skipping malformed group log line"),
                    }
                }
                state.entries.sort_by_key(|e| e.at);
                info!(entries = state.entries.len(), path = %path.display(), "Loaded group log");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                log.append(SUPERVISOR, initial_message).await?;
                info!(path = %path.display(), "Seeded new group log");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one message. The line is written with a single write while the
    /// lock is held, so concurrent senders never interleave.
    pub async fn append(&self, username: &str, message: &str) -> Result<GroupEntry> {
        validate(username, message)?;

        let mut state = self.state.lock().await;
        let at = state.next_timestamp();
        let entry = GroupEntry {
            username: username.to_string(),
            timestamp: format_timestamp(&at),
            message: message.to_string(),
        };
        let line = format!(
            "{}{sep}{}{sep}{}\n",
            entry.username,
            entry.timestamp,
            escape(&entry.message),
            sep = FIELD_SEPARATOR
        );

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        state.entries.push(StoredEntry {
            at,
            entry: entry.clone(),
        });
        log_component!(
            info,
            "relay",
            "Group message received",
            username = username,
            timestamp = entry.timestamp.as_str(),
        );
        Ok(entry)
    }

    /// All entries, or those strictly after `after`, in timestamp order.
    pub async fn since(&self, after: Option<NaiveDateTime>) -> Vec<GroupEntry> {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .filter(|e| after.map_or(true, |after| e.at > after))
            .map(|e| e.entry.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }
}

fn validate(username: &str, message: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(CrewError::Relay("username must not be empty".into()));
    }
    if username.contains(FIELD_SEPARATOR) || username.contains('\n') {
        return Err(CrewError::Relay(format!(
            "username must not contain '{}' or newlines",
            FIELD_SEPARATOR
        )));
    }
    if message.trim().is_empty() {
        return Err(CrewError::Relay("message must not be empty".into()));
    }
    Ok(())
}

fn parse_line(line: &str) -> Option<StoredEntry> {
    let mut parts = line.splitn(3, FIELD_SEPARATOR);
    let username = parts.next()?;
    let timestamp = parts.next()?;
    let message = parts.next()?;
    let at = parse_timestamp(timestamp)?;
    Some(StoredEntry {
        at,
        entry: GroupEntry {
            username: username.to_string(),
            timestamp: format_timestamp(&at),
            message: unescape(message),
        },
    })
}

/// Keep one entry per line: backslashes and line breaks are escaped.
fn escape(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for c in message.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ============================================================================
// HTTP
// ============================================================================

#[derive(Debug, Deserialize)]
struct MessagesQuery {
    after: Option<String>,
}

fn bad_request(detail: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"status": "error", "detail": detail})),
    )
        .into_response()
}

async fn send_handler(State(log): State<Arc<GroupLog>>, Json(body): Json<SendRequest>) -> Response {
    match log.append(&body.username, &body.message).await {
        Ok(_) => Json(json!({"status": "ok"})).into_response(),
        Err(CrewError::Relay(detail)) => bad_request(detail),
        Err(e) => {
            warn!(error = %e, "Failed to append group message");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "detail": e.to_string()})),
            )
                .into_response()
        }
    }
}

async fn messages_handler(
    State(log): State<Arc<GroupLog>>,
    Query(query): Query<MessagesQuery>,
) -> Response {
    let after = match query.after.as_deref() {
        None | Some("") => None,
        Some(raw) => match parse_timestamp(raw) {
            Some(at) => Some(at),
            None => return bad_request(format!("invalid timestamp: {}", raw)),
        },
    };
    Json(log.since(after).await).into_response()
}

/// Build the group relay router.
pub fn router(log: Arc<GroupLog>) -> Router {
    Router::new()
        .route("/send", post(send_handler))
        .route("/messages", get(messages_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(log)
}

/// Serve the group relay until Ctrl-C.
pub async fn serve(host: &str, port: u16, log: Arc<GroupLog>) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, log = %log.path().display(), "Group relay listening");
    axum::serve(listener, router(log))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Group relay shutting down");
        })
        .await?;
    Ok(())
}
