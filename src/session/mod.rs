//! Session module - durable conversation state across restarts
//!
//! The [`ContextStore`] keeps exactly one persisted session per agent
//! identity. Saves write a sibling temp file, flush it to disk and rename it
//! over the target, so a reader never observes a partial document.
//!
//! # Example
//!
//! ```
//! use crewloop::session::{ContextStore, Message, PersistedSession, RestartCause};
//!
//! #[tokio::main]
//! async fn main() {
//!     let dir = std::env::temp_dir().join("crewloop-doc-example");
//!     let store = ContextStore::new(&dir, "agent1");
//!
//!     let session = PersistedSession::new(
//!         uuid::Uuid::new_v4(),
//!         "agent1",
//!         RestartCause::ToolRequested,
//!         vec![Message::user("Hello!")],
//!     );
//!     store.save(&session).await.unwrap();
//!
//!     let restored = store.load().await.unwrap().unwrap();
//!     assert_eq!(restored.messages, session.messages);
//!     store.delete().await.unwrap();
//! }
//! ```

pub mod types;

pub use types::{
    CacheControl, ContentBlock, Message, PersistedSession, RestartCause, Role,
    SESSION_SCHEMA_VERSION,
};

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::log_component;

/// File-backed store for one agent's persisted session.
#[derive(Debug, Clone)]
pub struct ContextStore {
    dir: PathBuf,
    identity: String,
}

impl ContextStore {
    /// Create a store for `identity` under `dir`. Nothing touches the disk
    /// until the first save.
    pub fn new(dir: impl AsRef<Path>, identity: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            identity: identity.to_string(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Location of the persisted session.
    pub fn path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.context.json", sanitize_key(&self.identity)))
    }

    fn temp_path(&self) -> PathBuf {
        self.dir
            .join(format!(".{}.context.json.tmp", sanitize_key(&self.identity)))
    }

    /// Whether a persisted session currently exists.
    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(self.path()).await.unwrap_or(false)
    }

    /// Atomically replace the persisted session.
    pub async fn save(&self, session: &PersistedSession) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let content = serde_json::to_vec(session)?;
        let temp = self.temp_path();
        {
            let mut file = tokio::fs::File::create(&temp).await?;
            file.write_all(&content).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&temp, self.path()).await?;

        log_component!(
            info,
            "session",
            "Persisted session",
            agent = self.identity.as_str(),
            cause = tracing::field::debug(&session.cause),
            messages = session.messages.len(),
        );
        Ok(())
    }

    /// Load the persisted session, if any.
    ///
    /// A document that does not deserialize, or that carries a different
    /// schema version, is moved aside with a `.rejected-<timestamp>` suffix
    /// and treated as absent.
    pub async fn load(&self) -> Result<Option<PersistedSession>> {
        let path = self.path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(agent = %self.identity, "No persisted session");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let session: PersistedSession = match serde_json::from_slice(&bytes) {
            Ok(session) => session,
            Err(e) => {
                warn!(agent = %self.identity, error = %e, "Persisted session is unreadable");
                self.reject().await?;
                return Ok(None);
            }
        };

        if session.version != SESSION_SCHEMA_VERSION {
            warn!(
                agent = %self.identity,
                found = session.version,
                expected = SESSION_SCHEMA_VERSION,
                "Persisted session has an incompatible schema version"
            );
            self.reject().await?;
            return Ok(None);
        }

        info!(
            agent = %self.identity,
            cause = ?session.cause,
            messages = session.messages.len(),
            "Loaded persisted session"
        );
        Ok(Some(session))
    }

    /// Remove the persisted session. Returns `true` if a file was removed.
    pub async fn delete(&self) -> Result<bool> {
        match tokio::fs::remove_file(self.path()).await {
            Ok(()) => {
                log_component!(
                    info,
                    "session",
                    "Deleted persisted session",
                    agent = self.identity.as_str(),
                );
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn reject(&self) -> Result<PathBuf> {
        let path = self.path();
        let mut rejected = path.clone().into_os_string();
        rejected.push(format!(".rejected-{}", Utc::now().format("%Y%m%d%H%M%S")));
        let rejected = PathBuf::from(rejected);
        tokio::fs::rename(&path, &rejected).await?;
        warn!(path = %rejected.display(), "Moved incompatible session aside, starting fresh");
        Ok(rejected)
    }
}

/// Percent-encode characters that are unsafe in file names.
fn sanitize_key(key: &str) -> String {
    let mut result = String::with_capacity(key.len() * 3);
    for c in key.chars() {
        match c {
            '/' => result.push_str("%2F"),
            '\\' => result.push_str("%5C"),
            ':' => result.push_str("%3A"),
            '*' => result.push_str("%2A"),
            '?' => result.push_str("%3F"),
            '"' => result.push_str("%22"),
            '<' => result.push_str("%3C"),
            '>' => result.push_str("%3E"),
            '|' => result.push_str("%7C"),
            '%' => result.push_str("%25"),
            c => result.push(c),
        }
    }
    result
}
