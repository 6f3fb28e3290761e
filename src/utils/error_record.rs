//! Durable error record.
//!
//! Unhandled loop failures are appended to a plain-text file so an operator
//! can see why an agent stopped even when logs went to a terminal that is
//! gone. Entries look like `[2026-01-01 12:00:00] ERROR: <message>`.

use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// Append-only error file.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    path: PathBuf,
}

impl ErrorRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. The whole entry is written with a single call.
    pub async fn append(&self, message: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let entry = format_entry(&Local::now().format("%Y-%m-%d %H:%M:%S").to_string(), message);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn format_entry(timestamp: &str, message: &str) -> String {
    format!("\n[{}] ERROR: {}\n", timestamp, message)
}
