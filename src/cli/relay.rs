//! Group relay command handler.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crewloop::config::{expand_home, Config};
use crewloop::relay::{group, GroupLog};

/// Serve the group relay until Ctrl-C.
pub(crate) async fn cmd_relay(
    config: Config,
    host: Option<String>,
    port: Option<u16>,
    log_file: Option<PathBuf>,
) -> Result<()> {
    let host = host.unwrap_or_else(|| config.relay.host.clone());
    let port = port.unwrap_or(config.relay.port);
    let log_file = log_file.unwrap_or_else(|| expand_home(&config.relay.log_file));

    let log = GroupLog::open(&log_file, &config.relay.initial_message)
        .await
        .with_context(|| format!("Failed to open group log {}", log_file.display()))?;

    group::serve(&host, port, Arc::new(log))
        .await
        .with_context(|| format!("Group relay on {}:{} failed", host, port))?;
    Ok(())
}
