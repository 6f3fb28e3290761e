//! Session command handlers (show, clear).

use std::path::PathBuf;

use anyhow::{Context, Result};

use crewloop::config::{Config, TeamConfig};
use crewloop::session::{ContextStore, Message, Role};

use super::SessionAction;

/// Characters of each message shown by `session show`.
const PREVIEW_CHARS: usize = 120;

pub(crate) async fn cmd_session(config: Config, action: SessionAction) -> Result<()> {
    match action {
        SessionAction::Show { agent, state_dir } => {
            let store = open_store(&config, agent, state_dir)?;
            cmd_show(&store).await
        }
        SessionAction::Clear { agent, state_dir } => {
            let store = open_store(&config, agent, state_dir)?;
            if store.delete().await? {
                println!("Cleared session for {}", store.identity());
            } else {
                println!("No session stored for {}", store.identity());
            }
            Ok(())
        }
    }
}

fn open_store(
    config: &Config,
    agent: Option<String>,
    state_dir: Option<PathBuf>,
) -> Result<ContextStore> {
    let agent = match agent {
        Some(agent) => agent,
        None => {
            let path = config.team_config_path();
            let team = TeamConfig::load(&path)
                .with_context(|| format!("Failed to load team configuration {}", path.display()))?;
            team.current()?.name.clone()
        }
    };
    let dir = state_dir.unwrap_or_else(|| config.state_dir());
    Ok(ContextStore::new(dir, &agent))
}

async fn cmd_show(store: &ContextStore) -> Result<()> {
    let Some(session) = store.load().await? else {
        println!("No session stored for {}", store.identity());
        return Ok(());
    };

    println!("Session for {}", session.agent);
    println!("==========={}", "=".repeat(session.agent.len()));
    println!();
    println!("  File:         {}", store.path().display());
    println!("  Session id:   {}", session.session_id);
    println!("  Saved at:     {}", session.saved_at.to_rfc3339());
    println!("  Cause:        {:?}", session.cause);
    println!("  Tool streak:  {}", session.consecutive_tool_calls);
    println!("  Messages:     {}", session.messages.len());
    if let Some(summary) = &session.summary {
        println!();
        println!("Summary:");
        println!("  {}", summary.trim().replace('\n', "\n  "));
    }

    if !session.messages.is_empty() {
        println!();
        for (i, message) in session.messages.iter().enumerate() {
            println!("  {:>3} {}", i, describe(message));
        }
    }
    Ok(())
}

fn describe(message: &Message) -> String {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    let text = message.text().replace('\n', " ");
    let mut line = if text.chars().count() > PREVIEW_CHARS {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{:<9} {}...", role, cut)
    } else {
        format!("{:<9} {}", role, text)
    };
    let blocks = message.content.len();
    if message.has_tool_results() {
        line.push_str(&format!(" [{} tool result(s)]", blocks));
    } else if text.is_empty() {
        line.push_str(&format!("[{} block(s)]", blocks));
    }
    line
}
