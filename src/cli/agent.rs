//! Agent command handler and the restart supervisor.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{error, info};

use crewloop::agent::{AgentLoop, ContextBuilder, LoopLimits, Transition};
use crewloop::bus::InboundQueue;
use crewloop::config::{expand_home, Config, TeamConfig};
use crewloop::health::UsageMetrics;
use crewloop::providers::{
    ChatOptions, ClaudeProvider, InferenceBoundary, LLMProvider, RetryProvider,
};
use crewloop::relay::{inbox, GroupFeed, InboxState, RelayClient};
use crewloop::session::ContextStore;
use crewloop::tools::{build_registry, HumanInput, StdinInput, ToolDeps};
use crewloop::utils::error_record::ErrorRecord;

/// Run this process's agent, then act on the transition it ends with.
pub(crate) async fn cmd_agent(
    config: Config,
    team_config: Option<PathBuf>,
    state_dir: Option<PathBuf>,
) -> Result<()> {
    let team_path = team_config.unwrap_or_else(|| config.team_config_path());
    let team = Arc::new(
        TeamConfig::load(&team_path)
            .with_context(|| format!("Failed to load team configuration {}", team_path.display()))?,
    );
    let me = team.current()?.clone();
    let mode = team.mode();
    let state_dir = state_dir.unwrap_or_else(|| config.state_dir());

    let provider = build_provider(&config)?;
    let relay = RelayClient::new(
        &config.relay.group_url,
        Duration::from_secs(config.relay.timeout_secs),
    )?;
    let human: Arc<dyn HumanInput> = Arc::new(StdinInput::new());
    let registry = Arc::new(build_registry(
        mode,
        ToolDeps {
            human: Arc::clone(&human),
            relay: relay.clone(),
            team: Arc::clone(&team),
            oversight: config.oversight.clone(),
        },
    )?);

    let tool_count = registry.len();

    let system = ContextBuilder::new(&me.name, mode)
        .with_peers(team.peer_names())
        .build_system_prompt();
    let boundary = InferenceBoundary::new(
        provider,
        registry.definitions(),
        ChatOptions::new(&config.agent.model, config.agent.max_tokens).with_system(&system),
    );

    let queue = Arc::new(InboundQueue::new());
    let metrics = Arc::new(UsageMetrics::new());
    let inbox_task = inbox::spawn(
        &me.bind_addr(),
        InboxState::new(&me.name, mode, Arc::clone(&queue), Arc::clone(&metrics)),
    )
    .await
    .with_context(|| format!("Failed to start the agent inbox on {}", me.bind_addr()))?;

    let mut agent_loop = AgentLoop::new(
        &me.name,
        mode,
        boundary,
        registry,
        ContextStore::new(&state_dir, &me.name),
        human,
    )
    .with_queue(queue)
    .with_metrics(Arc::clone(&metrics))
    .with_limits(LoopLimits::from(&config.agent))
    .with_error_record(ErrorRecord::new(expand_home(&config.agent.error_log)));
    if mode.is_team() {
        agent_loop = agent_loop.with_feed(GroupFeed::new(relay, &me.name));
    }

    agent_loop.restore().await?;
    info!(agent = %me.name, mode = ?mode, tools = tool_count, "Agent starting");

    let outcome = tokio::select! {
        result = agent_loop.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    // The listener must be gone before a replacement process binds the port.
    inbox_task.abort();
    let _ = inbox_task.await;

    match outcome {
        None => {
            info!(agent = %me.name, "Interrupted, exiting cleanly");
            agent_loop.store().delete().await?;
            metrics.emit_usage("interrupted");
            Ok(())
        }
        Some(Ok(Transition::Restart)) => {
            metrics.emit_usage("restart");
            replace_process()
        }
        Some(Ok(Transition::Reset)) => {
            metrics.emit_usage("reset");
            replace_process()
        }
        Some(Ok(_)) => {
            metrics.emit_usage("exit");
            Ok(())
        }
        Some(Err(e)) => {
            metrics.emit_usage("error");
            error!(agent = %me.name, error = %e, "Agent stopped on an error");
            Err(e).context("Agent loop failed")
        }
    }
}

/// Anthropic client wrapped in the bounded retry policy.
fn build_provider(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let Some(api_key) = config
        .providers
        .anthropic
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
    else {
        bail!(
            "No Anthropic API key configured. Set ANTHROPIC_API_KEY or add it to {}",
            Config::path().display()
        );
    };

    let mut claude = ClaudeProvider::new(api_key);
    if let Some(base) = config.providers.anthropic.api_base.as_deref() {
        claude = claude.with_api_base(base);
    }
    let retry = RetryProvider::new(Box::new(claude))
        .with_max_attempts(config.retry.max_attempts)
        .with_delay_ms(config.retry.delay_ms);
    Ok(Arc::new(retry))
}

/// Re-execute the current binary with the same arguments.
fn replace_process() -> Result<()> {
    let exe = std::env::current_exe().with_context(|| "Cannot locate the current executable")?;
    let args: Vec<std::ffi::OsString> = std::env::args_os().skip(1).collect();
    info!(exe = %exe.display(), "Replacing process");

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        let err = std::process::Command::new(&exe).args(&args).exec();
        Err(err).with_context(|| format!("Failed to re-execute {}", exe.display()))
    }

    #[cfg(not(unix))]
    {
        let status = std::process::Command::new(&exe)
            .args(&args)
            .status()
            .with_context(|| format!("Failed to re-execute {}", exe.display()))?;
        std::process::exit(status.code().unwrap_or(1));
    }
}
