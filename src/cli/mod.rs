//! CLI module — command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod agent;
pub mod relay;
pub mod session;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

use crewloop::config::Config;

#[derive(Parser)]
#[command(name = "crewloop")]
#[command(version)]
#[command(about = "Long-running autonomous agents with durable restarts", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.crewloop/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run this process's agent until it exits
    Agent {
        /// Team roster (defaults to team-config.json)
        #[arg(long)]
        team_config: Option<PathBuf>,
        /// Directory for persisted sessions
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },
    /// Serve the shared group relay
    Relay {
        /// Bind host
        #[arg(long)]
        host: Option<String>,
        /// Bind port
        #[arg(long)]
        port: Option<u16>,
        /// Append-only group log
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Inspect or clear a persisted session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// Print the persisted session
    Show {
        /// Agent identity (defaults to the current agent in the team roster)
        #[arg(long)]
        agent: Option<String>,
        /// Directory for persisted sessions
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },
    /// Delete the persisted session so the next start is fresh
    Clear {
        /// Agent identity (defaults to the current agent in the team roster)
        #[arg(long)]
        agent: Option<String>,
        /// Directory for persisted sessions
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },
}

pub async fn run() -> Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    crewloop::utils::logging::init_logging(&config.logging)
        .with_context(|| "Failed to initialize logging")?;

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            cmd_version();
        }
        Some(Commands::Agent {
            team_config,
            state_dir,
        }) => {
            agent::cmd_agent(config, team_config, state_dir).await?;
        }
        Some(Commands::Relay {
            host,
            port,
            log_file,
        }) => {
            relay::cmd_relay(config, host, port, log_file).await?;
        }
        Some(Commands::Session { action }) => {
            session::cmd_session(config, action).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Config::load().with_context(|| "Failed to load configuration"),
    }
}

fn cmd_version() {
    println!("crewloop {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Long-running autonomous agents with durable restarts and inter-agent relays");
}
