//! Tools module - the handlers the agent can call
//!
//! - [`Tool`]: the interface every handler implements
//! - [`ToolRegistry`]: name → handler dispatch, built once at start-up
//! - [`control`]: restart, reset and shutdown (both modes)
//! - [`human`]: the human input channel and `ask_human` (both modes)
//! - [`team`]: group chat, direct messages, wait and oversight reports (team mode)
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use crewloop::config::{AgentMode, Config, TeamConfig};
//! use crewloop::relay::{RelayClient, DEFAULT_RELAY_TIMEOUT};
//! use crewloop::tools::{build_registry, StdinInput, ToolDeps};
//!
//! let config = Config::default();
//! let deps = ToolDeps {
//!     human: Arc::new(StdinInput::new()),
//!     relay: RelayClient::new(&config.relay.group_url, DEFAULT_RELAY_TIMEOUT).unwrap(),
//!     team: Arc::new(TeamConfig::solo()),
//!     oversight: config.oversight.clone(),
//! };
//! let registry = build_registry(AgentMode::Single, deps).unwrap();
//! assert!(registry.has("ask_human"));
//! assert!(!registry.has("send_group_message"));
//! ```

pub mod control;
pub mod human;
mod registry;
pub mod team;
mod types;

pub use human::{AskHumanTool, HumanInput, StdinInput};
pub use registry::ToolRegistry;
pub use types::{ControlSignals, Tool, ToolContext, ToolOutput};

#[cfg(test)]
pub use human::MockHumanInput;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{AgentMode, OversightSettings, TeamConfig};
use crate::error::Result;
use crate::relay::RelayClient;

/// Collaborators the tool set needs.
pub struct ToolDeps {
    pub human: Arc<dyn HumanInput>,
    pub relay: RelayClient,
    pub team: Arc<TeamConfig>,
    pub oversight: OversightSettings,
}

/// Build the tool set for `mode`. Team tools are only registered in team mode.
pub fn build_registry(mode: AgentMode, deps: ToolDeps) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(control::RestartProgramTool))?;
    registry.register(Box::new(control::ResetContextTool))?;
    registry.register(Box::new(AskHumanTool::new(deps.human)))?;
    registry.register(Box::new(control::GracefulShutdownTool))?;

    if mode.is_team() {
        registry.register(Box::new(team::SendGroupMessageTool::new(deps.relay.clone())))?;
        registry.register(Box::new(team::SendAgentMessageTool::new(
            deps.relay,
            deps.team,
        )))?;
        registry.register(Box::new(team::WaitTool))?;
        registry.register(Box::new(team::ReportSuspiciousActivityTool::new(
            &deps.oversight.base_url,
            &deps.oversight.audit_log,
            Duration::from_secs(deps.oversight.timeout_secs),
        )?))?;
    }
    Ok(registry)
}
