//! Team configuration: who the agents are and which one this process is.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CrewError, Result};

/// Name used when no team configuration exists.
pub const DEFAULT_AGENT_NAME: &str = "Claude";
/// Host used when an agent entry omits one.
pub const DEFAULT_AGENT_HOST: &str = "http://0.0.0.0";
/// Port used when an agent entry omits one.
pub const DEFAULT_AGENT_PORT: u16 = 8000;

/// Whether this agent runs alone or as part of a team.
///
/// Computed once from the number of configured agents and passed to every
/// component that branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    Single,
    Team,
}

impl AgentMode {
    pub fn is_team(self) -> bool {
        self == AgentMode::Team
    }
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentMode::Single => write!(f, "single"),
            AgentMode::Team => write!(f, "team"),
        }
    }
}

fn default_host() -> String {
    DEFAULT_AGENT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_AGENT_PORT
}

/// One agent identity in `team-config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEntry {
    pub name: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub is_current_agent: bool,
}

impl AgentEntry {
    pub fn new(name: &str, host: &str, port: u16, is_current_agent: bool) -> Self {
        Self {
            name: name.to_string(),
            host: host.to_string(),
            port,
            is_current_agent,
        }
    }

    /// Host without the URL scheme, suitable for binding a listener.
    pub fn bind_host(&self) -> &str {
        self.host
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.host)
            .trim_end_matches('/')
    }

    /// `host:port` for binding the inbox listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host(), self.port)
    }

    /// URL of this agent's direct-message endpoint.
    pub fn inbox_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        let host = if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        // A wildcard bind address is not connectable.
        let host = host.replace("://0.0.0.0", "://127.0.0.1");
        format!("{}:{}/send-message", host, self.port)
    }
}

/// The ordered set of collaborating agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TeamConfig {
    #[serde(default)]
    pub agents: Vec<AgentEntry>,
}

impl TeamConfig {
    /// A configuration containing only this process, used when no team file exists.
    pub fn solo() -> Self {
        Self {
            agents: vec![AgentEntry::new(
                DEFAULT_AGENT_NAME,
                DEFAULT_AGENT_HOST,
                DEFAULT_AGENT_PORT,
                true,
            )],
        }
    }

    /// Load and validate a team file. A missing file yields [`TeamConfig::solo`].
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No team configuration found, running solo");
            return Ok(Self::solo());
        }
        let content = std::fs::read_to_string(path)?;
        let config: TeamConfig = serde_json::from_str(&content).map_err(|e| {
            CrewError::Config(format!("Invalid team config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the structural rules: at least one agent, unique non-empty
    /// names, exactly one entry marked as the current agent.
    pub fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            return Err(CrewError::Config(
                "team config must list at least one agent".into(),
            ));
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(CrewError::Config("agent name must not be empty".into()));
            }
            if !seen.insert(agent.name.as_str()) {
                return Err(CrewError::Config(format!(
                    "agent '{}' is listed more than once",
                    agent.name
                )));
            }
        }

        let current = self.agents.iter().filter(|a| a.is_current_agent).count();
        match current {
            1 => Ok(()),
            0 => Err(CrewError::Config(
                "no agent is marked with isCurrentAgent".into(),
            )),
            n => Err(CrewError::Config(format!(
                "{} agents are marked with isCurrentAgent, expected exactly one",
                n
            ))),
        }
    }

    /// The entry for this process.
    pub fn current(&self) -> Result<&AgentEntry> {
        let mut current = self.agents.iter().filter(|a| a.is_current_agent);
        match (current.next(), current.next()) {
            (Some(agent), None) => Ok(agent),
            _ => {
                self.validate()?;
                Err(CrewError::Config("current agent is ambiguous".into()))
            }
        }
    }

    /// Every agent except this process.
    pub fn peers(&self) -> impl Iterator<Item = &AgentEntry> {
        self.agents.iter().filter(|a| !a.is_current_agent)
    }

    /// Look up an agent by name.
    pub fn find(&self, name: &str) -> Option<&AgentEntry> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// Team mode means two or more configured agents.
    pub fn mode(&self) -> AgentMode {
        if self.agents.len() > 1 {
            AgentMode::Team
        } else {
            AgentMode::Single
        }
    }

    /// Names of peers, for error messages.
    pub fn peer_names(&self) -> Vec<String> {
        self.peers().map(|a| a.name.clone()).collect()
    }
}
