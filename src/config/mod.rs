//! Configuration management for crewloop
//!
//! Configuration is loaded from `~/.crewloop/config.json` (or an explicit
//! path) with environment variable overrides. The team roster lives in a
//! separate `team-config.json`, see [`TeamConfig`].

mod team;
mod types;

pub use team::*;
pub use types::*;

use crate::error::{CrewError, Result};
use std::path::{Path, PathBuf};

impl Config {
    /// Returns the crewloop configuration directory path (~/.crewloop)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".crewloop")
    }

    /// Returns the path to the config file (~/.crewloop/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Variables follow the pattern `CREWLOOP_SECTION_KEY`. A few well-known
    /// unprefixed variables are honoured as well.
    fn apply_env_overrides(&mut self) {
        // Agent
        if let Ok(val) = std::env::var("CREWLOOP_AGENT_MODEL") {
            self.agent.model = val;
        }
        if let Ok(val) = std::env::var("CREWLOOP_AGENT_MAX_TOKENS") {
            if let Ok(v) = val.parse() {
                self.agent.max_tokens = v;
            }
        }
        if let Ok(val) = std::env::var("CREWLOOP_AGENT_TOKEN_BUDGET") {
            if let Ok(v) = val.parse() {
                self.agent.token_budget = v;
            }
        }
        if let Ok(val) = std::env::var("CREWLOOP_AGENT_TURN_DELAY_MS") {
            if let Ok(v) = val.parse() {
                self.agent.turn_delay_ms = v;
            }
        }
        if let Ok(val) = std::env::var("CREWLOOP_AGENT_STATE_DIR") {
            self.agent.state_dir = Some(val);
        }

        // Relay
        if let Ok(val) = std::env::var("CREWLOOP_RELAY_GROUP_URL") {
            self.relay.group_url = val;
        }
        if let Ok(val) = std::env::var("CREWLOOP_RELAY_PORT") {
            if let Ok(v) = val.parse() {
                self.relay.port = v;
            }
        }
        if let Ok(val) = std::env::var("INITIAL_GROUP_CHAT_MESSAGE") {
            self.relay.initial_message = val;
        }

        // Oversight
        if let Ok(val) = std::env::var("OVERSIGHT_API_BASE_URL") {
            if !val.is_empty() {
                self.oversight.base_url = val;
            }
        }

        // Provider
        if let Ok(val) = std::env::var("CREWLOOP_PROVIDERS_ANTHROPIC_API_KEY")
            .or_else(|_| std::env::var("ANTHROPIC_API_KEY"))
        {
            self.providers.anthropic.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("CREWLOOP_PROVIDERS_ANTHROPIC_API_BASE") {
            self.providers.anthropic.api_base = Some(val);
        }

        // Team
        if let Ok(val) = std::env::var("CREWLOOP_TEAM_CONFIG") {
            self.team_config_path = val;
        }

        // Logging
        if let Ok(val) = std::env::var("CREWLOOP_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Reject limits that would make the loop misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_consecutive_tool_calls == 0 {
            return Err(CrewError::Config(
                "agent.max_consecutive_tool_calls must be positive".into(),
            ));
        }
        if self.agent.token_budget == 0 {
            return Err(CrewError::Config(
                "agent.token_budget must be positive".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(CrewError::Config("retry.max_attempts must be positive".into()));
        }
        Ok(())
    }

    /// Directory holding persisted sessions.
    pub fn state_dir(&self) -> PathBuf {
        match &self.agent.state_dir {
            Some(dir) if !dir.is_empty() => expand_home(dir),
            _ => Self::dir().join("sessions"),
        }
    }

    /// Path of the team roster.
    pub fn team_config_path(&self) -> PathBuf {
        if self.team_config_path.is_empty() {
            PathBuf::from("team-config.json")
        } else {
            expand_home(&self.team_config_path)
        }
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.agent.max_consecutive_tool_calls, 20);
        assert_eq!(config.agent.token_budget, 50_000);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay_ms, 3000);
        assert_eq!(config.relay.port, 5000);
        assert_eq!(config.relay.group_url, "http://127.0.0.1:5000");
        assert_eq!(config.oversight.base_url, "http://127.0.0.1:8083");
        assert_eq!(config.agent.error_log, "error.txt");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{"agent": {"turn_delay_ms": 250}, "relay": {"port": 5050}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.agent.turn_delay_ms, 250);
        assert_eq!(config.agent.model, DEFAULT_MODEL);
        assert_eq!(config.relay.port, 5050);
        assert_eq!(config.relay.log_file, "chat_messages.txt");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = Config::default();
        config.agent.token_budget = 0;
        assert!(matches!(config.validate(), Err(CrewError::Config(_))));

        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_state_dir_override() {
        let mut config = Config::default();
        config.agent.state_dir = Some("/var/lib/crewloop".into());
        assert_eq!(config.state_dir(), PathBuf::from("/var/lib/crewloop"));

        config.agent.state_dir = None;
        assert!(config.state_dir().ends_with(".crewloop/sessions"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = Config::default();
        config.agent.turn_delay_ms = 1500;
        config.save_to_path(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let restored: Config = serde_json::from_str(&content).unwrap();
        assert_eq!(restored.agent.turn_delay_ms, 1500);
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/tmp/x"), PathBuf::from("/tmp/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/x"), home.join("x"));
        }
    }

    #[test]
    fn test_log_format_deserialize() {
        let cfg: LoggingConfig =
            serde_json::from_str(r#"{"format":"json","level":"debug"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.level, "debug");

        let cfg: LoggingConfig = serde_json::from_str(r#"{"format":"pretty"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Pretty);
        assert_eq!(cfg.level, "info");
    }
}
