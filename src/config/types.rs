//! Configuration type definitions for crewloop
//!
//! All types implement serde traits for JSON serialization and have sensible
//! defaults, so a partial (or missing) config file is always usable.

use serde::{Deserialize, Serialize};

/// Main configuration struct for crewloop
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Agent loop limits and persistence locations
    pub agent: AgentSettings,
    /// Inference retry policy
    pub retry: RetrySettings,
    /// Group relay server and client settings
    pub relay: RelaySettings,
    /// Oversight reporting endpoint
    pub oversight: OversightSettings,
    /// Reasoning-service credentials
    pub providers: ProvidersConfig,
    /// Logging output
    pub logging: LoggingConfig,
    /// Path to the team configuration file
    pub team_config_path: String,
}

// ============================================================================
// Agent Settings
// ============================================================================

/// Default model used for inference.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
/// Default response token cap per inference call.
pub const DEFAULT_MAX_TOKENS: u32 = 9999;
/// Consecutive tool-calling iterations allowed before a human check-in is forced.
pub const DEFAULT_MAX_CONSECUTIVE_TOOL_CALLS: u32 = 20;
/// Accumulated token usage that triggers summarize-and-restart.
pub const DEFAULT_TOKEN_BUDGET: u64 = 50_000;

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Model identifier sent to the reasoning service
    pub model: String,
    /// Maximum tokens per response
    pub max_tokens: u32,
    /// Consecutive tool-calling iterations before a human check-in (single-agent mode)
    pub max_consecutive_tool_calls: u32,
    /// Token budget per incarnation
    pub token_budget: u64,
    /// Delay between loop iterations in milliseconds
    pub turn_delay_ms: u64,
    /// Directory holding persisted sessions (defaults to `~/.crewloop/sessions`)
    pub state_dir: Option<String>,
    /// Durable error record
    pub error_log: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_consecutive_tool_calls: DEFAULT_MAX_CONSECUTIVE_TOOL_CALLS,
            token_budget: DEFAULT_TOKEN_BUDGET,
            turn_delay_ms: 0,
            state_dir: None,
            error_log: "error.txt".to_string(),
        }
    }
}

// ============================================================================
// Retry Settings
// ============================================================================

/// Inference retry policy. Attempts include the first call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_ms: 3000,
        }
    }
}

// ============================================================================
// Relay Settings
// ============================================================================

/// Seed message written when the group log is created.
pub const DEFAULT_INITIAL_GROUP_MESSAGE: &str = "Welcome to the group chat! Introduce yourselves \
and coordinate here until your team is given a task. Once you have a task, keep your shared \
work committed and pulled regularly so everyone sees the same state.";

/// Group relay settings (server side and client side).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Base URL agents use to reach the group relay
    pub group_url: String,
    /// Bind host for `crewloop relay`
    pub host: String,
    /// Bind port for `crewloop relay`
    pub port: u16,
    /// Append-only group log
    pub log_file: String,
    /// First message in a freshly created log
    pub initial_message: String,
    /// Timeout for relay sends in seconds
    pub timeout_secs: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            group_url: "http://127.0.0.1:5000".to_string(),
            host: "0.0.0.0".to_string(),
            port: 5000,
            log_file: "chat_messages.txt".to_string(),
            initial_message: DEFAULT_INITIAL_GROUP_MESSAGE.to_string(),
            timeout_secs: 5,
        }
    }
}

// ============================================================================
// Oversight Settings
// ============================================================================

/// Where suspicious-activity reports go.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OversightSettings {
    pub base_url: String,
    pub audit_log: String,
    pub timeout_secs: u64,
}

impl Default for OversightSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8083".to_string(),
            audit_log: "logs/suspicious_activity_reports.log".to_string(),
            timeout_secs: 30,
        }
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Provider credentials.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    pub anthropic: ProviderConfig,
}

/// Credentials and endpoint for one provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// Compact one-line output, grep-friendly
    #[default]
    Component,
    /// JSON lines for log aggregators
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Optional file to append log lines to
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}
