//! Logging initialization for crewloop.
//!
//! Supports three formats:
//! - `pretty`: human-readable multi-line output
//! - `component`: compact one-line output; use the [`log_component!`] macro to
//!   add a `component` field for per-subsystem filtering
//! - `json`: structured JSON lines for log aggregators

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{CrewError, Result};

/// Initialize the global tracing subscriber from config.
///
/// Call this once at startup before any tracing events are emitted.
/// Falls back to `RUST_LOG` env var; if unset, uses `cfg.level`.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    let file = match &cfg.file {
        Some(path) => Some(Mutex::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match (cfg.format, file) {
        (LogFormat::Json, Some(file)) => builder.json().with_writer(file).try_init(),
        (LogFormat::Json, None) => builder.json().try_init(),
        (LogFormat::Pretty, Some(file)) => builder.pretty().with_ansi(false).with_writer(file).try_init(),
        (LogFormat::Pretty, None) => builder.pretty().try_init(),
        (LogFormat::Component, Some(file)) => {
            builder.compact().with_ansi(false).with_writer(file).try_init()
        }
        (LogFormat::Component, None) => builder.compact().try_init(),
    };

    installed.map_err(|e| CrewError::Config(format!("failed to install logger: {}", e)))
}

/// Emit a component-tagged tracing event.
///
/// ```
/// # use crewloop::log_component;
/// log_component!(info, "relay", "message appended");
/// log_component!(warn, "agent", "token budget low", used = 48000u64, limit = 50000u64);
/// ```
#[macro_export]
macro_rules! log_component {
    ($level:ident, $component:expr, $msg:expr) => {
        tracing::$level!(component = $component, $msg)
    };
    ($level:ident, $component:expr, $msg:expr, $($key:ident = $val:expr),+ $(,)?) => {
        tracing::$level!(component = $component, $($key = $val,)+ $msg)
    };
}

#[cfg(test)]
mod tests {
    use crate::config::{LogFormat, LoggingConfig};

    #[test]
    fn test_default_logging_config() {
        let cfg = LoggingConfig::default();
        assert_eq!(cfg.format, LogFormat::Component);
        assert_eq!(cfg.level, "info");
        assert!(cfg.file.is_none());
    }

    #[test]
    fn test_log_format_partial_config_uses_defaults() {
        let cfg: LoggingConfig = serde_json::from_str(r#"{"level":"trace"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Component);
        assert!(cfg.file.is_none());
        assert_eq!(cfg.level, "trace");
    }

    #[test]
    fn test_log_component_macro_compiles() {
        log_component!(debug, "queue", "drained");
        log_component!(info, "loop", "iteration", n = 3u32);
    }
}
