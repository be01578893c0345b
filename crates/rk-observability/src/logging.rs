//! Logging infrastructure for Roster Keeper.
//!
//! Structured logging using the tracing ecosystem. Events go to stderr so
//! command output on stdout stays machine-readable. `RUST_LOG` overrides the
//! configured level when set.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Crates whose events pass the default filter.
const WORKSPACE_TARGETS: &[&str] = &[
    "rk_core",
    "rk_connectors",
    "rk_observability",
    "rk_api",
    "rk_cli",
    "roster_keeper",
];

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level.
    pub level: Level,
    /// Whether to use JSON format.
    pub json_format: bool,
    /// Whether to include span events.
    pub include_spans: bool,
    /// Whether to include file/line info.
    pub include_location: bool,
    /// Whether to include thread IDs.
    pub include_thread_ids: bool,
    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            include_spans: false,
            include_location: false,
            include_thread_ids: false,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    /// Verbose output for local runs.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            json_format: false,
            include_spans: true,
            include_location: true,
            include_thread_ids: true,
            include_target: true,
        }
    }

    /// JSON output for log aggregation.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            json_format: true,
            include_spans: false,
            include_location: false,
            include_thread_ids: false,
            include_target: true,
        }
    }

    /// Builds a config from the settings file.
    pub fn from_settings(settings: &LogSettings) -> Self {
        let base = if settings.json {
            Self::production()
        } else {
            Self::default()
        };
        Self {
            level: Level::from_str(&settings.level).unwrap_or(Level::INFO),
            ..base
        }
    }

    /// Filter directive used when `RUST_LOG` is unset.
    pub fn default_directive(&self) -> String {
        WORKSPACE_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Logging section of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogSettings {
    /// `trace`, `debug`, `info`, `warn` or `error`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// Initializes the logging system with default configuration.
pub fn init_logging() {
    init_logging_with_config(LoggingConfig::default());
}

/// Initializes the logging system with the given configuration.
pub fn init_logging_with_config(config: LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let span_events = if config.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_target(config.include_target)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    } else {
        let fmt_layer = fmt::layer()
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_target(config.include_target)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }
}

/// Creates a span covering one reconciliation run.
#[macro_export]
macro_rules! run_span {
    ($run_id:expr, $simulate:expr) => {
        tracing::info_span!("reconcile", run_id = %$run_id, simulate = $simulate)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_config() {
        let config = LoggingConfig::production();
        assert_eq!(config.level, Level::INFO);
        assert!(config.json_format);
    }

    #[test]
    fn test_development_config() {
        let config = LoggingConfig::development();
        assert_eq!(config.level, Level::DEBUG);
        assert!(!config.json_format);
    }

    #[test]
    fn test_from_settings() {
        let config = LoggingConfig::from_settings(&LogSettings {
            level: "warn".to_string(),
            json: true,
        });
        assert_eq!(config.level, Level::WARN);
        assert!(config.json_format);

        let fallback = LoggingConfig::from_settings(&LogSettings {
            level: "loud".to_string(),
            json: false,
        });
        assert_eq!(fallback.level, Level::INFO);
    }

    #[test]
    fn test_default_directive_covers_workspace() {
        let directive = LoggingConfig::default().default_directive();
        assert!(directive.contains("rk_core=INFO"));
        assert!(directive.contains("rk_cli=INFO"));
    }
}
