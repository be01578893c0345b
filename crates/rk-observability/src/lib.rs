//! # rk-observability
//!
//! Logging and metrics infrastructure for Roster Keeper.
//!
//! Logging is `tracing` with an `EnvFilter`; metrics go through the
//! `metrics` facade and can be exported in Prometheus text format.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_config, LogSettings, LoggingConfig};
pub use metrics::{install_prometheus_recorder, MetricsError, RunMetrics, RunTally};
