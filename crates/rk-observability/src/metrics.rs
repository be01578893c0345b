//! Metrics for reconciliation runs.
//!
//! Everything is recorded through the `metrics` facade, so it is a no-op
//! until a recorder is installed (see [`install_prometheus_recorder`]).
//! [`RunMetrics`] also keeps an in-process tally for the status endpoint.

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;

pub const RUNS_TOTAL: &str = "rk_reconcile_runs_total";
pub const MUTATIONS_TOTAL: &str = "rk_mutations_total";
pub const SKIPPED_DIRECTORIES_TOTAL: &str = "rk_skipped_directories_total";
pub const REPORTS_SENT_TOTAL: &str = "rk_reports_sent_total";
pub const RUN_DURATION_SECONDS: &str = "rk_reconcile_duration_seconds";

/// Errors raised while installing a metrics exporter.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Failed to install Prometheus recorder: {0}")]
    Install(String),
}

/// Installs the global Prometheus recorder and returns its render handle.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, MetricsError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))
}

/// Counts observed since process start.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunTally {
    pub runs: u64,
    pub degraded_runs: u64,
    pub aborted_runs: u64,
    pub mutations_applied: u64,
    pub mutations_failed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Records run and mutation metrics.
#[derive(Debug, Default)]
pub struct RunMetrics {
    runs: AtomicU64,
    degraded_runs: AtomicU64,
    aborted_runs: AtomicU64,
    mutations_applied: AtomicU64,
    mutations_failed: AtomicU64,
    last_run_at: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl RunMetrics {
    /// Creates a collector and registers metric descriptions.
    pub fn new() -> Self {
        Self::register_metrics();
        Self::default()
    }

    fn register_metrics() {
        describe_counter!(RUNS_TOTAL, "Reconciliation runs by outcome and mode");
        describe_counter!(
            MUTATIONS_TOTAL,
            "Directory mutations attempted, by directory, operation and result"
        );
        describe_counter!(
            SKIPPED_DIRECTORIES_TOTAL,
            "Directories skipped because their snapshot could not be fetched"
        );
        describe_counter!(REPORTS_SENT_TOTAL, "Report distribution attempts by result");
        describe_histogram!(RUN_DURATION_SECONDS, "Wall time of a reconciliation run");
    }

    /// Records one mutation attempt. `op` is `add` or `delete`.
    pub fn record_mutation(&self, directory: &str, op: &'static str, success: bool) {
        let result = if success { "success" } else { "failure" };
        counter!(MUTATIONS_TOTAL, "directory" => directory.to_string(), "op" => op, "result" => result)
            .increment(1);
        let tally = if success {
            &self.mutations_applied
        } else {
            &self.mutations_failed
        };
        tally.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a directory that was skipped.
    pub fn record_skipped_directory(&self, directory: &str) {
        counter!(SKIPPED_DIRECTORIES_TOTAL, "directory" => directory.to_string()).increment(1);
    }

    /// Records a finished run. `outcome` is `clean`, `degraded` or `aborted`.
    pub fn record_run(&self, outcome: &'static str, simulated: bool, duration: Duration) {
        let mode = if simulated { "simulate" } else { "apply" };
        counter!(RUNS_TOTAL, "outcome" => outcome, "mode" => mode).increment(1);
        histogram!(RUN_DURATION_SECONDS, "mode" => mode).record(duration.as_secs_f64());

        self.runs.fetch_add(1, Ordering::Relaxed);
        match outcome {
            "degraded" => {
                self.degraded_runs.fetch_add(1, Ordering::Relaxed);
            }
            "aborted" => {
                self.aborted_runs.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        if let Ok(mut last) = self.last_run_at.write() {
            *last = Some(Utc::now());
        }
    }

    /// Records a report distribution attempt.
    pub fn record_report_sent(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        counter!(REPORTS_SENT_TOTAL, "result" => result).increment(1);
    }

    /// Snapshot of the in-process tally.
    pub fn tally(&self) -> RunTally {
        RunTally {
            runs: self.runs.load(Ordering::Relaxed),
            degraded_runs: self.degraded_runs.load(Ordering::Relaxed),
            aborted_runs: self.aborted_runs.load(Ordering::Relaxed),
            mutations_applied: self.mutations_applied.load(Ordering::Relaxed),
            mutations_failed: self.mutations_failed.load(Ordering::Relaxed),
            last_run_at: self.last_run_at.read().ok().and_then(|t| *t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_counts_runs_and_mutations() {
        let metrics = RunMetrics::new();
        metrics.record_mutation("groups", "add", true);
        metrics.record_mutation("groups", "delete", false);
        metrics.record_run("degraded", false, Duration::from_millis(20));
        metrics.record_run("clean", true, Duration::from_millis(5));

        let tally = metrics.tally();
        assert_eq!(tally.runs, 2);
        assert_eq!(tally.degraded_runs, 1);
        assert_eq!(tally.aborted_runs, 0);
        assert_eq!(tally.mutations_applied, 1);
        assert_eq!(tally.mutations_failed, 1);
        assert!(tally.last_run_at.is_some());
    }

    #[test]
    fn test_fresh_tally_is_empty() {
        assert_eq!(RunMetrics::new().tally(), RunTally::default());
    }
}
