//! Run orchestrator.
//!
//! One call to [`Reconciler::run`] is one reconciliation:
//!
//! 1. fetch the source roster (failure aborts the run)
//! 2. overlay the configured exceptions
//! 3. push the roster to the check-in mirror (applied runs only)
//! 4. for each directory: fetch snapshot, diff, apply, record
//! 5. finalize the report and mail it if anything changed
//!
//! Directories are processed one after another. A directory whose snapshot
//! cannot be fetched is skipped and the run is marked degraded.

use crate::applier::{MutationApplier, DEFAULT_MAX_CONCURRENT_MUTATIONS};
use crate::diff::diff;
use crate::directory::{DirectoryKind, TargetDirectory};
use crate::report::{Report, SkippedDirectory};
use crate::roster::SourceRoster;
use chrono::Utc;
use rk_connectors::{Connector, ConnectorError, MembershipSource, ReportMailer, RosterMirror};
use rk_observability::{run_span, RunMetrics};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Default subject line of distributed reports.
pub const DEFAULT_REPORT_SUBJECT: &str = "Roster Keeper Reconciliation Report";

/// Errors that abort a run.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Source of truth unavailable: {0}")]
    SourceUnavailable(#[source] ConnectorError),
}

/// Configuration for the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Addresses kept in group directories without a membership record.
    pub exceptions: Vec<String>,
    /// In-flight mutations per directory.
    pub max_concurrent_mutations: usize,
    pub report_subject: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            exceptions: Vec::new(),
            max_concurrent_mutations: DEFAULT_MAX_CONCURRENT_MUTATIONS,
            report_subject: DEFAULT_REPORT_SUBJECT.to_string(),
        }
    }
}

/// Reconciles every configured directory against the source of truth.
pub struct Reconciler {
    source: Arc<dyn MembershipSource>,
    directories: Vec<Arc<dyn TargetDirectory>>,
    mirror: Option<Arc<dyn RosterMirror>>,
    mailer: Option<Arc<dyn ReportMailer>>,
    config: ReconcilerConfig,
    metrics: Arc<RunMetrics>,
}

impl Reconciler {
    pub fn new(source: Arc<dyn MembershipSource>, config: ReconcilerConfig) -> Self {
        Self {
            source,
            directories: Vec::new(),
            mirror: None,
            mailer: None,
            config,
            metrics: Arc::new(RunMetrics::new()),
        }
    }

    /// Adds a target directory. Directories run in insertion order.
    pub fn with_directory(mut self, directory: Arc<dyn TargetDirectory>) -> Self {
        self.directories.push(directory);
        self
    }

    pub fn with_mirror(mut self, mirror: Arc<dyn RosterMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn ReportMailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<RunMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<RunMetrics> {
        &self.metrics
    }

    /// Names of the configured directories, in run order.
    pub fn directory_names(&self) -> Vec<&str> {
        self.directories.iter().map(|d| d.name()).collect()
    }

    /// Runs one reconciliation. With `simulate` set, nothing is mutated,
    /// uploaded or mailed.
    pub async fn run(&self, simulate: bool, operator: &str) -> Result<Report, ReconcileError> {
        let run_id = Uuid::new_v4();
        self.run_inner(simulate, operator)
            .instrument(run_span!(run_id, simulate))
            .await
    }

    async fn run_inner(&self, simulate: bool, operator: &str) -> Result<Report, ReconcileError> {
        let started = Instant::now();
        let mut report = Report::begin(Utc::now(), operator, simulate);
        info!(operator, "Starting reconciliation");

        let records = match self.source.fetch_current_members().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Failed to fetch source roster, aborting run");
                self.metrics
                    .record_run("aborted", simulate, started.elapsed());
                return Err(ReconcileError::SourceUnavailable(e));
            }
        };
        let roster = SourceRoster::from_records(records).with_exceptions(&self.config.exceptions);
        info!(records = roster.records().len(), "Fetched source roster");

        if !simulate {
            if let Some(mirror) = &self.mirror {
                if let Err(e) = mirror.bulk_upload(roster.records()).await {
                    error!(mirror = mirror.name(), error = %e, "Check-in roster upload failed");
                    report.checkin_synced = false;
                }
            }
        }

        for directory in &self.directories {
            self.reconcile_directory(directory.as_ref(), &roster, simulate, &mut report)
                .await;
        }

        let elapsed = started.elapsed();
        report.finalize(elapsed);
        self.metrics
            .record_run(report.status.as_str(), simulate, elapsed);
        info!(
            status = report.status.as_str(),
            duration_ms = report.duration_ms,
            skipped = report.skipped.len(),
            "Reconciliation finished"
        );

        if report.should_distribute() {
            self.distribute(&report).await;
        }

        Ok(report)
    }

    async fn reconcile_directory(
        &self,
        directory: &dyn TargetDirectory,
        roster: &SourceRoster,
        simulate: bool,
        report: &mut Report,
    ) {
        let name = directory.name();
        let kind = directory.kind();

        let snapshot = match directory.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(directory = name, error = %e, "Skipping directory, snapshot unavailable");
                self.metrics.record_skipped_directory(name);
                report.skipped.push(SkippedDirectory {
                    directory: name.to_string(),
                    error: e.to_string(),
                });
                return;
            }
        };

        let proposed = diff(roster.identities(kind.keyspace()), &snapshot, kind);
        info!(
            directory = name,
            kind = kind.as_str(),
            additions = proposed.additions.len(),
            deletions = proposed.deletions.len(),
            "Computed diff"
        );

        let changes = MutationApplier::new(directory)
            .with_max_concurrency(self.config.max_concurrent_mutations)
            .with_metrics(&self.metrics)
            .apply(proposed, simulate)
            .await;

        let section = match kind {
            DirectoryKind::Group => &mut report.groups,
            DirectoryKind::Community => &mut report.communities,
        };
        section.insert(name.to_string(), changes);
    }

    async fn distribute(&self, report: &Report) {
        let Some(mailer) = &self.mailer else {
            return;
        };
        match mailer
            .send_report(&self.config.report_subject, &report.render_text())
            .await
        {
            Ok(()) => {
                info!(mailer = mailer.name(), "Report distributed");
                self.metrics.record_report_sent(true);
            }
            Err(e) => {
                warn!(mailer = mailer.name(), error = %e, "Failed to send reconciliation report");
                self.metrics.record_report_sent(false);
            }
        }
    }
}
