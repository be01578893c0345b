//! Mutation applier.
//!
//! Applies a [`Diff`] to a [`TargetDirectory`]. Each entry is attempted
//! exactly once; a failure is logged and recorded but never stops the batch.
//! Calls run with bounded parallelism and results are collected in input
//! order, so the change set is deterministic.

use crate::diff::{Change, Diff};
use crate::directory::TargetDirectory;
use crate::report::ChangeSet;
use futures::stream::{self, StreamExt};
use rk_observability::RunMetrics;
use tracing::{error, info};

/// Default number of in-flight mutations per directory.
pub const DEFAULT_MAX_CONCURRENT_MUTATIONS: usize = 4;

/// Direction of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Addition,
    Removal,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Addition => "add",
            Phase::Removal => "delete",
        }
    }
}

/// Applies diffs to one directory.
pub struct MutationApplier<'a> {
    directory: &'a dyn TargetDirectory,
    max_concurrency: usize,
    metrics: Option<&'a RunMetrics>,
}

impl<'a> MutationApplier<'a> {
    pub fn new(directory: &'a dyn TargetDirectory) -> Self {
        Self {
            directory,
            max_concurrency: DEFAULT_MAX_CONCURRENT_MUTATIONS,
            metrics: None,
        }
    }

    /// Caps in-flight mutations. Zero is treated as one.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: &'a RunMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Applies `diff`, or only records it when `simulate` is set.
    pub async fn apply(&self, diff: Diff, simulate: bool) -> ChangeSet {
        let mut changes = ChangeSet {
            additions: diff.additions.iter().map(|c| c.display.clone()).collect(),
            deletions: diff.deletions.iter().map(|c| c.display.clone()).collect(),
            failures: Vec::new(),
        };
        if simulate {
            return changes;
        }

        changes
            .failures
            .extend(self.run_phase(Phase::Addition, diff.additions).await);
        changes
            .failures
            .extend(self.run_phase(Phase::Removal, diff.deletions).await);
        changes
    }

    /// Runs one phase and returns the display values that failed.
    async fn run_phase(&self, phase: Phase, batch: Vec<Change>) -> Vec<String> {
        stream::iter(batch)
            .map(|change| self.apply_one(phase, change))
            .buffered(self.max_concurrency)
            .filter_map(|failed| async move { failed })
            .collect()
            .await
    }

    async fn apply_one(&self, phase: Phase, change: Change) -> Option<String> {
        let directory = self.directory.name();
        let result = match phase {
            Phase::Addition => self.directory.apply_addition(&change.handle).await,
            Phase::Removal => self.directory.apply_removal(&change.handle).await,
        };

        if let Some(metrics) = self.metrics {
            metrics.record_mutation(directory, phase.as_str(), result.is_ok());
        }

        match result {
            Ok(()) => {
                info!(directory, entry = %change.display, phase = phase.as_str(), "Applied change");
                None
            }
            Err(e) => {
                error!(
                    directory,
                    entry = %change.display,
                    phase = phase.as_str(),
                    error = %e,
                    "Failed to apply change"
                );
                Some(change.display)
            }
        }
    }
}
