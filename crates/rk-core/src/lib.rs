//! # rk-core
//!
//! Reconciliation engine for Roster Keeper.
//!
//! Keeps the group directory and every chat community in line with the
//! membership records held by the source of truth. A run computes the
//! minimal additions and removals per directory, applies them (unless
//! simulating), isolates per-entry failures and returns a [`Report`].

pub mod applier;
pub mod diff;
pub mod directory;
pub mod identity;
pub mod orchestrator;
pub mod overlay;
pub mod report;
pub mod roster;

pub use applier::{MutationApplier, Phase, DEFAULT_MAX_CONCURRENT_MUTATIONS};
pub use diff::{diff, Change, Diff};
pub use directory::{
    CommunityDirectory, DirectoryEntry, DirectoryKind, GroupDirectory, TargetDirectory,
};
pub use identity::{normalize, IdentityKey};
pub use orchestrator::{ReconcileError, Reconciler, ReconcilerConfig, DEFAULT_REPORT_SUBJECT};
pub use overlay::overlay;
pub use report::{ChangeSet, Report, RunStatus, SkippedDirectory};
pub use roster::{Keyspace, SourceRoster, SourceSet};
