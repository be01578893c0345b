//! Run report.
//!
//! The report is the only output of a run: what each directory was asked to
//! change, what failed, and whether the run as a whole is trustworthy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Changes for one directory in one run. Failed entries stay in
/// `additions`/`deletions` and are also listed in `failures`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(rename = "add", default)]
    pub additions: Vec<String>,
    #[serde(rename = "delete", default)]
    pub deletions: Vec<String>,
    #[serde(rename = "errored", default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl ChangeSet {
    /// True when nothing was proposed and nothing failed.
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty() && self.failures.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every directory reconciled without failures.
    Clean,
    /// Something failed or was skipped; the report is still complete for
    /// everything else.
    Degraded,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Clean => "clean",
            RunStatus::Degraded => "degraded",
        }
    }
}

/// A directory left out of the run because its snapshot could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDirectory {
    pub directory: String,
    pub error: String,
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(rename = "executionDate")]
    pub timestamp: DateTime<Utc>,
    /// Wall time in milliseconds.
    #[serde(rename = "executionDuration")]
    pub duration_ms: u64,
    pub operator: String,
    /// Whether the check-in system accepted the roster. Stays true when the
    /// upload was not attempted.
    pub checkin_synced: bool,
    pub simulated: bool,
    pub status: RunStatus,
    pub groups: BTreeMap<String, ChangeSet>,
    pub communities: BTreeMap<String, ChangeSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedDirectory>,
}

impl Report {
    /// Starts an empty report; status is derived by [`Report::finalize`].
    pub fn begin(timestamp: DateTime<Utc>, operator: &str, simulated: bool) -> Self {
        Self {
            timestamp,
            duration_ms: 0,
            operator: operator.to_string(),
            checkin_synced: true,
            simulated,
            status: RunStatus::Clean,
            groups: BTreeMap::new(),
            communities: BTreeMap::new(),
            skipped: Vec::new(),
        }
    }

    /// Iterates over every directory's change set.
    pub fn change_sets(&self) -> impl Iterator<Item = (&String, &ChangeSet)> {
        self.groups.iter().chain(self.communities.iter())
    }

    /// True if any directory recorded an addition, deletion or failure.
    pub fn has_changes(&self) -> bool {
        self.change_sets().any(|(_, changes)| !changes.is_empty())
    }

    /// Derives the overall status from the recorded outcomes.
    pub fn derive_status(&self) -> RunStatus {
        let failed = self.change_sets().any(|(_, c)| c.has_failures());
        if failed || !self.skipped.is_empty() || !self.checkin_synced {
            RunStatus::Degraded
        } else {
            RunStatus::Clean
        }
    }

    /// Stamps the duration and status.
    pub fn finalize(&mut self, duration: std::time::Duration) {
        self.duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.status = self.derive_status();
    }

    /// Whether the report should be mailed out.
    pub fn should_distribute(&self) -> bool {
        !self.simulated && self.has_changes()
    }

    pub fn checkin_status(&self) -> &'static str {
        if self.checkin_synced {
            "SUCCESSFUL"
        } else {
            "NOT SUCCESSFUL"
        }
    }

    /// Plain-text rendering used as the mail body and by the CLI.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let mode = if self.simulated { "simulation" } else { "applied" };

        let _ = writeln!(out, "Reconciliation report");
        let _ = writeln!(out, "=====================");
        let _ = writeln!(
            out,
            "Date:      {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(out, "Duration:  {} ms", self.duration_ms);
        if !self.operator.is_empty() {
            let _ = writeln!(out, "Operator:  {}", self.operator);
        }
        let _ = writeln!(out, "Mode:      {}", mode);
        let _ = writeln!(out, "Status:    {}", self.status.as_str());
        let _ = writeln!(out, "Check-in:  {}", self.checkin_status());

        render_section(&mut out, "Groups", &self.groups);
        render_section(&mut out, "Communities", &self.communities);

        if !self.skipped.is_empty() {
            let _ = writeln!(out, "\nSkipped directories");
            for skipped in &self.skipped {
                let _ = writeln!(out, "  - {}: {}", skipped.directory, skipped.error);
            }
        }
        out
    }
}

fn render_section(out: &mut String, title: &str, sets: &BTreeMap<String, ChangeSet>) {
    if sets.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{}", title);
    for (name, changes) in sets {
        let _ = writeln!(out, "\n[{}]", name);
        if changes.is_empty() {
            let _ = writeln!(out, "  No changes");
            continue;
        }
        render_list(out, "Added", &changes.additions);
        render_list(out, "Removed", &changes.deletions);
        render_list(out, "Errors", &changes.failures);
    }
}

fn render_list(out: &mut String, label: &str, entries: &[String]) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "  {} ({}):", label, entries.len());
    for entry in entries {
        let _ = writeln!(out, "    - {}", entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report() -> Report {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        Report::begin(ts, "alice", false)
    }

    fn changes(add: &[&str], del: &[&str], failed: &[&str]) -> ChangeSet {
        let owned = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        ChangeSet {
            additions: owned(add),
            deletions: owned(del),
            failures: owned(failed),
        }
    }

    #[test]
    fn test_json_field_names() {
        let mut report = report();
        report
            .groups
            .insert("members".into(), changes(&["a@x.com"], &[], &[]));
        report
            .communities
            .insert("forge".into(), ChangeSet::default());
        report.finalize(std::time::Duration::from_millis(1500));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["executionDuration"], 1500);
        assert_eq!(json["checkinSynced"], true);
        assert_eq!(json["status"], "clean");
        assert_eq!(json["groups"]["members"]["add"][0], "a@x.com");
        assert!(json["groups"]["members"].get("errored").is_none());
        assert_eq!(json["groups"]["members"]["delete"], serde_json::json!([]));
        assert_eq!(json["communities"]["forge"]["add"], serde_json::json!([]));
        assert_eq!(json["communities"]["forge"]["delete"], serde_json::json!([]));
        assert!(json["communities"]["forge"].get("errored").is_none());
        assert!(json.get("skipped").is_none());
        assert!(json.get("executionDate").is_some());
    }

    #[test]
    fn test_status_degrades_on_failure_skip_or_checkin() {
        let mut r = report();
        r.groups.insert("members".into(), changes(&["a"], &[], &[]));
        assert_eq!(r.derive_status(), RunStatus::Clean);

        r.communities.insert("forge".into(), changes(&[], &["b"], &["b"]));
        assert_eq!(r.derive_status(), RunStatus::Degraded);

        let mut r = report();
        r.skipped.push(SkippedDirectory {
            directory: "members".into(),
            error: "timeout".into(),
        });
        assert_eq!(r.derive_status(), RunStatus::Degraded);

        let mut r = report();
        r.checkin_synced = false;
        assert_eq!(r.derive_status(), RunStatus::Degraded);
    }

    #[test]
    fn test_should_distribute() {
        let mut r = report();
        r.groups.insert("members".into(), ChangeSet::default());
        assert!(!r.should_distribute());

        r.groups.insert("members".into(), changes(&[], &["gone@x.com"], &[]));
        assert!(r.should_distribute());

        r.simulated = true;
        assert!(!r.should_distribute());
    }

    #[test]
    fn test_render_text() {
        let mut r = report();
        r.checkin_synced = false;
        r.groups
            .insert("members".into(), changes(&["a@x.com"], &["c@x.com"], &["c@x.com"]));
        r.communities.insert("forge".into(), ChangeSet::default());
        r.skipped.push(SkippedDirectory {
            directory: "annex".into(),
            error: "Connection failed: refused".into(),
        });
        r.finalize(std::time::Duration::from_millis(42));

        let text = r.render_text();
        assert!(text.contains("Date:      2026-03-01 12:00:00 UTC"));
        assert!(text.contains("Operator:  alice"));
        assert!(text.contains("Check-in:  NOT SUCCESSFUL"));
        assert!(text.contains("Status:    degraded"));
        assert!(text.contains("[members]\n  Added (1):\n    - a@x.com\n  Removed (1):\n    - c@x.com\n  Errors (1):\n    - c@x.com"));
        assert!(text.contains("[forge]\n  No changes"));
        assert!(text.contains("  - annex: Connection failed: refused"));
    }
}
