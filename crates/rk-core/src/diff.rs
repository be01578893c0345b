//! Diff engine.
//!
//! Computes the additions and deletions that make a directory snapshot match
//! the source set. Entries present on both sides are left alone even when
//! their display values differ.

use crate::directory::{DirectoryEntry, DirectoryKind};
use crate::identity::IdentityKey;
use crate::roster::SourceSet;
use std::collections::{BTreeMap, HashSet};

/// One proposed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub key: IdentityKey,
    /// Value recorded in the report.
    pub display: String,
    /// Value handed to the directory.
    pub handle: String,
}

/// Proposed mutations for one directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub additions: Vec<Change>,
    pub deletions: Vec<Change>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }
}

/// Diffs `source` against a directory `snapshot`.
///
/// - A source identity with an active entry is untouched.
/// - A source identity with an inactive entry is an addition, displayed and
///   addressed as the directory knows it.
/// - A source identity with no entry is an addition (displayed and addressed
///   by its source value) only for directories that admit strangers.
/// - An active entry with no source identity is a deletion.
///
/// Additions follow key order, deletions follow snapshot order. When a
/// snapshot holds two entries with the same key the first one is used.
pub fn diff(source: &SourceSet, snapshot: &[DirectoryEntry], kind: DirectoryKind) -> Diff {
    let mut target: BTreeMap<&IdentityKey, &DirectoryEntry> = BTreeMap::new();
    for entry in snapshot {
        target.entry(&entry.key).or_insert(entry);
    }

    let additions = source
        .iter()
        .filter_map(|(key, display)| match target.get(key) {
            Some(entry) if entry.active => None,
            Some(entry) => Some(Change {
                key: key.clone(),
                display: entry.display.clone(),
                handle: entry.handle.clone(),
            }),
            None if kind.admits_strangers() => Some(Change {
                key: key.clone(),
                display: display.clone(),
                handle: display.clone(),
            }),
            None => None,
        })
        .collect();

    let mut seen = HashSet::new();
    let deletions = snapshot
        .iter()
        .filter(|entry| seen.insert(&entry.key))
        .filter(|entry| entry.active && !source.contains_key(&entry.key))
        .map(|entry| Change {
            key: entry.key.clone(),
            display: entry.display.clone(),
            handle: entry.handle.clone(),
        })
        .collect();

    Diff {
        additions,
        deletions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::normalize;

    fn source(entries: &[&str]) -> SourceSet {
        entries
            .iter()
            .map(|e| (normalize(e), e.to_string()))
            .collect()
    }

    fn group_entry(email: &str) -> DirectoryEntry {
        DirectoryEntry {
            key: normalize(email),
            display: email.to_string(),
            handle: email.to_string(),
            active: true,
        }
    }

    fn community_entry(id: &str, nick: &str, active: bool) -> DirectoryEntry {
        DirectoryEntry {
            key: IdentityKey::verbatim(id),
            display: nick.to_string(),
            handle: id.to_string(),
            active,
        }
    }

    fn displays(changes: &[Change]) -> HashSet<&str> {
        changes.iter().map(|c| c.display.as_str()).collect()
    }

    #[test]
    fn test_basic_add_and_delete() {
        let result = diff(
            &source(&["a@x.com", "b@x.com"]),
            &[group_entry("b@x.com"), group_entry("c@x.com")],
            DirectoryKind::Group,
        );
        assert_eq!(displays(&result.additions), HashSet::from(["a@x.com"]));
        assert_eq!(displays(&result.deletions), HashSet::from(["c@x.com"]));
    }

    #[test]
    fn test_normalization_equivalence_means_no_change() {
        let result = diff(
            &source(&["A.B@X.com"]),
            &[group_entry("ab@x.com")],
            DirectoryKind::Group,
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_empty_source_deletes_everything() {
        let snapshot = [group_entry("a@x.com"), group_entry("b@x.com")];
        let result = diff(&SourceSet::new(), &snapshot, DirectoryKind::Group);
        assert!(result.additions.is_empty());
        assert_eq!(displays(&result.deletions), HashSet::from(["a@x.com", "b@x.com"]));
    }

    #[test]
    fn test_empty_target_adds_everything() {
        let result = diff(&source(&["a@x.com", "b@x.com"]), &[], DirectoryKind::Group);
        assert_eq!(displays(&result.additions), HashSet::from(["a@x.com", "b@x.com"]));
        assert!(result.deletions.is_empty());
    }

    #[test]
    fn test_diff_completeness() {
        let src = source(&["a@x.com", "b@x.com", "c.c@x.com"]);
        let snapshot = [group_entry("cc@x.com"), group_entry("d@x.com")];
        let result = diff(&src, &snapshot, DirectoryKind::Group);

        let added: HashSet<_> = result.additions.iter().map(|c| c.key.clone()).collect();
        let deleted: HashSet<_> = result.deletions.iter().map(|c| c.key.clone()).collect();
        let src_keys: HashSet<_> = src.keys().cloned().collect();
        let tgt_keys: HashSet<_> = snapshot.iter().map(|e| e.key.clone()).collect();

        assert_eq!(added, &src_keys - &tgt_keys);
        assert_eq!(deleted, &tgt_keys - &src_keys);
        assert!(added.is_disjoint(&deleted));
    }

    #[test]
    fn test_community_rules() {
        let src: SourceSet = [
            (IdentityKey::verbatim("1"), "Ada Lovelace".to_string()),
            (IdentityKey::verbatim("2"), "Bob Stone".to_string()),
            (IdentityKey::verbatim("9"), "Not In Guild".to_string()),
        ]
        .into_iter()
        .collect();
        let snapshot = [
            community_entry("1", "ada", true),
            community_entry("2", "bobby", false),
            community_entry("3", "mallory", true),
            community_entry("4", "visitor", false),
        ];

        let result = diff(&src, &snapshot, DirectoryKind::Community);
        assert_eq!(displays(&result.additions), HashSet::from(["bobby"]));
        assert_eq!(result.additions[0].handle, "2");
        assert_eq!(displays(&result.deletions), HashSet::from(["mallory"]));
    }

    #[test]
    fn test_duplicate_snapshot_keys_use_first_entry() {
        let snapshot = [group_entry("a.b@x.com"), group_entry("AB@x.com")];
        let result = diff(&SourceSet::new(), &snapshot, DirectoryKind::Group);
        assert_eq!(result.deletions.len(), 1);
        assert_eq!(result.deletions[0].handle, "a.b@x.com");
    }
}
