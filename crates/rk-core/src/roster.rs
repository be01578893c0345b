//! Source roster: the desired state projected onto each key space.

use crate::identity::{normalize, IdentityKey};
use crate::overlay::overlay;
use rk_connectors::MembershipRecord;
use std::collections::BTreeMap;

/// Identities keyed for comparison, mapped to the display value used when
/// the identity has to be added somewhere.
pub type SourceSet = BTreeMap<IdentityKey, String>;

/// Key space a target directory compares in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyspace {
    /// Normalized group email addresses.
    Email,
    /// Chat platform user ids.
    ChatUserId,
}

/// The current members as fetched from the source of truth.
#[derive(Debug, Clone, Default)]
pub struct SourceRoster {
    records: Vec<MembershipRecord>,
    emails: SourceSet,
    chat_ids: SourceSet,
}

impl SourceRoster {
    /// Indexes `records`. The first record claiming a key wins.
    pub fn from_records(records: Vec<MembershipRecord>) -> Self {
        let mut emails = SourceSet::new();
        let mut chat_ids = SourceSet::new();

        for record in &records {
            for email in record.group_emails() {
                emails
                    .entry(normalize(email))
                    .or_insert_with(|| email.to_string());
            }
            if let Some(id) = record.chat_user_id.as_deref().filter(|id| !id.is_empty()) {
                chat_ids
                    .entry(IdentityKey::verbatim(id))
                    .or_insert_with(|| record.display_name.clone());
            }
        }

        Self {
            records,
            emails,
            chat_ids,
        }
    }

    /// Records exactly as fetched.
    pub fn records(&self) -> &[MembershipRecord] {
        &self.records
    }

    /// Source identities in the given key space.
    pub fn identities(&self, keyspace: Keyspace) -> &SourceSet {
        match keyspace {
            Keyspace::Email => &self.emails,
            Keyspace::ChatUserId => &self.chat_ids,
        }
    }

    /// Overlays allow-listed addresses onto the email key space.
    pub fn with_exceptions(self, exceptions: &[String]) -> Self {
        Self {
            emails: overlay(self.emails, exceptions),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_connectors::testing::{sample_member, sample_member_with_chat};

    #[test]
    fn test_indexes_both_group_addresses() {
        let mut member = sample_member("1", "Ada Lovelace", "Ada.L@example.com");
        member.group_email_alt = Some("ada@work.example".into());
        let roster = SourceRoster::from_records(vec![member]);

        let emails = roster.identities(Keyspace::Email);
        assert_eq!(emails.len(), 2);
        assert_eq!(
            emails.get(&normalize("adal@example.com")).map(String::as_str),
            Some("Ada.L@example.com")
        );
    }

    #[test]
    fn test_chat_ids_skip_missing_and_empty() {
        let mut blank = sample_member_with_chat("2", "Bob Stone", "bob@example.com", "");
        blank.chat_user_id = Some(String::new());
        let roster = SourceRoster::from_records(vec![
            sample_member_with_chat("1", "Ada Lovelace", "ada@example.com", "111"),
            blank,
            sample_member("3", "Cy Young", "cy@example.com"),
        ]);

        let ids = roster.identities(Keyspace::ChatUserId);
        assert_eq!(ids.len(), 1);
        assert_eq!(
            ids.get(&IdentityKey::verbatim("111")).map(String::as_str),
            Some("Ada Lovelace")
        );
    }

    #[test]
    fn test_exceptions_extend_email_space_only() {
        let roster = SourceRoster::from_records(vec![sample_member_with_chat(
            "1",
            "Ada Lovelace",
            "ada@example.com",
            "111",
        )])
        .with_exceptions(&["board@example.org".to_string()]);
        assert_eq!(roster.identities(Keyspace::Email).len(), 2);
        assert_eq!(roster.identities(Keyspace::ChatUserId).len(), 1);
    }

    #[test]
    fn test_first_record_wins_on_collision() {
        let roster = SourceRoster::from_records(vec![
            sample_member("1", "First", "a.b@example.com"),
            sample_member("2", "Second", "AB@example.com"),
        ]);
        let emails = roster.identities(Keyspace::Email);
        assert_eq!(emails.len(), 1);
        assert_eq!(emails.values().next().unwrap(), "a.b@example.com");
        assert_eq!(roster.records().len(), 2);
    }
}
