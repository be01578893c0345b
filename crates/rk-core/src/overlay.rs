//! Exception overlay.
//!
//! Some addresses (role accounts, staff) must stay in the group without a
//! membership record. They are injected into the source set before diffing.

use crate::identity::normalize;
use crate::roster::SourceSet;

/// Inserts each exception under its normalized key unless that key is
/// already present. The raw exception string becomes the display value.
pub fn overlay(mut source: SourceSet, exceptions: &[String]) -> SourceSet {
    for exception in exceptions {
        source
            .entry(normalize(exception))
            .or_insert_with(|| exception.clone());
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityKey;

    fn set(entries: &[&str]) -> SourceSet {
        entries
            .iter()
            .map(|e| (normalize(e), e.to_string()))
            .collect()
    }

    #[test]
    fn test_absent_exception_is_inserted() {
        let result = overlay(set(&["ada@example.com"]), &["Board@Example.org".to_string()]);
        assert_eq!(
            result.get(&normalize("board@example.org")).map(String::as_str),
            Some("Board@Example.org")
        );
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_present_key_keeps_source_display() {
        let result = overlay(set(&["a.b@example.com"]), &["AB@example.com".to_string()]);
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.get(&normalize("ab@example.com")).map(String::as_str),
            Some("a.b@example.com")
        );
    }

    #[test]
    fn test_no_exceptions_is_identity() {
        let source = set(&["x@example.com"]);
        assert_eq!(overlay(source.clone(), &[]), source);
        assert!(!overlay(source, &[]).contains_key(&IdentityKey::verbatim("y")));
    }
}
