//! Identity normalization.
//!
//! Group directories rewrite addresses on their own (dropping dots, changing
//! case), so two spellings of one mailbox must compare equal. Chat platform
//! ids are opaque and are used verbatim.

use serde::Serialize;
use std::fmt;

/// Canonical comparison key for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Uses an already canonical id (e.g. a chat platform snowflake) as-is.
    pub fn verbatim(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-cases `raw` and removes every `.`.
///
/// Total and idempotent: `normalize(normalize(x).as_str()) == normalize(x)`.
pub fn normalize(raw: &str) -> IdentityKey {
    IdentityKey(raw.to_lowercase().replace('.', ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_dots_are_ignored() {
        assert_eq!(normalize("A.B@X.com"), normalize("ab@x.com"));
        assert_eq!(normalize("A.B@X.com").as_str(), "ab@xcom");
    }

    #[test]
    fn test_idempotent() {
        for raw in ["Jane.Doe@Example.ORG", "", "...", "plain", "ÅSA.L@x.se"] {
            let once = normalize(raw);
            assert_eq!(normalize(once.as_str()), once);
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize("").as_str(), "");
        assert_eq!(normalize("..").as_str(), "");
    }

    #[test]
    fn test_verbatim_preserves_ids() {
        let id = "81234567890123456";
        assert_eq!(IdentityKey::verbatim(id).as_str(), id);
        assert_eq!(normalize(id), IdentityKey::verbatim(id));
    }
}
