//! Credential wrapper that scrubs its memory on drop.
//!
//! Every token, password and API key read from configuration is held in a
//! [`SecureString`]. `Debug` and `Display` never print the value.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Placeholder printed wherever a secret would otherwise appear.
pub const REDACTED: &str = "***REDACTED***";

/// A zeroize-on-drop string for credentials.
///
/// ```
/// use rk_connectors::SecureString;
///
/// let token = SecureString::from("bot-token");
/// assert_eq!(token.expose_secret(), "bot-token");
/// assert_eq!(format!("{token}"), "***REDACTED***");
/// ```
#[derive(Clone, Default)]
pub struct SecureString(Zeroizing<String>);

impl SecureString {
    pub fn new(s: String) -> Self {
        Self(Zeroizing::new(s))
    }

    /// Borrows the plaintext. Avoid copying the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compares against a candidate in constant time.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }

    /// Returns a copy whose value is the redaction marker, or empty if unset.
    pub fn redacted(&self) -> Self {
        if self.is_empty() {
            Self::default()
        } else {
            Self::from(REDACTED)
        }
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureString({REDACTED})")
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other.expose_secret())
    }
}

impl Eq for SecureString {}

// Serializes the plaintext so configuration files round-trip.
impl Serialize for SecureString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SecureString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_hide_value() {
        let secret = SecureString::from("hunter2");
        assert!(!format!("{:?}", secret).contains("hunter2"));
        assert!(!format!("{}", secret).contains("hunter2"));
    }

    #[test]
    fn test_matches() {
        let secret = SecureString::from("token-a");
        assert!(secret.matches("token-a"));
        assert!(!secret.matches("token-b"));
        assert!(!secret.matches("token-a-longer"));
    }

    #[test]
    fn test_redacted_keeps_empty_values_empty() {
        assert!(SecureString::default().redacted().is_empty());
        assert_eq!(SecureString::from("x").redacted().expose_secret(), REDACTED);
    }

    #[test]
    fn test_deserialize_from_yaml_scalar() {
        let secret: SecureString = serde_yaml::from_str("abc123").unwrap();
        assert_eq!(secret.expose_secret(), "abc123");
    }
}
