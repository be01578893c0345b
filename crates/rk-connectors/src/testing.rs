//! Testing harness for connector implementations.
//!
//! Helpers shared by connector tests and by downstream crates that drive the
//! engine against mocks.

use crate::traits::{
    AuthConfig, CommunityMember, ConnectorConfig, ConnectorHealth, ConnectorResult,
    MembershipRecord,
};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Creates a test connector config with sensible defaults.
pub fn test_connector_config(name: &str, base_url: &str) -> ConnectorConfig {
    ConnectorConfig {
        name: name.to_string(),
        base_url: base_url.to_string(),
        auth: AuthConfig::None,
        timeout_secs: 30,
        max_retries: 0,
        verify_tls: true,
        headers: HashMap::new(),
    }
}

/// Creates a test connector config with bearer token auth.
pub fn test_connector_config_with_bearer(
    name: &str,
    base_url: &str,
    token: &str,
) -> ConnectorConfig {
    ConnectorConfig {
        auth: AuthConfig::BearerToken {
            token: crate::SecureString::from(token),
        },
        ..test_connector_config(name, base_url)
    }
}

/// Creates a current member carrying a primary group address.
pub fn sample_member(id: &str, display_name: &str, group_email: &str) -> MembershipRecord {
    let (first, last) = display_name
        .split_once(' ')
        .unwrap_or((display_name, ""));
    MembershipRecord {
        id: id.to_string(),
        display_name: display_name.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: Some(group_email.to_string()),
        group_email: Some(group_email.to_string()),
        barcode: Some(format!("B-{}", id)),
        membership_end_date: NaiveDate::from_ymd_opt(2030, 1, 31),
        membership_status: "Current".to_string(),
        ..Default::default()
    }
}

/// Same as [`sample_member`] with a chat platform user id attached.
pub fn sample_member_with_chat(
    id: &str,
    display_name: &str,
    group_email: &str,
    chat_user_id: &str,
) -> MembershipRecord {
    MembershipRecord {
        chat_user_id: Some(chat_user_id.to_string()),
        ..sample_member(id, display_name, group_email)
    }
}

/// Creates a community member.
pub fn sample_community_member(
    user_id: &str,
    username: &str,
    nick: Option<&str>,
    has_member_role: bool,
) -> CommunityMember {
    CommunityMember {
        user_id: user_id.to_string(),
        username: username.to_string(),
        nick: nick.map(str::to_string),
        has_member_role,
    }
}

/// Asserts that a connector health check returns healthy.
pub fn assert_healthy(result: &ConnectorResult<ConnectorHealth>) {
    match result {
        Ok(ConnectorHealth::Healthy) => {}
        other => panic!("Expected Healthy, got {:?}", other),
    }
}

/// Asserts that a connector health check returns unhealthy.
pub fn assert_unhealthy(result: &ConnectorResult<ConnectorHealth>) {
    match result {
        Ok(ConnectorHealth::Unhealthy(_)) => {}
        other => panic!("Expected Unhealthy, got {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_connector_config_with_bearer() {
        let config =
            test_connector_config_with_bearer("test", "https://api.example.com", "token123");
        assert_eq!(config.name, "test");
        assert!(matches!(config.auth, AuthConfig::BearerToken { .. }));
    }

    #[test]
    fn test_sample_member_splits_name() {
        let member = sample_member("1", "Ada Lovelace", "ada@example.com");
        assert_eq!(member.first_name, "Ada");
        assert_eq!(member.last_name, "Lovelace");
        assert_eq!(member.group_email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_assert_unhealthy() {
        let result: ConnectorResult<ConnectorHealth> =
            Ok(ConnectorHealth::Unhealthy("down".to_string()));
        assert_unhealthy(&result);
    }
}
