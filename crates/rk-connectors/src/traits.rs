//! Connector trait definitions for Roster Keeper.
//!
//! This module defines the interfaces every external directory must implement.
//! The reconciliation engine only ever talks to these traits, never to a
//! vendor API directly.

use crate::secure_string::SecureString;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur in connectors.
#[derive(Error, Debug, Clone)]
pub enum ConnectorError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Health status of a connector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorHealth {
    /// Connector is healthy and operational.
    Healthy,
    /// Connector is degraded but still functional.
    Degraded(String),
    /// Connector is unhealthy and not operational.
    Unhealthy(String),
    /// Health status is unknown.
    Unknown,
}

/// Transport configuration shared by every HTTP-backed connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connector name/identifier. Filled from the config section when empty.
    #[serde(default)]
    pub name: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Authentication configuration.
    #[serde(default = "default_auth")]
    pub auth: AuthConfig,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum retries for read requests.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Whether to verify TLS certificates.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    /// Additional headers to include.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_auth() -> AuthConfig {
    AuthConfig::None
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_verify_tls() -> bool {
    true
}

/// Authentication configuration.
///
/// Credential fields use `SecureString` so they are zeroized on drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication.
    None,
    /// API key sent in a custom header.
    ApiKey {
        key: SecureString,
        header_name: String,
    },
    /// `Authorization: Bearer <token>`.
    BearerToken { token: SecureString },
    /// `Authorization: Bot <token>`, used by chat platform bots.
    BotToken { token: SecureString },
    /// HTTP basic authentication.
    Basic {
        username: String,
        password: SecureString,
    },
    /// OAuth2 client credentials grant.
    #[serde(rename = "oauth2")]
    OAuth2 {
        client_id: String,
        client_secret: SecureString,
        token_url: String,
        #[serde(default)]
        scopes: Vec<String>,
    },
    /// Access token minted by a cloud instance metadata server
    /// (`Metadata-Flavor: Google`), i.e. the workload's ambient identity.
    MetadataServer {
        token_url: String,
        #[serde(default)]
        scopes: Vec<String>,
    },
}

impl AuthConfig {
    /// Copy with every credential replaced by the redaction marker.
    pub fn redacted(&self) -> Self {
        match self {
            AuthConfig::ApiKey { key, header_name } => AuthConfig::ApiKey {
                key: key.redacted(),
                header_name: header_name.clone(),
            },
            AuthConfig::BearerToken { token } => AuthConfig::BearerToken {
                token: token.redacted(),
            },
            AuthConfig::BotToken { token } => AuthConfig::BotToken {
                token: token.redacted(),
            },
            AuthConfig::Basic { username, password } => AuthConfig::Basic {
                username: username.clone(),
                password: password.redacted(),
            },
            AuthConfig::OAuth2 {
                client_id,
                client_secret,
                token_url,
                scopes,
            } => AuthConfig::OAuth2 {
                client_id: client_id.clone(),
                client_secret: client_secret.redacted(),
                token_url: token_url.clone(),
                scopes: scopes.clone(),
            },
            other => other.clone(),
        }
    }
}

impl ConnectorConfig {
    /// Copy with credentials redacted.
    pub fn redacted(&self) -> Self {
        Self {
            auth: self.auth.redacted(),
            ..self.clone()
        }
    }
}

/// Category of an external directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorCategory {
    /// Authoritative membership records (CRM).
    MembershipSource,
    /// Mailing-list style group directory.
    GroupDirectory,
    /// Chat platform with per-community roles.
    Community,
    /// Door/check-in system fed with the full roster.
    RosterMirror,
    /// Outbound mail for report distribution.
    Mail,
}

impl std::fmt::Display for ConnectorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectorCategory::MembershipSource => "membership_source",
            ConnectorCategory::GroupDirectory => "group_directory",
            ConnectorCategory::Community => "community",
            ConnectorCategory::RosterMirror => "roster_mirror",
            ConnectorCategory::Mail => "mail",
        };
        f.write_str(s)
    }
}

/// Base trait for all connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the connector name.
    fn name(&self) -> &str;

    /// Returns the connector category.
    fn category(&self) -> ConnectorCategory;

    /// Checks the health of the connector.
    async fn health_check(&self) -> ConnectorResult<ConnectorHealth>;

    /// Tests the connection to the external system.
    async fn test_connection(&self) -> ConnectorResult<bool>;
}

// ============================================================================
// Source of truth
// ============================================================================

/// A member as recorded in the authoritative record store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    /// Opaque record id in the source system.
    pub id: String,
    /// Human display name.
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    /// Contact email (not used for group membership).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Primary address subscribed to the member group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_email: Option<String>,
    /// Secondary address subscribed to the member group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_email_alt: Option<String>,
    /// Chat platform user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_user_id: Option<String>,
    /// Badge barcode used by the check-in system.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_end_date: Option<NaiveDate>,
    pub membership_status: String,
}

impl MembershipRecord {
    /// Group addresses carried by this record, primary first.
    pub fn group_emails(&self) -> impl Iterator<Item = &str> {
        [self.group_email.as_deref(), self.group_email_alt.as_deref()]
            .into_iter()
            .flatten()
            .filter(|e| !e.is_empty())
    }
}

/// Source of truth for who is a current member.
#[async_trait]
pub trait MembershipSource: Connector {
    /// Fetches every record whose membership is current (including grace period).
    async fn fetch_current_members(&self) -> ConnectorResult<Vec<MembershipRecord>>;
}

// ============================================================================
// Group directory
// ============================================================================

/// A subscriber of the group directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    /// Address exactly as the directory formats it.
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Mailing-list style group directory (e.g. Google Groups).
#[async_trait]
pub trait GroupDirectoryConnector: Connector {
    /// Group address or key being managed.
    fn group(&self) -> &str;

    /// Lists every member of the group.
    async fn list_members(&self) -> ConnectorResult<Vec<GroupMember>>;

    /// Subscribes an address.
    async fn add_member(&self, email: &str) -> ConnectorResult<()>;

    /// Unsubscribes an address.
    async fn remove_member(&self, email: &str) -> ConnectorResult<()>;
}

// ============================================================================
// Chat communities
// ============================================================================

/// A member of one chat community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityMember {
    /// Platform user id.
    pub user_id: String,
    pub username: String,
    /// Community-specific nickname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    /// Whether the member currently holds the community's member role.
    pub has_member_role: bool,
}

impl CommunityMember {
    /// Name shown in reports: nickname if set, username otherwise.
    pub fn display_name(&self) -> &str {
        match self.nick.as_deref() {
            Some(nick) if !nick.is_empty() => nick,
            _ => &self.username,
        }
    }
}

/// Chat platform whose communities each carry an independent member role.
#[async_trait]
pub trait CommunityConnector: Connector {
    /// Names of the configured communities.
    fn communities(&self) -> Vec<String>;

    /// Lists every member of a community together with their role state.
    async fn list_members(&self, community: &str) -> ConnectorResult<Vec<CommunityMember>>;

    /// Grants the member role in a community.
    async fn grant_member_role(&self, community: &str, user_id: &str) -> ConnectorResult<()>;

    /// Revokes the member role in a community.
    async fn revoke_member_role(&self, community: &str, user_id: &str) -> ConnectorResult<()>;
}

// ============================================================================
// Roster mirror and mail
// ============================================================================

/// System that receives the complete roster as a bulk upload.
#[async_trait]
pub trait RosterMirror: Connector {
    /// Uploads every record. The mirror upserts; it never removes.
    async fn bulk_upload(&self, records: &[MembershipRecord]) -> ConnectorResult<()>;
}

/// Outbound mail used to distribute reconciliation reports.
#[async_trait]
pub trait ReportMailer: Connector {
    /// Sends a plain-text message to the configured report recipient.
    async fn send_report(&self, subject: &str, body: &str) -> ConnectorResult<()>;
}
