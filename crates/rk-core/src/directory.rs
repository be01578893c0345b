//! Target directories as seen by the engine.
//!
//! A [`TargetDirectory`] can list its members and apply single additions and
//! removals. The diff engine and mutation applier are written once against
//! this trait; the group directory and each chat community plug into it.

use crate::identity::{normalize, IdentityKey};
use crate::roster::Keyspace;
use async_trait::async_trait;
use rk_connectors::{CommunityConnector, ConnectorResult, GroupDirectoryConnector};
use std::sync::Arc;

/// Kind of target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryKind {
    /// Mailing-list group. Anyone can be subscribed.
    Group,
    /// Chat community. Only people already in the community can get the role.
    Community,
}

impl DirectoryKind {
    pub fn keyspace(self) -> Keyspace {
        match self {
            DirectoryKind::Group => Keyspace::Email,
            DirectoryKind::Community => Keyspace::ChatUserId,
        }
    }

    /// Whether identities missing from the snapshot can be added.
    pub fn admits_strangers(self) -> bool {
        matches!(self, DirectoryKind::Group)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DirectoryKind::Group => "group",
            DirectoryKind::Community => "community",
        }
    }
}

/// One entry of a directory snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub key: IdentityKey,
    /// Value shown in reports.
    pub display: String,
    /// Value passed back to the directory when mutating this entry.
    pub handle: String,
    /// Whether the entry currently counts as a member (subscribed, or holds
    /// the member role).
    pub active: bool,
}

/// A directory the engine reconciles against the source of truth.
#[async_trait]
pub trait TargetDirectory: Send + Sync {
    /// Name used in reports and logs.
    fn name(&self) -> &str;

    fn kind(&self) -> DirectoryKind;

    /// Lists the directory's current entries.
    async fn fetch_snapshot(&self) -> ConnectorResult<Vec<DirectoryEntry>>;

    /// Makes `handle` a member.
    async fn apply_addition(&self, handle: &str) -> ConnectorResult<()>;

    /// Removes membership from `handle`.
    async fn apply_removal(&self, handle: &str) -> ConnectorResult<()>;
}

/// Mailing-list group backed by a [`GroupDirectoryConnector`].
pub struct GroupDirectory {
    name: String,
    connector: Arc<dyn GroupDirectoryConnector>,
}

impl GroupDirectory {
    pub fn new(name: impl Into<String>, connector: Arc<dyn GroupDirectoryConnector>) -> Self {
        Self {
            name: name.into(),
            connector,
        }
    }
}

#[async_trait]
impl TargetDirectory for GroupDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DirectoryKind {
        DirectoryKind::Group
    }

    async fn fetch_snapshot(&self) -> ConnectorResult<Vec<DirectoryEntry>> {
        let members = self.connector.list_members().await?;
        Ok(members
            .into_iter()
            .map(|m| DirectoryEntry {
                key: normalize(&m.email),
                display: m.email.clone(),
                handle: m.email,
                active: true,
            })
            .collect())
    }

    async fn apply_addition(&self, handle: &str) -> ConnectorResult<()> {
        self.connector.add_member(handle).await
    }

    async fn apply_removal(&self, handle: &str) -> ConnectorResult<()> {
        self.connector.remove_member(handle).await
    }
}

/// One chat community's member role, backed by a [`CommunityConnector`].
pub struct CommunityDirectory {
    community: String,
    connector: Arc<dyn CommunityConnector>,
}

impl CommunityDirectory {
    pub fn new(community: impl Into<String>, connector: Arc<dyn CommunityConnector>) -> Self {
        Self {
            community: community.into(),
            connector,
        }
    }

    /// One directory per community the connector is configured with.
    pub fn all(connector: Arc<dyn CommunityConnector>) -> Vec<Self> {
        connector
            .communities()
            .into_iter()
            .map(|community| Self::new(community, Arc::clone(&connector)))
            .collect()
    }
}

#[async_trait]
impl TargetDirectory for CommunityDirectory {
    fn name(&self) -> &str {
        &self.community
    }

    fn kind(&self) -> DirectoryKind {
        DirectoryKind::Community
    }

    async fn fetch_snapshot(&self) -> ConnectorResult<Vec<DirectoryEntry>> {
        let members = self.connector.list_members(&self.community).await?;
        Ok(members
            .into_iter()
            .map(|m| DirectoryEntry {
                key: IdentityKey::verbatim(m.user_id.clone()),
                display: m.display_name().to_string(),
                handle: m.user_id,
                active: m.has_member_role,
            })
            .collect())
    }

    async fn apply_addition(&self, handle: &str) -> ConnectorResult<()> {
        self.connector
            .grant_member_role(&self.community, handle)
            .await
    }

    async fn apply_removal(&self, handle: &str) -> ConnectorResult<()> {
        self.connector
            .revoke_member_role(&self.community, handle)
            .await
    }
}
