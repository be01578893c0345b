//! Mock chat platform for testing.

use crate::traits::{
    CommunityConnector, CommunityMember, ConnectorCategory, ConnectorError, ConnectorHealth,
    ConnectorResult,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A role change observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleCall {
    Grant { community: String, user_id: String },
    Revoke { community: String, user_id: String },
}

type Rosters = BTreeMap<String, BTreeMap<String, CommunityMember>>;

/// In-memory communities with failure injection and call recording.
pub struct MockCommunityConnector {
    name: String,
    communities: Vec<String>,
    rosters: Arc<RwLock<Rosters>>,
    failing_users: Arc<RwLock<HashSet<String>>>,
    failing_lists: Arc<RwLock<HashSet<String>>>,
    calls: Arc<RwLock<Vec<RoleCall>>>,
}

impl MockCommunityConnector {
    /// Creates a mock with one empty roster per community name.
    pub fn new(name: &str, communities: &[&str]) -> Self {
        let mut names: Vec<String> = communities.iter().map(|c| c.to_string()).collect();
        names.sort();
        names.dedup();
        let rosters = names.iter().map(|c| (c.clone(), BTreeMap::new())).collect();
        Self {
            name: name.to_string(),
            communities: names,
            rosters: Arc::new(RwLock::new(rosters)),
            failing_users: Arc::new(RwLock::new(HashSet::new())),
            failing_lists: Arc::new(RwLock::new(HashSet::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Adds or replaces a member of a configured `community`.
    pub async fn insert_member(&self, community: &str, member: CommunityMember) {
        self.rosters
            .write()
            .await
            .entry(community.to_string())
            .or_default()
            .insert(member.user_id.clone(), member);
    }

    /// Makes every role change for `user_id` fail.
    pub async fn fail_for(&self, user_id: &str) {
        self.failing_users.write().await.insert(user_id.to_string());
    }

    /// Makes listing `community` fail.
    pub async fn fail_listing(&self, community: &str) {
        self.failing_lists.write().await.insert(community.to_string());
    }

    /// Role changes attempted so far, in call order.
    pub async fn calls(&self) -> Vec<RoleCall> {
        self.calls.read().await.clone()
    }

    /// Whether `user_id` holds the member role in `community`.
    pub async fn has_role(&self, community: &str, user_id: &str) -> bool {
        self.rosters
            .read()
            .await
            .get(community)
            .and_then(|r| r.get(user_id))
            .map(|m| m.has_member_role)
            .unwrap_or(false)
    }

    async fn set_role(&self, community: &str, user_id: &str, value: bool) -> ConnectorResult<()> {
        if self.failing_users.read().await.contains(user_id) {
            return Err(ConnectorError::RequestFailed(format!(
                "injected failure for {}",
                user_id
            )));
        }
        let mut rosters = self.rosters.write().await;
        let member = rosters
            .get_mut(community)
            .and_then(|r| r.get_mut(user_id))
            .ok_or_else(|| ConnectorError::NotFound(format!("{} in {}", user_id, community)))?;
        member.has_member_role = value;
        Ok(())
    }
}

#[async_trait]
impl crate::traits::Connector for MockCommunityConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ConnectorCategory {
        ConnectorCategory::Community
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        Ok(ConnectorHealth::Healthy)
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl CommunityConnector for MockCommunityConnector {
    fn communities(&self) -> Vec<String> {
        self.communities.clone()
    }

    async fn list_members(&self, community: &str) -> ConnectorResult<Vec<CommunityMember>> {
        if self.failing_lists.read().await.contains(community) {
            return Err(ConnectorError::ConnectionFailed(format!(
                "injected listing failure for {}",
                community
            )));
        }
        self.rosters
            .read()
            .await
            .get(community)
            .map(|r| r.values().cloned().collect())
            .ok_or_else(|| ConnectorError::NotFound(format!("community {}", community)))
    }

    async fn grant_member_role(&self, community: &str, user_id: &str) -> ConnectorResult<()> {
        self.calls.write().await.push(RoleCall::Grant {
            community: community.to_string(),
            user_id: user_id.to_string(),
        });
        self.set_role(community, user_id, true).await
    }

    async fn revoke_member_role(&self, community: &str, user_id: &str) -> ConnectorResult<()> {
        self.calls.write().await.push(RoleCall::Revoke {
            community: community.to_string(),
            user_id: user_id.to_string(),
        });
        self.set_role(community, user_id, false).await
    }
}
