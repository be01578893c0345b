//! Mock group directory for testing.

use crate::traits::{
    ConnectorCategory, ConnectorError, ConnectorHealth, ConnectorResult, GroupDirectoryConnector,
    GroupMember,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory group directory with failure injection and call recording.
pub struct MockGroupDirectory {
    name: String,
    group: String,
    members: Arc<RwLock<BTreeMap<String, GroupMember>>>,
    failing: Arc<RwLock<HashSet<String>>>,
    list_failure: Arc<RwLock<Option<ConnectorError>>>,
    added: Arc<RwLock<Vec<String>>>,
    removed: Arc<RwLock<Vec<String>>>,
}

impl MockGroupDirectory {
    /// Creates a mock group pre-populated with `emails`.
    pub fn new(name: &str, group: &str, emails: &[&str]) -> Self {
        let members = emails
            .iter()
            .map(|e| {
                (
                    e.to_string(),
                    GroupMember {
                        email: e.to_string(),
                        role: Some("MEMBER".to_string()),
                    },
                )
            })
            .collect();
        Self {
            name: name.to_string(),
            group: group.to_string(),
            members: Arc::new(RwLock::new(members)),
            failing: Arc::new(RwLock::new(HashSet::new())),
            list_failure: Arc::new(RwLock::new(None)),
            added: Arc::new(RwLock::new(Vec::new())),
            removed: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Makes every mutation for `email` fail.
    pub async fn fail_for(&self, email: &str) {
        self.failing.write().await.insert(email.to_string());
    }

    /// Makes listing fail with `error` (or succeed again with `None`).
    pub async fn set_list_failure(&self, error: Option<ConnectorError>) {
        *self.list_failure.write().await = error;
    }

    /// Current member addresses, sorted.
    pub async fn emails(&self) -> Vec<String> {
        self.members.read().await.keys().cloned().collect()
    }

    /// Addresses passed to `add_member`, in call order, including failures.
    pub async fn added(&self) -> Vec<String> {
        self.added.read().await.clone()
    }

    /// Addresses passed to `remove_member`, in call order, including failures.
    pub async fn removed(&self) -> Vec<String> {
        self.removed.read().await.clone()
    }

    async fn check_failure(&self, email: &str) -> ConnectorResult<()> {
        if self.failing.read().await.contains(email) {
            return Err(ConnectorError::RequestFailed(format!(
                "injected failure for {}",
                email
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl crate::traits::Connector for MockGroupDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ConnectorCategory {
        ConnectorCategory::GroupDirectory
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        Ok(ConnectorHealth::Healthy)
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl GroupDirectoryConnector for MockGroupDirectory {
    fn group(&self) -> &str {
        &self.group
    }

    async fn list_members(&self) -> ConnectorResult<Vec<GroupMember>> {
        if let Some(e) = &*self.list_failure.read().await {
            return Err(e.clone());
        }
        Ok(self.members.read().await.values().cloned().collect())
    }

    async fn add_member(&self, email: &str) -> ConnectorResult<()> {
        self.added.write().await.push(email.to_string());
        self.check_failure(email).await?;
        self.members.write().await.insert(
            email.to_string(),
            GroupMember {
                email: email.to_string(),
                role: Some("MEMBER".to_string()),
            },
        );
        Ok(())
    }

    async fn remove_member(&self, email: &str) -> ConnectorResult<()> {
        self.removed.write().await.push(email.to_string());
        self.check_failure(email).await?;
        self.members
            .write()
            .await
            .remove(email)
            .map(|_| ())
            .ok_or_else(|| ConnectorError::NotFound(email.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_and_remove() {
        let group = MockGroupDirectory::new("groups", "g@example.org", &["a@example.com"]);
        group.add_member("b@example.com").await.unwrap();
        group.remove_member("a@example.com").await.unwrap();
        assert_eq!(group.emails().await, vec!["b@example.com"]);
        assert_eq!(group.added().await, vec!["b@example.com"]);
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded() {
        let group = MockGroupDirectory::new("groups", "g@example.org", &[]);
        group.fail_for("x@example.com").await;
        assert!(group.add_member("x@example.com").await.is_err());
        assert_eq!(group.added().await, vec!["x@example.com"]);
        assert!(group.emails().await.is_empty());
    }
}
