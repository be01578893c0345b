//! Mock roster mirror for testing.

use crate::traits::{
    ConnectorCategory, ConnectorError, ConnectorHealth, ConnectorResult, MembershipRecord,
    RosterMirror,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Records every upload; can be told to reject them.
pub struct MockRosterMirror {
    name: String,
    uploads: Arc<RwLock<Vec<Vec<MembershipRecord>>>>,
    fail: AtomicBool,
}

impl MockRosterMirror {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            uploads: Arc::new(RwLock::new(Vec::new())),
            fail: AtomicBool::new(false),
        }
    }

    /// Makes subsequent uploads fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Every accepted upload, oldest first.
    pub async fn uploads(&self) -> Vec<Vec<MembershipRecord>> {
        self.uploads.read().await.clone()
    }
}

#[async_trait]
impl crate::traits::Connector for MockRosterMirror {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ConnectorCategory {
        ConnectorCategory::RosterMirror
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        Ok(ConnectorHealth::Healthy)
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl RosterMirror for MockRosterMirror {
    async fn bulk_upload(&self, records: &[MembershipRecord]) -> ConnectorResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ConnectorError::RequestFailed(
                "received bad status from checkmein: 500".to_string(),
            ));
        }
        self.uploads.write().await.push(records.to_vec());
        Ok(())
    }
}
