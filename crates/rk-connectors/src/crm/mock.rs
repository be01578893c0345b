//! Mock membership source for testing.

use crate::traits::{
    ConnectorCategory, ConnectorError, ConnectorHealth, ConnectorResult, MembershipRecord,
    MembershipSource,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory membership source.
pub struct MockMembershipSource {
    name: String,
    records: Arc<RwLock<Vec<MembershipRecord>>>,
    failure: Arc<RwLock<Option<ConnectorError>>>,
    fetches: AtomicUsize,
}

impl MockMembershipSource {
    /// Creates a new mock source holding `records`.
    pub fn new(name: &str, records: Vec<MembershipRecord>) -> Self {
        Self {
            name: name.to_string(),
            records: Arc::new(RwLock::new(records)),
            failure: Arc::new(RwLock::new(None)),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Replaces the roster.
    pub async fn set_records(&self, records: Vec<MembershipRecord>) {
        *self.records.write().await = records;
    }

    /// Makes every subsequent fetch fail with `error` (or succeed again with `None`).
    pub async fn set_failure(&self, error: Option<ConnectorError>) {
        *self.failure.write().await = error;
    }

    /// Number of fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl crate::traits::Connector for MockMembershipSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ConnectorCategory {
        ConnectorCategory::MembershipSource
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        match &*self.failure.read().await {
            Some(e) => Ok(ConnectorHealth::Unhealthy(e.to_string())),
            None => Ok(ConnectorHealth::Healthy),
        }
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        Ok(self.failure.read().await.is_none())
    }
}

#[async_trait]
impl MembershipSource for MockMembershipSource {
    async fn fetch_current_members(&self) -> ConnectorResult<Vec<MembershipRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &*self.failure.read().await {
            return Err(e.clone());
        }
        Ok(self.records.read().await.clone())
    }
}
