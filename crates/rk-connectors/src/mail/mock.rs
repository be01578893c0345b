//! Mock report mailer for testing.

use crate::traits::{
    ConnectorCategory, ConnectorError, ConnectorHealth, ConnectorResult, ReportMailer,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A message captured by [`MockReportMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReport {
    pub subject: String,
    pub body: String,
}

/// Captures sent reports instead of delivering them.
pub struct MockReportMailer {
    name: String,
    sent: Arc<RwLock<Vec<SentReport>>>,
    fail: AtomicBool,
}

impl MockReportMailer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sent: Arc::new(RwLock::new(Vec::new())),
            fail: AtomicBool::new(false),
        }
    }

    /// Makes subsequent sends fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentReport> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl crate::traits::Connector for MockReportMailer {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ConnectorCategory {
        ConnectorCategory::Mail
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        Ok(ConnectorHealth::Healthy)
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl ReportMailer for MockReportMailer {
    async fn send_report(&self, subject: &str, body: &str) -> ConnectorResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ConnectorError::ConnectionFailed("mail relay down".to_string()));
        }
        self.sent.write().await.push(SentReport {
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
