//! SendGrid report mailer (v3 mail send API).

use crate::http::HttpClient;
use crate::traits::{
    ConnectorCategory, ConnectorConfig, ConnectorHealth, ConnectorResult, ReportMailer,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

/// SendGrid configuration. Auth is a bearer API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendGridConfig {
    #[serde(flatten)]
    pub connector: ConnectorConfig,
    pub sender_name: String,
    pub sender_email: String,
    /// Recipient of reconciliation reports.
    pub report_email: String,
}

/// SendGrid connector.
pub struct SendGridConnector {
    config: SendGridConfig,
    client: HttpClient,
}

impl SendGridConnector {
    pub fn new(config: SendGridConfig) -> ConnectorResult<Self> {
        let client = HttpClient::new(config.connector.clone())?;
        Ok(Self { config, client })
    }

    fn message(&self, subject: &str, body: &str) -> serde_json::Value {
        json!({
            "personalizations": [{ "to": [{ "email": self.config.report_email }] }],
            "from": { "email": self.config.sender_email, "name": self.config.sender_name },
            "subject": subject,
            "content": [{ "type": "text/plain", "value": body }]
        })
    }
}

#[async_trait]
impl crate::traits::Connector for SendGridConnector {
    fn name(&self) -> &str {
        &self.config.connector.name
    }

    fn category(&self) -> ConnectorCategory {
        ConnectorCategory::Mail
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        match self.client.get("/v3/scopes").await {
            Ok(_) => Ok(ConnectorHealth::Healthy),
            Err(e) => Ok(ConnectorHealth::Unhealthy(e.to_string())),
        }
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        let response = self.client.get("/v3/scopes").await?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl ReportMailer for SendGridConnector {
    #[instrument(skip(self, body))]
    async fn send_report(&self, subject: &str, body: &str) -> ConnectorResult<()> {
        self.client
            .post("/v3/mail/send", &self.message(subject, body))
            .await?;
        info!(to = %self.config.report_email, "Report mail accepted");
        Ok(())
    }
}
