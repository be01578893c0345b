//! CheckMeIn roster mirror.
//!
//! CheckMeIn has no token API. The connector logs in with a query-string
//! login that sets a session cookie, then posts the whole roster as a CSV
//! file to the bulk-add form. The upload is all or nothing: one record that
//! cannot be rendered fails the whole batch before anything is sent.

use crate::http::HttpClient;
use crate::secure_string::SecureString;
use crate::traits::{
    ConnectorCategory, ConnectorConfig, ConnectorError, ConnectorHealth, ConnectorResult,
    MembershipRecord, RosterMirror,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Date format expected by the bulk-add form.
const BULK_ADD_DATE_FORMAT: &str = "%-m/%-d/%Y";

/// CheckMeIn configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckMeInConfig {
    #[serde(flatten)]
    pub connector: ConnectorConfig,
    pub username: String,
    pub password: SecureString,
}

/// One CSV row of the bulk-add upload.
#[derive(Debug, Serialize)]
struct BulkAddRow<'a> {
    #[serde(rename = "TFI Barcode for Button")]
    barcode: &'a str,
    #[serde(rename = "TFI Display Name for Button")]
    display_name: &'a str,
    #[serde(rename = "First Name")]
    first_name: &'a str,
    #[serde(rename = "Last Name")]
    last_name: &'a str,
    #[serde(rename = "Membership End Date")]
    membership_end_date: String,
    #[serde(rename = "Email")]
    email: &'a str,
}

/// Renders the bulk-add CSV, failing on the first record without an end date.
pub fn render_bulk_add_csv(records: &[MembershipRecord]) -> ConnectorResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        let end_date = record.membership_end_date.ok_or_else(|| {
            ConnectorError::InvalidRequest(format!(
                "missing or invalid membership end date for {}",
                record.display_name
            ))
        })?;
        writer
            .serialize(BulkAddRow {
                barcode: record.barcode.as_deref().unwrap_or_default(),
                display_name: &record.display_name,
                first_name: &record.first_name,
                last_name: &record.last_name,
                membership_end_date: end_date.format(BULK_ADD_DATE_FORMAT).to_string(),
                email: record.email.as_deref().unwrap_or_default(),
            })
            .map_err(|e| ConnectorError::Internal(format!("failed to generate CSV: {}", e)))?;
    }
    writer
        .into_inner()
        .map_err(|e| ConnectorError::Internal(format!("failed to flush CSV: {}", e)))
}

/// CheckMeIn connector.
pub struct CheckMeInConnector {
    config: CheckMeInConfig,
    client: HttpClient,
}

impl CheckMeInConnector {
    /// Creates a new CheckMeIn connector.
    pub fn new(config: CheckMeInConfig) -> ConnectorResult<Self> {
        let client = HttpClient::new(config.connector.clone())?;
        info!("CheckMeIn connector initialized for {}", config.connector.base_url);
        Ok(Self { config, client })
    }

    /// Logs in; the session cookie lands in the client's cookie store.
    async fn login(&self) -> ConnectorResult<()> {
        let query = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.expose_secret()),
        ];
        let response = self
            .client
            .get_with_query("/profile/loginAttempt", &query)
            .await
            .map_err(|e| ConnectorError::AuthenticationFailed(e.to_string()))?;
        expect_ok(response.status())
    }
}

fn expect_ok(status: StatusCode) -> ConnectorResult<()> {
    if status == StatusCode::OK {
        Ok(())
    } else {
        Err(ConnectorError::RequestFailed(format!(
            "received bad status from checkmein: {}",
            status.as_u16()
        )))
    }
}

#[async_trait]
impl crate::traits::Connector for CheckMeInConnector {
    fn name(&self) -> &str {
        &self.config.connector.name
    }

    fn category(&self) -> ConnectorCategory {
        ConnectorCategory::RosterMirror
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        match self.login().await {
            Ok(()) => Ok(ConnectorHealth::Healthy),
            Err(e) => Ok(ConnectorHealth::Unhealthy(e.to_string())),
        }
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        self.login().await.map(|_| true)
    }
}

#[async_trait]
impl RosterMirror for CheckMeInConnector {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn bulk_upload(&self, records: &[MembershipRecord]) -> ConnectorResult<()> {
        let csv = render_bulk_add_csv(records)?;
        self.login().await?;

        let part = Part::bytes(csv)
            .file_name("report.csv")
            .mime_str("text/csv")
            .map_err(|e| ConnectorError::Internal(e.to_string()))?;
        let form = Form::new().part("csvfile", part);

        let response = self
            .client
            .post_multipart("/admin/bulkAddMembers", form)
            .await?;
        expect_ok(response.status())?;

        info!(count = records.len(), "Uploaded roster to CheckMeIn");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_member, test_connector_config};
    use crate::traits::Connector;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config(base_url: &str) -> CheckMeInConfig {
        CheckMeInConfig {
            connector: test_connector_config("checkmein-test", base_url),
            username: "admin".to_string(),
            password: SecureString::from("pw"),
        }
    }

    #[test]
    fn test_render_csv_formats_dates_and_headers() {
        let member = sample_member("7", "Ada Lovelace", "ada@example.com");
        let csv = String::from_utf8(render_bulk_add_csv(&[member]).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "TFI Barcode for Button,TFI Display Name for Button,First Name,Last Name,Membership End Date,Email"
        );
        assert_eq!(
            lines.next().unwrap(),
            "B-7,Ada Lovelace,Ada,Lovelace,1/31/2030,ada@example.com"
        );
    }

    #[test]
    fn test_render_csv_rejects_missing_end_date() {
        let mut member = sample_member("8", "Bob Stone", "bob@example.com");
        member.membership_end_date = None;
        let err = render_bulk_add_csv(&[member]).unwrap_err();
        assert!(err.to_string().contains("Bob Stone"));
    }

    #[tokio::test]
    async fn test_bulk_upload_logs_in_then_posts_csv() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/profile/loginAttempt"))
            .and(query_param("username", "admin"))
            .and(query_param("password", "pw"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("set-cookie", "session_id=abc; Path=/"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/admin/bulkAddMembers"))
            .and(body_string_contains("name=\"csvfile\""))
            .and(body_string_contains("Ada Lovelace"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let connector = CheckMeInConnector::new(create_test_config(&server.uri())).unwrap();
        connector
            .bulk_upload(&[sample_member("7", "Ada Lovelace", "ada@example.com")])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bad_record_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut member = sample_member("8", "Bob Stone", "bob@example.com");
        member.membership_end_date = None;
        let connector = CheckMeInConnector::new(create_test_config(&server.uri())).unwrap();
        assert!(connector.bulk_upload(&[member]).await.is_err());
    }

    #[tokio::test]
    async fn test_login_failure_does_not_leak_password() {
        let mut config = create_test_config("http://127.0.0.1:9");
        config.password = SecureString::from("hunter2-SECRET");
        let connector = CheckMeInConnector::new(config).unwrap();

        let err = connector
            .bulk_upload(&[sample_member("7", "Ada Lovelace", "ada@example.com")])
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(!text.contains("hunter2-SECRET"), "leaked: {}", text);
        assert!(!text.contains("password="), "leaked: {}", text);

        match connector.health_check().await.unwrap() {
            ConnectorHealth::Unhealthy(reason) => assert!(!reason.contains("hunter2-SECRET")),
            other => panic!("expected unhealthy, got {:?}", other),
        }
    }
}
