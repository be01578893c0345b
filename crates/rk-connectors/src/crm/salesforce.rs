//! Salesforce membership source.
//!
//! Runs a SOQL query over the REST API and follows `nextRecordsUrl` until
//! every page of current members has been read. Authentication is the OAuth2
//! client credentials flow; [`HttpClient`] caches the token and re-mints it
//! before it expires.

use crate::http::{HttpClient, RateLimitConfig};
use crate::traits::{
    ConnectorCategory, ConnectorConfig, ConnectorError, ConnectorHealth, ConnectorResult,
    MembershipRecord, MembershipSource,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Date format Salesforce uses for date fields.
const SALESFORCE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Upper bound on pages followed for a single query.
const MAX_PAGES: usize = 500;

/// Salesforce-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesforceConfig {
    /// Base connector configuration. `base_url` is the instance URL.
    #[serde(flatten)]
    pub connector: ConnectorConfig,
    /// REST API version segment, e.g. `v58.0`.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Object the query reads from.
    #[serde(default = "default_object")]
    pub object: String,
    /// SOQL `WHERE` clause selecting current members.
    #[serde(default = "default_membership_filter")]
    pub membership_filter: String,
    /// Field names on the queried object.
    #[serde(default)]
    pub fields: SalesforceFieldMap,
}

fn default_api_version() -> String {
    "v58.0".to_string()
}

fn default_object() -> String {
    "Contact".to_string()
}

fn default_membership_filter() -> String {
    "Account.npsp__Membership_Status__c IN ('Current', 'Grace Period') \
     AND (NOT Name LIKE '%test%')"
        .to_string()
}

/// Maps record attributes to Salesforce field API names.
///
/// Dotted names follow relationships (`Account.npsp__Membership_Status__c`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesforceFieldMap {
    pub barcode: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub membership_end_date: String,
    pub email: String,
    pub group_email: String,
    pub group_email_alt: String,
    pub chat_user_id: String,
    pub membership_status: String,
}

impl Default for SalesforceFieldMap {
    fn default() -> Self {
        Self {
            barcode: "TFI_Barcode_for_Button__c".to_string(),
            display_name: "TFI_Display_Name_for_Button__c".to_string(),
            first_name: "FirstName".to_string(),
            last_name: "LastName".to_string(),
            membership_end_date: "npo02__MembershipEndDate__c".to_string(),
            email: "Email".to_string(),
            group_email: "Google_group__c".to_string(),
            group_email_alt: "Google_group_email_2ndary__c".to_string(),
            chat_user_id: "Discord_ID__c".to_string(),
            membership_status: "Account.npsp__Membership_Status__c".to_string(),
        }
    }
}

impl SalesforceFieldMap {
    fn select_list(&self) -> String {
        [
            "Id",
            &self.barcode,
            &self.display_name,
            &self.first_name,
            &self.last_name,
            &self.membership_end_date,
            &self.email,
            &self.group_email,
            &self.group_email_alt,
            &self.chat_user_id,
            &self.membership_status,
        ]
        .join(", ")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    total_size: u64,
    #[serde(default)]
    records: Vec<Value>,
    #[serde(default)]
    next_records_url: Option<String>,
}

/// Salesforce connector.
pub struct SalesforceConnector {
    config: SalesforceConfig,
    client: HttpClient,
}

impl SalesforceConnector {
    /// Creates a new Salesforce connector.
    pub fn new(config: SalesforceConfig) -> ConnectorResult<Self> {
        // Daily API limits are per org; stay well under them.
        let rate_limit = RateLimitConfig {
            max_requests: 60,
            period: std::time::Duration::from_secs(60),
            burst_size: 10,
        };
        let client = HttpClient::with_rate_limit(config.connector.clone(), Some(rate_limit))?;

        info!(
            "Salesforce connector initialized for {} ({})",
            config.connector.base_url, config.api_version
        );

        Ok(Self { config, client })
    }

    fn query_path(&self, soql: &str) -> String {
        format!(
            "/services/data/{}/query?q={}",
            self.config.api_version,
            urlencoding::encode(soql)
        )
    }

    fn membership_query(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE {}",
            self.config.fields.select_list(),
            self.config.object,
            self.config.membership_filter
        )
    }

    fn parse_record(&self, value: &Value) -> MembershipRecord {
        let fields = &self.config.fields;
        let end_date = field_str(value, &fields.membership_end_date).and_then(|raw| {
            NaiveDate::parse_from_str(&raw, SALESFORCE_DATE_FORMAT)
                .map_err(|e| warn!(date = %raw, "Unparsable membership end date: {}", e))
                .ok()
        });

        MembershipRecord {
            id: field_str(value, "Id").unwrap_or_default(),
            display_name: field_str(value, &fields.display_name).unwrap_or_default(),
            first_name: field_str(value, &fields.first_name).unwrap_or_default(),
            last_name: field_str(value, &fields.last_name).unwrap_or_default(),
            email: field_str(value, &fields.email),
            group_email: field_str(value, &fields.group_email),
            group_email_alt: field_str(value, &fields.group_email_alt),
            chat_user_id: field_str(value, &fields.chat_user_id),
            barcode: field_str(value, &fields.barcode),
            membership_end_date: end_date,
            membership_status: field_str(value, &fields.membership_status).unwrap_or_default(),
        }
    }
}

/// Reads a possibly dotted field path, returning `None` for null or empty values.
fn field_str(record: &Value, path: &str) -> Option<String> {
    let value = path
        .split('.')
        .try_fold(record, |current, segment| current.get(segment))?;
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[async_trait]
impl crate::traits::Connector for SalesforceConnector {
    fn name(&self) -> &str {
        &self.config.connector.name
    }

    fn category(&self) -> ConnectorCategory {
        ConnectorCategory::MembershipSource
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        let path = format!("/services/data/{}/limits", self.config.api_version);
        match self.client.get(&path).await {
            Ok(_) => Ok(ConnectorHealth::Healthy),
            Err(ConnectorError::AuthenticationFailed(e)) => Ok(ConnectorHealth::Unhealthy(
                format!("Authentication failed: {}", e),
            )),
            Err(ConnectorError::RateLimited(secs)) => Ok(ConnectorHealth::Degraded(format!(
                "Rate limited for {} seconds",
                secs
            ))),
            Err(e) => Ok(ConnectorHealth::Unhealthy(e.to_string())),
        }
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        let path = format!("/services/data/{}/limits", self.config.api_version);
        let response = self.client.get(&path).await?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl MembershipSource for SalesforceConnector {
    #[instrument(skip(self), fields(connector = %self.config.connector.name))]
    async fn fetch_current_members(&self) -> ConnectorResult<Vec<MembershipRecord>> {
        let mut next = Some(self.query_path(&self.membership_query()));
        let mut records = Vec::new();
        let mut pages = 0;

        while let Some(path) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(ConnectorError::InvalidResponse(format!(
                    "Query did not finish after {} pages",
                    MAX_PAGES
                )));
            }

            let page: QueryResponse = self.client.get_json(&path).await?;
            debug!(
                total = page.total_size,
                page_records = page.records.len(),
                "Fetched membership page"
            );
            records.extend(page.records.iter().map(|r| self.parse_record(r)));
            next = page.next_records_url;
        }

        info!(count = records.len(), "Fetched current members");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_connector_config;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config(base_url: &str) -> SalesforceConfig {
        SalesforceConfig {
            connector: test_connector_config("salesforce-test", base_url),
            api_version: default_api_version(),
            object: default_object(),
            membership_filter: default_membership_filter(),
            fields: SalesforceFieldMap::default(),
        }
    }

    fn contact(id: &str, first: &str, group: &str) -> Value {
        json!({
            "attributes": {"type": "Contact"},
            "Id": id,
            "TFI_Barcode_for_Button__c": format!("B{}", id),
            "TFI_Display_Name_for_Button__c": first,
            "FirstName": first,
            "LastName": "Smith",
            "npo02__MembershipEndDate__c": "2031-06-30",
            "Email": format!("{}@example.com", first.to_lowercase()),
            "Google_group__c": group,
            "Google_group_email_2ndary__c": null,
            "Discord_ID__c": "1234",
            "Account": {"npsp__Membership_Status__c": "Grace Period"}
        })
    }

    #[test]
    fn test_membership_query_uses_filter_and_fields() {
        let connector = SalesforceConnector::new(create_test_config("https://x")).unwrap();
        let query = connector.membership_query();
        assert!(query.starts_with("SELECT Id, TFI_Barcode_for_Button__c"));
        assert!(query.contains("FROM Contact WHERE Account.npsp__Membership_Status__c IN"));
        assert!(query.contains("NOT Name LIKE '%test%'"));
    }

    #[test]
    fn test_parse_record_follows_relationships() {
        let connector = SalesforceConnector::new(create_test_config("https://x")).unwrap();
        let record = connector.parse_record(&contact("001", "Ada", "ada.l@example.com"));
        assert_eq!(record.id, "001");
        assert_eq!(record.membership_status, "Grace Period");
        assert_eq!(record.group_email.as_deref(), Some("ada.l@example.com"));
        assert_eq!(record.group_email_alt, None);
        assert_eq!(record.membership_end_date, NaiveDate::from_ymd_opt(2031, 6, 30));
    }

    #[test]
    fn test_parse_record_tolerates_bad_date() {
        let connector = SalesforceConnector::new(create_test_config("https://x")).unwrap();
        let mut value = contact("002", "Bob", "bob@example.com");
        value["npo02__MembershipEndDate__c"] = json!("30/06/2031");
        assert_eq!(connector.parse_record(&value).membership_end_date, None);
    }

    #[tokio::test]
    async fn test_fetch_current_members_follows_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/data/v58.0/query"))
            .and(query_param(
                "q",
                SalesforceConnector::new(create_test_config(&server.uri()))
                    .unwrap()
                    .membership_query()
                    .as_str(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalSize": 2,
                "done": false,
                "records": [contact("001", "Ada", "ada@example.com")],
                "nextRecordsUrl": "/services/data/v58.0/query/01g-2000"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/data/v58.0/query/01g-2000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalSize": 2,
                "done": true,
                "records": [contact("002", "Bob", "bob@example.com")]
            })))
            .mount(&server)
            .await;

        let connector = SalesforceConnector::new(create_test_config(&server.uri())).unwrap();
        let members = connector.fetch_current_members().await.unwrap();
        let ids: Vec<_> = members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["001", "002"]);
    }

    #[tokio::test]
    async fn test_fetch_current_members_propagates_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let connector = SalesforceConnector::new(create_test_config(&server.uri())).unwrap();
        assert!(matches!(
            connector.fetch_current_members().await,
            Err(ConnectorError::AuthenticationFailed(_))
        ));
    }
}
