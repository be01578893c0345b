//! Google Groups connector (Admin SDK Directory API).
//!
//! Lists members page by page and inserts or deletes single members of one
//! group. Tokens normally come from the workload's metadata server.

use crate::http::{HttpClient, RateLimitConfig};
use crate::traits::{
    ConnectorCategory, ConnectorConfig, ConnectorError, ConnectorHealth, ConnectorResult,
    GroupDirectoryConnector, GroupMember,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Page size requested from the members endpoint.
const PAGE_SIZE: u32 = 200;

/// Google Groups configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleGroupsConfig {
    /// Base connector configuration. `base_url` is the Admin SDK host.
    #[serde(flatten)]
    pub connector: ConnectorConfig,
    /// Group email address or unique id.
    pub group: String,
    /// Role given to inserted members.
    #[serde(default = "default_member_role")]
    pub member_role: String,
}

fn default_member_role() -> String {
    "MEMBER".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MembersPage {
    #[serde(default)]
    members: Vec<DirectoryMember>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectoryMember {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Serialize)]
struct InsertMember<'a> {
    email: &'a str,
    role: &'a str,
}

/// Google Groups connector.
pub struct GoogleGroupsConnector {
    config: GoogleGroupsConfig,
    client: HttpClient,
}

impl GoogleGroupsConnector {
    /// Creates a new Google Groups connector.
    pub fn new(config: GoogleGroupsConfig) -> ConnectorResult<Self> {
        if config.group.trim().is_empty() {
            return Err(ConnectorError::ConfigError("group must not be empty".into()));
        }
        let rate_limit = RateLimitConfig {
            max_requests: 600,
            period: std::time::Duration::from_secs(60),
            burst_size: 20,
        };
        let client = HttpClient::with_rate_limit(config.connector.clone(), Some(rate_limit))?;

        info!("Google Groups connector initialized for {}", config.group);

        Ok(Self { config, client })
    }

    fn members_path(&self) -> String {
        format!(
            "/admin/directory/v1/groups/{}/members",
            urlencoding::encode(&self.config.group)
        )
    }

    fn member_path(&self, email: &str) -> String {
        format!("{}/{}", self.members_path(), urlencoding::encode(email))
    }
}

#[async_trait]
impl crate::traits::Connector for GoogleGroupsConnector {
    fn name(&self) -> &str {
        &self.config.connector.name
    }

    fn category(&self) -> ConnectorCategory {
        ConnectorCategory::GroupDirectory
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        let path = format!(
            "/admin/directory/v1/groups/{}",
            urlencoding::encode(&self.config.group)
        );
        match self.client.get(&path).await {
            Ok(_) => Ok(ConnectorHealth::Healthy),
            Err(ConnectorError::NotFound(_)) => Ok(ConnectorHealth::Unhealthy(format!(
                "Group {} not found",
                self.config.group
            ))),
            Err(e) => Ok(ConnectorHealth::Unhealthy(e.to_string())),
        }
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        let path = format!("{}?maxResults=1", self.members_path());
        let response = self.client.get(&path).await?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl GroupDirectoryConnector for GoogleGroupsConnector {
    fn group(&self) -> &str {
        &self.config.group
    }

    #[instrument(skip(self), fields(group = %self.config.group))]
    async fn list_members(&self) -> ConnectorResult<Vec<GroupMember>> {
        let mut members = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("maxResults", PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            let response = self
                .client
                .get_with_query(&self.members_path(), &query)
                .await?;
            let page: MembersPage = response
                .json()
                .await
                .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

            debug!(page_members = page.members.len(), "Fetched group member page");
            members.extend(page.members.into_iter().filter_map(|m| {
                m.email.map(|email| GroupMember {
                    email,
                    role: m.role,
                })
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(members)
    }

    #[instrument(skip(self), fields(group = %self.config.group))]
    async fn add_member(&self, email: &str) -> ConnectorResult<()> {
        let body = InsertMember {
            email,
            role: &self.config.member_role,
        };
        self.client.post(&self.members_path(), &body).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(group = %self.config.group))]
    async fn remove_member(&self, email: &str) -> ConnectorResult<()> {
        self.client.delete(&self.member_path(email)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_connector_config;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config(base_url: &str) -> GoogleGroupsConfig {
        GoogleGroupsConfig {
            connector: test_connector_config("groups-test", base_url),
            group: "members@example.org".to_string(),
            member_role: default_member_role(),
        }
    }

    #[test]
    fn test_rejects_empty_group() {
        let mut config = create_test_config("https://x");
        config.group = " ".into();
        assert!(GoogleGroupsConnector::new(config).is_err());
    }

    #[tokio::test]
    async fn test_list_members_pages() {
        let server = MockServer::start().await;
        let members = "/admin/directory/v1/groups/members%40example.org/members";
        Mock::given(method("GET"))
            .and(path(members))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "members": [{"email": "b@example.com", "role": "MEMBER"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(members))
            .and(query_param("maxResults", "200"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "members": [
                    {"email": "a@example.com", "role": "OWNER"},
                    {"id": "no-email"}
                ],
                "nextPageToken": "p2"
            })))
            .mount(&server)
            .await;

        let connector = GoogleGroupsConnector::new(create_test_config(&server.uri())).unwrap();
        let emails: Vec<_> = connector
            .list_members()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.email)
            .collect();
        assert_eq!(emails, vec!["a@example.com", "b@example.com"]);
    }

    #[tokio::test]
    async fn test_add_and_remove_member() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/directory/v1/groups/members%40example.org/members"))
            .and(body_json(json!({"email": "new@example.com", "role": "MEMBER"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(
                "/admin/directory/v1/groups/members%40example.org/members/old%40example.com",
            ))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let connector = GoogleGroupsConnector::new(create_test_config(&server.uri())).unwrap();
        connector.add_member("new@example.com").await.unwrap();
        connector.remove_member("old@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn test_add_member_conflict_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_string("Member already exists."))
            .mount(&server)
            .await;

        let connector = GoogleGroupsConnector::new(create_test_config(&server.uri())).unwrap();
        let err = connector.add_member("dup@example.com").await.unwrap_err();
        assert!(err.to_string().contains("409"));
    }
}
