//! Discord connector.
//!
//! Each configured community is a guild with its own member role. Listing
//! pages through `GET /guilds/{id}/members` with the `after` cursor; role
//! changes are single `PUT`/`DELETE` calls on the member's role.

use crate::http::{HttpClient, RateLimitConfig};
use crate::traits::{
    CommunityConnector, CommunityMember, ConnectorCategory, ConnectorConfig, ConnectorError,
    ConnectorHealth, ConnectorResult,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Maximum page size accepted by the guild members endpoint.
const PAGE_LIMIT: usize = 1000;

/// One guild and the role that marks its members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommunityConfig {
    /// Name used in reports and logs.
    pub name: String,
    pub guild_id: String,
    pub member_role_id: String,
}

/// Discord configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Base connector configuration (bot token auth).
    #[serde(flatten)]
    pub connector: ConnectorConfig,
    #[serde(default)]
    pub communities: Vec<CommunityConfig>,
}

#[derive(Debug, Deserialize)]
struct GuildMember {
    user: Option<DiscordUser>,
    #[serde(default)]
    nick: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    #[serde(default)]
    bot: bool,
}

/// Discord connector.
pub struct DiscordConnector {
    config: DiscordConfig,
    client: HttpClient,
}

impl DiscordConnector {
    /// Creates a new Discord connector.
    pub fn new(config: DiscordConfig) -> ConnectorResult<Self> {
        let mut seen = std::collections::HashSet::new();
        for community in &config.communities {
            if !seen.insert(community.name.as_str()) {
                return Err(ConnectorError::ConfigError(format!(
                    "duplicate community name: {}",
                    community.name
                )));
            }
        }

        // Global bot limit is 50 requests per second.
        let rate_limit = RateLimitConfig {
            max_requests: 40,
            period: std::time::Duration::from_secs(1),
            burst_size: 10,
        };
        let client = HttpClient::with_rate_limit(config.connector.clone(), Some(rate_limit))?;

        info!(
            "Discord connector initialized with {} communities",
            config.communities.len()
        );

        Ok(Self { config, client })
    }

    fn community(&self, name: &str) -> ConnectorResult<&CommunityConfig> {
        self.config
            .communities
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ConnectorError::NotFound(format!("community {}", name)))
    }

    fn role_path(community: &CommunityConfig, user_id: &str) -> String {
        format!(
            "/guilds/{}/members/{}/roles/{}",
            community.guild_id,
            urlencoding::encode(user_id),
            community.member_role_id
        )
    }
}

#[async_trait]
impl crate::traits::Connector for DiscordConnector {
    fn name(&self) -> &str {
        &self.config.connector.name
    }

    fn category(&self) -> ConnectorCategory {
        ConnectorCategory::Community
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        match self.client.get("/users/@me").await {
            Ok(_) => Ok(ConnectorHealth::Healthy),
            Err(ConnectorError::AuthenticationFailed(_)) => Ok(ConnectorHealth::Unhealthy(
                "Bot token rejected".to_string(),
            )),
            Err(e) => Ok(ConnectorHealth::Unhealthy(e.to_string())),
        }
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        let response = self.client.get("/users/@me").await?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl CommunityConnector for DiscordConnector {
    fn communities(&self) -> Vec<String> {
        self.config
            .communities
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    #[instrument(skip(self))]
    async fn list_members(&self, community: &str) -> ConnectorResult<Vec<CommunityMember>> {
        let community = self.community(community)?;
        let mut members = Vec::new();
        let mut after = "0".to_string();

        loop {
            let path = format!(
                "/guilds/{}/members?limit={}&after={}",
                community.guild_id, PAGE_LIMIT, after
            );
            let page: Vec<GuildMember> = self.client.get_json(&path).await?;
            let page_len = page.len();
            let cursor = after.clone();
            debug!(community = %community.name, page_len, "Fetched guild member page");

            for member in page {
                let Some(user) = member.user else { continue };
                after = user.id.clone();
                if user.bot {
                    continue;
                }
                members.push(CommunityMember {
                    has_member_role: member.roles.contains(&community.member_role_id),
                    user_id: user.id,
                    username: user.username,
                    nick: member.nick,
                });
            }

            if page_len < PAGE_LIMIT {
                break;
            }
            if after == cursor {
                return Err(ConnectorError::InvalidResponse(format!(
                    "Member listing for {} did not advance past {}",
                    community.name, cursor
                )));
            }
        }

        Ok(members)
    }

    #[instrument(skip(self))]
    async fn grant_member_role(&self, community: &str, user_id: &str) -> ConnectorResult<()> {
        let community = self.community(community)?;
        self.client
            .put_empty(&Self::role_path(community, user_id))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn revoke_member_role(&self, community: &str, user_id: &str) -> ConnectorResult<()> {
        let community = self.community(community)?;
        self.client
            .delete(&Self::role_path(community, user_id))
            .await?;
        Ok(())
    }
}
