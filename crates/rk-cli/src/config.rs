//! Configuration loading for the Roster Keeper CLI.

use anyhow::{Context, Result};
use rk_connectors::{
    CheckMeInConfig, DiscordConfig, GoogleGroupsConfig, SalesforceConfig, SecureString,
    SendGridConfig,
};
use rk_core::{DEFAULT_MAX_CONCURRENT_MUTATIONS, DEFAULT_REPORT_SUBJECT};
use rk_observability::LogSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Collaborator connections.
    #[serde(default)]
    pub connectors: ConnectorsConfig,

    /// Addresses kept in the group directory without a membership record.
    #[serde(default)]
    pub exceptions: Vec<String>,

    /// Name under which the group directory appears in reports.
    #[serde(default = "default_group_report_name")]
    pub group_report_name: String,

    /// In-flight mutations per directory.
    #[serde(default = "default_max_concurrent_mutations")]
    pub max_concurrent_mutations: usize,

    #[serde(default = "default_report_subject")]
    pub report_subject: String,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LogSettings,
}

fn default_group_report_name() -> String {
    "members".to_string()
}

fn default_max_concurrent_mutations() -> usize {
    DEFAULT_MAX_CONCURRENT_MUTATIONS
}

fn default_report_subject() -> String {
    DEFAULT_REPORT_SUBJECT.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connectors: ConnectorsConfig::default(),
            exceptions: Vec::new(),
            group_report_name: default_group_report_name(),
            max_concurrent_mutations: default_max_concurrent_mutations(),
            report_subject: default_report_subject(),
            api: ApiConfig::default(),
            logging: LogSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parses YAML and fills connector names from their section keys.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(contents)?;
        config.connectors.fill_names();
        Ok(config)
    }

    /// Creates a copy with secrets redacted.
    pub fn redact_secrets(&self) -> Self {
        let mut config = self.clone();
        let c = &mut config.connectors;

        if let Some(sf) = c.salesforce.as_mut() {
            sf.connector = sf.connector.redacted();
        }
        if let Some(groups) = c.google_groups.as_mut() {
            groups.connector = groups.connector.redacted();
        }
        if let Some(discord) = c.discord.as_mut() {
            discord.connector = discord.connector.redacted();
        }
        if let Some(checkin) = c.checkmein.as_mut() {
            checkin.connector = checkin.connector.redacted();
            checkin.password = checkin.password.redacted();
        }
        if let Some(mail) = c.sendgrid.as_mut() {
            mail.connector = mail.connector.redacted();
        }

        for token in config.api.tokens.values_mut() {
            *token = token.redacted();
        }
        config
    }
}

/// One optional section per collaborator. Only `salesforce` is required to
/// run; a missing directory section means that directory is not reconciled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectorsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salesforce: Option<SalesforceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_groups: Option<GoogleGroupsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord: Option<DiscordConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkmein: Option<CheckMeInConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sendgrid: Option<SendGridConfig>,
}

impl ConnectorsConfig {
    fn fill_names(&mut self) {
        fn fill(name: &mut String, section: &str) {
            if name.is_empty() {
                *name = section.to_string();
            }
        }
        if let Some(c) = self.salesforce.as_mut() {
            fill(&mut c.connector.name, "salesforce");
        }
        if let Some(c) = self.google_groups.as_mut() {
            fill(&mut c.connector.name, "google_groups");
        }
        if let Some(c) = self.discord.as_mut() {
            fill(&mut c.connector.name, "discord");
        }
        if let Some(c) = self.checkmein.as_mut() {
            fill(&mut c.connector.name, "checkmein");
        }
        if let Some(c) = self.sendgrid.as_mut() {
            fill(&mut c.connector.name, "sendgrid");
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Bearer tokens keyed by operator name.
    #[serde(default)]
    pub tokens: BTreeMap<String, SecureString>,
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            tokens: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_connectors::{secure_string::REDACTED, AuthConfig};

    const SAMPLE: &str = r#"
exceptions:
  - frontdesk@example.org
  - board@example.org

connectors:
  salesforce:
    base_url: https://example.my.salesforce.com
    auth:
      type: oauth2
      client_id: roster-keeper
      client_secret: sf-secret
      token_url: https://example.my.salesforce.com/services/oauth2/token
  google_groups:
    base_url: https://admin.googleapis.com
    group: members@example.org
    auth:
      type: metadata_server
      token_url: http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token
  discord:
    base_url: https://discord.com/api/v10
    auth:
      type: bot_token
      token: discord-secret
    communities:
      - name: forge
        guild_id: "111"
        member_role_id: "222"
  checkmein:
    base_url: https://checkmein.example.org
    username: kiosk
    password: kiosk-secret

api:
  bind_address: 0.0.0.0:9000
  tokens:
    ops: api-secret

logging:
  level: debug
  json: true
"#;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.group_report_name, "members");
        assert_eq!(config.max_concurrent_mutations, DEFAULT_MAX_CONCURRENT_MUTATIONS);
        assert_eq!(config.report_subject, DEFAULT_REPORT_SUBJECT);
        assert_eq!(config.api.bind_address, "127.0.0.1:8080");
        assert!(config.connectors.salesforce.is_none());
    }

    #[test]
    fn test_parse_yaml() {
        let config = AppConfig::parse(SAMPLE).unwrap();

        assert_eq!(config.exceptions.len(), 2);
        let sf = config.connectors.salesforce.as_ref().unwrap();
        assert_eq!(sf.connector.name, "salesforce");
        assert_eq!(sf.api_version, "v58.0");
        assert!(matches!(sf.connector.auth, AuthConfig::OAuth2 { .. }));

        let groups = config.connectors.google_groups.as_ref().unwrap();
        assert_eq!(groups.group, "members@example.org");
        assert_eq!(groups.member_role, "MEMBER");

        let discord = config.connectors.discord.as_ref().unwrap();
        assert_eq!(discord.communities[0].name, "forge");
        assert!(config.connectors.sendgrid.is_none());

        assert_eq!(config.api.bind_address, "0.0.0.0:9000");
        assert!(config.api.tokens["ops"].matches("api-secret"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_redact_secrets() {
        let redacted = AppConfig::parse(SAMPLE).unwrap().redact_secrets();
        let yaml = serde_yaml::to_string(&redacted).unwrap();

        for secret in ["sf-secret", "discord-secret", "kiosk-secret", "api-secret"] {
            assert!(!yaml.contains(secret), "{} leaked", secret);
        }
        assert!(yaml.contains(REDACTED));
        let checkin = redacted.connectors.checkmein.unwrap();
        assert_eq!(checkin.username, "kiosk");
    }

    #[test]
    fn test_unknown_auth_type_is_rejected() {
        let yaml = r#"
connectors:
  salesforce:
    base_url: https://example.my.salesforce.com
    auth:
      type: carrier_pigeon
"#;
        assert!(AppConfig::parse(yaml).is_err());
    }
}
