//! Static configuration checks run before `serve`, `reconcile` and
//! `validate`.

use crate::config::AppConfig;
use colored::Colorize;
use rk_connectors::ConnectorConfig;
use std::collections::HashSet;
use std::net::SocketAddr;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Problems that prevent a run.
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Prints the validation result to the console.
    pub fn print(&self) {
        if !self.warnings.is_empty() {
            println!();
            println!("{}", "Configuration Warnings:".yellow().bold());
            for warning in &self.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        if !self.errors.is_empty() {
            println!();
            println!("{}", "Configuration Errors:".red().bold());
            for error in &self.errors {
                println!("  {} {}", "✗".red(), error);
            }
        }

        if self.errors.is_empty() && self.warnings.is_empty() {
            println!("  {} Configuration OK", "✓".green());
        }
    }
}

/// Validates application configuration.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Checks everything a reconciliation run needs.
    pub fn validate(config: &AppConfig) -> ValidationResult {
        let mut result = ValidationResult::default();
        let c = &config.connectors;

        match &c.salesforce {
            Some(sf) => check_transport(&sf.connector, &mut result),
            None => result.add_error("connectors.salesforce is required (source of truth)"),
        }

        if let Some(groups) = &c.google_groups {
            check_transport(&groups.connector, &mut result);
            if groups.group.trim().is_empty() {
                result.add_error("connectors.google_groups.group must not be empty");
            }
        }

        if let Some(discord) = &c.discord {
            check_transport(&discord.connector, &mut result);
            if discord.communities.is_empty() {
                result.add_warning("connectors.discord has no communities configured");
            }
            let mut seen = HashSet::new();
            for community in &discord.communities {
                if !seen.insert(community.name.as_str()) {
                    result.add_error(format!(
                        "Duplicate community name '{}' in connectors.discord",
                        community.name
                    ));
                }
            }
        }

        if c.google_groups.is_none() && c.discord.is_none() {
            result.add_warning("No target directories configured; runs will only report");
        }

        match &c.checkmein {
            Some(checkin) => check_transport(&checkin.connector, &mut result),
            None => result.add_warning("connectors.checkmein not configured; roster upload skipped"),
        }

        match &c.sendgrid {
            Some(mail) => {
                check_transport(&mail.connector, &mut result);
                if !mail.report_email.contains('@') {
                    result.add_error("connectors.sendgrid.report_email is not an email address");
                }
            }
            None => result.add_warning("connectors.sendgrid not configured; reports are not mailed"),
        }

        for exception in &config.exceptions {
            if !exception.contains('@') {
                result.add_warning(format!(
                    "Exception '{}' does not look like an email address",
                    exception
                ));
            }
        }

        if config.max_concurrent_mutations == 0 {
            result.add_warning("max_concurrent_mutations is 0; using 1");
        }

        result
    }

    /// Adds the checks `serve` needs on top of [`ConfigValidator::validate`].
    pub fn validate_serve(config: &AppConfig) -> ValidationResult {
        let mut result = Self::validate(config);

        if config.api.bind_address.parse::<SocketAddr>().is_err() {
            result.add_error(format!(
                "api.bind_address '{}' is not a valid socket address",
                config.api.bind_address
            ));
        }
        if config.api.tokens.values().all(|t| t.is_empty()) {
            result.add_error("api.tokens is empty; nobody could trigger a run");
        }
        result
    }
}

fn check_transport(connector: &ConnectorConfig, result: &mut ValidationResult) {
    let section = &connector.name;
    if connector.base_url.trim().is_empty() {
        result.add_error(format!("{}: base_url is required", section));
    } else if !connector.base_url.starts_with("https://") {
        result.add_warning(format!("{}: base_url is not HTTPS", section));
    }
    if !connector.verify_tls {
        result.add_warning(format!("{}: TLS verification is disabled", section));
    }
    if connector.timeout_secs == 0 {
        result.add_error(format!("{}: timeout_secs must be greater than 0", section));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_connectors::SecureString;

    fn minimal() -> AppConfig {
        AppConfig::parse(
            r#"
connectors:
  salesforce:
    base_url: https://example.my.salesforce.com
  google_groups:
    base_url: https://admin.googleapis.com
    group: members@example.org
  sendgrid:
    base_url: https://api.sendgrid.com
    sender_name: Roster Keeper
    sender_email: noreply@example.org
    report_email: board@example.org
  checkmein:
    base_url: https://checkmein.example.org
    username: kiosk
    password: pw
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_minimal_config_is_clean() {
        let result = ConfigValidator::validate(&minimal());
        assert!(!result.has_errors(), "{:?}", result.errors);
        assert!(!result.has_warnings(), "{:?}", result.warnings);
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let mut config = minimal();
        config.connectors.salesforce = None;
        let result = ConfigValidator::validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("salesforce")));
    }

    #[test]
    fn test_serve_requires_tokens_and_address() {
        let mut config = minimal();
        config.api.bind_address = "not-an-address".into();
        let result = ConfigValidator::validate_serve(&config);
        assert_eq!(result.errors.len(), 2);

        config.api.bind_address = "127.0.0.1:8080".into();
        config
            .api
            .tokens
            .insert("ops".into(), SecureString::from("token"));
        assert!(!ConfigValidator::validate_serve(&config).has_errors());
    }

    #[test]
    fn test_plain_http_and_odd_exceptions_warn() {
        let mut config = minimal();
        config.exceptions.push("frontdesk".into());
        if let Some(sf) = config.connectors.salesforce.as_mut() {
            sf.connector.base_url = "http://localhost:9999".into();
        }
        let result = ConfigValidator::validate(&config);
        assert!(!result.has_errors());
        assert_eq!(result.warnings.len(), 2);
    }
}
