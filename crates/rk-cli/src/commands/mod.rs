//! Command implementations and the wiring shared between them.

mod reconcile;
mod serve;

pub use reconcile::{run_reconcile, ReconcileArgs};
pub use serve::{run_server, ServeConfig};

use anyhow::{Context, Result};
use rk_connectors::{
    CheckMeInConnector, Connector, DiscordConnector, GoogleGroupsConnector, SalesforceConnector,
    SendGridConnector,
};
use rk_core::{CommunityDirectory, GroupDirectory, Reconciler, ReconcilerConfig};
use rk_observability::RunMetrics;
use std::sync::Arc;

use crate::config::AppConfig;

/// Every connector built from the configuration, for health checks.
pub fn build_connectors(config: &AppConfig) -> Result<Vec<Arc<dyn Connector>>> {
    let c = &config.connectors;
    let mut connectors: Vec<Arc<dyn Connector>> = Vec::new();

    if let Some(sf) = &c.salesforce {
        connectors.push(Arc::new(
            SalesforceConnector::new(sf.clone()).context("Invalid salesforce configuration")?,
        ));
    }
    if let Some(groups) = &c.google_groups {
        connectors.push(Arc::new(
            GoogleGroupsConnector::new(groups.clone())
                .context("Invalid google_groups configuration")?,
        ));
    }
    if let Some(discord) = &c.discord {
        connectors.push(Arc::new(
            DiscordConnector::new(discord.clone()).context("Invalid discord configuration")?,
        ));
    }
    if let Some(checkin) = &c.checkmein {
        connectors.push(Arc::new(
            CheckMeInConnector::new(checkin.clone()).context("Invalid checkmein configuration")?,
        ));
    }
    if let Some(mail) = &c.sendgrid {
        connectors.push(Arc::new(
            SendGridConnector::new(mail.clone()).context("Invalid sendgrid configuration")?,
        ));
    }
    Ok(connectors)
}

/// Builds the reconciler: the group directory first, then one directory per
/// community, in configuration order.
pub fn build_reconciler(config: &AppConfig, metrics: Arc<RunMetrics>) -> Result<Reconciler> {
    let c = &config.connectors;
    let sf = c
        .salesforce
        .clone()
        .context("connectors.salesforce is required")?;
    let source =
        Arc::new(SalesforceConnector::new(sf).context("Invalid salesforce configuration")?);

    let reconciler_config = ReconcilerConfig {
        exceptions: config.exceptions.clone(),
        max_concurrent_mutations: config.max_concurrent_mutations,
        report_subject: config.report_subject.clone(),
    };
    let mut reconciler = Reconciler::new(source, reconciler_config).with_metrics(metrics);

    if let Some(groups) = &c.google_groups {
        let connector = Arc::new(
            GoogleGroupsConnector::new(groups.clone())
                .context("Invalid google_groups configuration")?,
        );
        reconciler = reconciler.with_directory(Arc::new(GroupDirectory::new(
            config.group_report_name.clone(),
            connector,
        )));
    }

    if let Some(discord) = &c.discord {
        let connector = Arc::new(
            DiscordConnector::new(discord.clone()).context("Invalid discord configuration")?,
        );
        for community in CommunityDirectory::all(connector) {
            reconciler = reconciler.with_directory(Arc::new(community));
        }
    }

    if let Some(checkin) = &c.checkmein {
        reconciler = reconciler.with_mirror(Arc::new(
            CheckMeInConnector::new(checkin.clone()).context("Invalid checkmein configuration")?,
        ));
    }

    if let Some(mail) = &c.sendgrid {
        reconciler = reconciler.with_mailer(Arc::new(
            SendGridConnector::new(mail.clone()).context("Invalid sendgrid configuration")?,
        ));
    }

    Ok(reconciler)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig::parse(
            r#"
connectors:
  salesforce:
    base_url: https://example.my.salesforce.com
  google_groups:
    base_url: https://admin.googleapis.com
    group: members@example.org
  discord:
    base_url: https://discord.com/api/v10
    communities:
      - name: forge
        guild_id: "1"
        member_role_id: "2"
      - name: annex
        guild_id: "3"
        member_role_id: "4"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_directories_follow_config_order() {
        let reconciler = build_reconciler(&config(), Arc::new(RunMetrics::new())).unwrap();
        assert_eq!(reconciler.directory_names(), vec!["members", "forge", "annex"]);
    }

    #[test]
    fn test_source_is_required() {
        let mut config = config();
        config.connectors.salesforce = None;
        assert!(build_reconciler(&config, Arc::new(RunMetrics::new())).is_err());
    }

    #[test]
    fn test_build_connectors_names() {
        let connectors = build_connectors(&config()).unwrap();
        let names: Vec<_> = connectors.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["salesforce", "google_groups", "discord"]);
    }
}
