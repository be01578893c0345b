//! Serve command - starts the API server.

use anyhow::{Context, Result};
use colored::Colorize;
use rk_api::{ApiServer, ApiServerConfig, ApiTokens, AppState};
use rk_observability::{install_prometheus_recorder, RunMetrics};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

use super::build_reconciler;
use crate::config::AppConfig;

/// Server options from CLI arguments.
#[derive(Debug, Clone, Default)]
pub struct ServeConfig {
    /// Overrides `api.bind_address` from the config file.
    pub bind: Option<String>,
}

/// Runs the API server until Ctrl+C or SIGTERM.
pub async fn run_server(config: ServeConfig, app_config: AppConfig) -> Result<()> {
    println!("{} Starting Roster Keeper API server...", "[server]".cyan());

    let address = config
        .bind
        .unwrap_or_else(|| app_config.api.bind_address.clone());
    let bind_address: SocketAddr = address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", address))?;

    let reconciler = build_reconciler(&app_config, Arc::new(RunMetrics::new()))?;
    let directories: Vec<String> = reconciler
        .directory_names()
        .into_iter()
        .map(String::from)
        .collect();
    let tokens = ApiTokens::new(app_config.api.tokens.clone());
    let operators = tokens.len();

    let mut state = AppState::new(reconciler, tokens);
    match install_prometheus_recorder() {
        Ok(handle) => state = state.with_prometheus_handle(handle),
        Err(e) => warn!(error = %e, "Serving without Prometheus metrics"),
    }

    println!();
    println!("{}", "Roster Keeper API Server".bold());
    println!("{}", "═".repeat(40));
    println!("  {} http://{}", "Address:".cyan(), bind_address);
    println!("  {} {}", "Directories:".cyan(), directories.join(", "));
    println!("  {} {}", "Operators:".cyan(), operators);

    println!();
    println!("{}", "Endpoints:".bold());
    println!("  GET  /health                  - Health check");
    println!("  GET  /live                    - Liveness probe");
    println!("  GET  /metrics                 - Prometheus metrics");
    println!("  GET  /api/status              - Run tally (auth)");
    println!("  POST /api/reconcile?dry_run=  - Trigger a run (auth, dry run by default)");
    println!();
    println!("Press {} to stop", "Ctrl+C".yellow());
    println!();

    let server = ApiServer::new(state, ApiServerConfig { bind_address });
    server.run().await.context("Server error")?;

    println!();
    println!("{} Server stopped", "[server]".cyan());
    Ok(())
}
