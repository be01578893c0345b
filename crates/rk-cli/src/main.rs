//! Roster Keeper CLI
//!
//! Keeps the group directory, chat community roles and the check-in system in
//! line with the membership records in the CRM.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rk_connectors::Connector;
use rk_observability::{init_logging_with_config, LoggingConfig};
use std::path::PathBuf;

mod commands;
mod config;
mod validator;

use commands::{build_connectors, run_reconcile, run_server, ReconcileArgs, ServeConfig};
use config::AppConfig;
use validator::ConfigValidator;

#[derive(Parser)]
#[command(name = "roster-keeper")]
#[command(version)]
#[command(about = "Membership reconciliation across directories, chat and check-in", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "ROSTER_KEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Address to bind to, overriding api.bind_address
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run one reconciliation (dry run unless --apply is given)
    Reconcile {
        /// Apply the changes
        #[arg(long)]
        apply: bool,

        /// Operator name recorded in the report
        #[arg(long, env = "ROSTER_KEEPER_OPERATOR", default_value = "cli")]
        operator: String,
    },

    /// Show current configuration
    Config {
        /// Show secrets (redacted by default)
        #[arg(long)]
        show_secrets: bool,
    },

    /// Validate configuration
    Validate {
        /// Also contact every configured collaborator
        #[arg(long)]
        check_connections: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = if cli.config.is_some() || config_path.exists() {
        AppConfig::load(&config_path)?
    } else {
        if cli.verbose {
            eprintln!("Using default configuration (no config file found)");
        }
        AppConfig::default()
    };

    let mut logging = LoggingConfig::from_settings(&config.logging);
    if cli.verbose {
        logging.level = tracing::Level::DEBUG;
    }
    init_logging_with_config(logging);

    match cli.command {
        Commands::Serve { bind } => cmd_serve(ServeConfig { bind }, config).await,
        Commands::Reconcile { apply, operator } => {
            abort_on_errors(&ConfigValidator::validate(&config));
            let code = run_reconcile(
                ReconcileArgs {
                    apply,
                    operator,
                    format: cli.format,
                },
                config,
            )
            .await?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Commands::Config { show_secrets } => cmd_config(config, show_secrets, cli.format),
        Commands::Validate { check_connections } => {
            cmd_validate(config, &config_path, check_connections).await
        }
    }
}

fn default_config_path() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("org", "roster-keeper", "roster-keeper") {
        dirs.config_dir().join("config.yaml")
    } else {
        PathBuf::from("config/roster-keeper.yaml")
    }
}

/// Prints the validation result and exits when it holds errors.
fn abort_on_errors(result: &validator::ValidationResult) {
    if result.has_errors() {
        result.print();
        println!();
        println!(
            "{}",
            "Configuration validation failed. Fix the errors above and try again."
                .red()
                .bold()
        );
        std::process::exit(1);
    }
}

async fn cmd_serve(serve_config: ServeConfig, app_config: AppConfig) -> Result<()> {
    println!("{}", "Validating configuration...".cyan());
    let mut validation = ConfigValidator::validate_serve(&app_config);
    if serve_config.bind.is_some() {
        validation.errors.retain(|e| !e.starts_with("api.bind_address"));
    }
    validation.print();
    abort_on_errors(&validation);

    println!();
    run_server(serve_config, app_config).await
}

fn cmd_config(config: AppConfig, show_secrets: bool, format: OutputFormat) -> Result<()> {
    let display_config = if show_secrets {
        config
    } else {
        config.redact_secrets()
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&display_config)?),
        OutputFormat::Text => {
            println!("{}", "Current Configuration".bold());
            println!("─────────────────────────");
            print!("{}", serde_yaml::to_string(&display_config)?);
        }
    }
    Ok(())
}

async fn cmd_validate(
    config: AppConfig,
    config_path: &std::path::Path,
    check_connections: bool,
) -> Result<()> {
    println!(
        "{} {}",
        "Validating".cyan(),
        config_path.display().to_string().bold()
    );
    let validation = ConfigValidator::validate(&config);
    validation.print();

    let mut unreachable = 0;
    if check_connections && !validation.has_errors() {
        println!();
        println!("{}", "Connections:".bold());
        for connector in build_connectors(&config)? {
            match connector.test_connection().await {
                Ok(true) => println!("  {} {}", "✓".green(), connector.name()),
                Ok(false) => {
                    unreachable += 1;
                    println!("  {} {} (rejected)", "✗".red(), connector.name());
                }
                Err(e) => {
                    unreachable += 1;
                    println!("  {} {}: {}", "✗".red(), connector.name(), e);
                }
            }
        }
    }

    println!();
    if validation.has_errors() || unreachable > 0 {
        println!("{}", "Configuration validation failed.".red().bold());
        std::process::exit(1);
    } else if validation.has_warnings() {
        println!(
            "{}",
            "Configuration is valid with warnings. Review the warnings above."
                .yellow()
                .bold()
        );
    } else {
        println!("{}", "Configuration is valid.".green().bold());
    }
    Ok(())
}
