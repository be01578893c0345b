//! Reconcile command - runs one reconciliation from the command line.

use anyhow::Result;
use colored::Colorize;
use rk_core::{Report, RunStatus};
use rk_observability::RunMetrics;
use std::sync::Arc;

use super::build_reconciler;
use crate::config::AppConfig;
use crate::OutputFormat;

/// Exit status of a run that finished degraded.
pub const DEGRADED_EXIT_CODE: i32 = 2;

#[derive(Debug, Clone)]
pub struct ReconcileArgs {
    /// Apply the changes instead of simulating.
    pub apply: bool,
    pub operator: String,
    pub format: OutputFormat,
}

/// Runs once and prints the report. Returns the process exit code.
pub async fn run_reconcile(args: ReconcileArgs, config: AppConfig) -> Result<i32> {
    let reconciler = build_reconciler(&config, Arc::new(RunMetrics::new()))?;

    if args.format == OutputFormat::Text {
        let mode = if args.apply {
            "apply".red().bold()
        } else {
            "dry run".green().bold()
        };
        eprintln!("{} Reconciling ({})...", "[reconcile]".cyan(), mode);
    }

    let report = reconciler.run(!args.apply, &args.operator).await?;
    print_report(&report, args.format)?;
    Ok(exit_code(&report))
}

fn print_report(report: &Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            println!("{}", report.render_text());
            match report.status {
                RunStatus::Clean => println!("{}", "Run completed cleanly.".green().bold()),
                RunStatus::Degraded => println!(
                    "{}",
                    "Run completed with errors. Review the report above."
                        .yellow()
                        .bold()
                ),
            }
        }
    }
    Ok(())
}

pub fn exit_code(report: &Report) -> i32 {
    match report.status {
        RunStatus::Clean => 0,
        RunStatus::Degraded => DEGRADED_EXIT_CODE,
    }
}
