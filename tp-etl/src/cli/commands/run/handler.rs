//! Run command handler

use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::*;
use dialoguer::Confirm;

use super::RunCommands;
use crate::config::EtlConfig;
use crate::db::{self, SqliteReferenceSource, SqliteResultWriter};
use crate::edd::load_edd;
use crate::logging;
use crate::pipeline::{EtlRun, Preconditions, RunReport, RunStatus};
use crate::workspace::Workspace;

/// Handle the run command. Errors before the run log is open are returned;
/// later ones are logged and turned into a failing exit code.
pub async fn handle_run_command(args: RunCommands) -> Result<ExitCode> {
    if args.no_color {
        colored::control::set_override(false);
    }

    let config = EtlConfig::load(args.config.as_deref(), args.overrides())?;
    let today = chrono::Local::now().date_naive();
    let workspace = Workspace::prepare(&config.workspace, config.hydrologic_year, today)?;

    logging::init(Some(&workspace.log_file()), args.verbose)?;

    match execute(&args, &config, &workspace).await {
        Ok(report) => {
            print_summary(&report);
            if report.status.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Err(e) => {
            log::error!("{:#}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn execute(args: &RunCommands, config: &EtlConfig, workspace: &Workspace) -> Result<RunReport> {
    log::info!(
        "Starting TP ETL for hydrologic year {} - input: {}",
        config.hydrologic_year,
        config.input.display()
    );
    log::info!("Workspace: {}", workspace.dir().display());

    let preconditions = if args.yes {
        Preconditions::confirmed()
    } else {
        prompt_preconditions()?
    };
    preconditions.check()?;

    let records = load_edd(&config.input, &config.sheet, &config.header_sentinel)?;

    let pool = db::connect(&config.database, false).await?;
    let source = SqliteReferenceSource::new(pool.clone());
    let writer = SqliteResultWriter::new(pool.clone());

    let report = EtlRun::new(config, workspace)
        .execute(records, &source, &writer, args.dry_run)
        .await;

    pool.close().await;
    report
}

fn prompt_preconditions() -> Result<Preconditions> {
    let qc_extra_sites_defined = Confirm::new()
        .with_prompt(
            "Have the QA/QC and Extra Sample events been given their Site_IDLab_QCExtra value in tbl_Event?",
        )
        .default(false)
        .interact()
        .context("Failed to read confirmation")?;

    if !qc_extra_sites_defined {
        return Ok(Preconditions {
            qc_extra_sites_defined,
            lab_duplicates_defined: false,
        });
    }

    let lab_duplicates_defined = Confirm::new()
        .with_prompt("Have the lab duplicate records been defined in tbl_LabDuplicates?")
        .default(false)
        .interact()
        .context("Failed to read confirmation")?;

    Ok(Preconditions {
        qc_extra_sites_defined,
        lab_duplicates_defined,
    })
}

fn print_summary(report: &RunReport) {
    println!();
    println!("{}", "Reconciliation".bold());
    println!("  Records loaded: {}", report.loaded.to_string().cyan());
    for pass in &report.cascade.passes {
        println!(
            "  {:<16} {:>4} assigned, {:>4} still unmatched",
            pass.kind.label(),
            pass.outcome.claimed,
            pass.unmatched_after
        );
    }

    let duplicates = report.cascade.duplicates_flagged();
    if duplicates > 0 {
        println!("  Lab duplicates flagged: {}", duplicates.to_string().cyan());
    }

    let collisions = report.cascade.collisions().count();
    if collisions > 0 {
        println!(
            "  {} records matched more than one event (first kept, see log)",
            collisions.to_string().yellow()
        );
    }
    println!();

    match &report.status {
        RunStatus::Appended { count } => {
            println!(
                "{} {} records appended",
                "✓".bright_green(),
                count.to_string().bright_green().bold()
            );
        }
        RunStatus::DryRun { count } => {
            println!(
                "{} Dry run: {} records ready to append, nothing written",
                "✓".bright_green(),
                count.to_string().cyan()
            );
        }
        RunStatus::Unmatched { count, export } => {
            println!(
                "{} {} records have no event in the database. Nothing was appended.",
                "✗".bright_red(),
                count.to_string().bright_red().bold()
            );
            println!("  Define the events, then re-run. Records exported to:");
            println!("  {}", export.display().to_string().yellow());
        }
        RunStatus::WriteFailures { written, failed } => {
            println!(
                "{} {} records appended, {} failed:",
                "✗".bright_red(),
                written,
                failed.len().to_string().bright_red().bold()
            );
            for row in failed {
                println!("  row {} Event_ID {}: {}", row.row, row.event_id.yellow(), row.error.dimmed());
            }
        }
    }
}
