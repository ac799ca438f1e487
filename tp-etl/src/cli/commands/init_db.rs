//! Create the database schema

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use colored::*;

use crate::{db, logging};

#[derive(Args, Debug)]
pub struct InitDbCommands {
    /// SQLite database file (created if missing)
    pub database: PathBuf,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn handle_init_db_command(args: InitDbCommands) -> Result<ExitCode> {
    logging::init(None, args.verbose)?;

    let pool = db::connect(&args.database, true).await?;
    db::migrate(&pool).await?;
    pool.close().await;

    log::info!("Schema ready in {}", args.database.display());
    println!(
        "{} Database ready: {}",
        "✓".bright_green(),
        args.database.display().to_string().cyan()
    );
    Ok(ExitCode::SUCCESS)
}
