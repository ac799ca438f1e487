use std::process::ExitCode;

use clap::Parser;
use colored::*;

mod append;
mod cli;
mod config;
mod db;
mod edd;
mod logging;
mod pipeline;
mod reconcile;
mod workspace;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => cli::commands::run::handle_run_command(args).await,
        Commands::InitDb(args) => cli::commands::init_db::handle_init_db_command(args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
