pub mod commands;

use clap::{Parser, Subcommand};

use commands::init_db::InitDbCommands;
use commands::run::RunCommands;

#[derive(Parser, Debug)]
#[command(name = "tp-etl")]
#[command(about = "Reconcile Total Phosphorus lab deliverables against periphyton events and load them")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load an EDD, match every record to an event and append the results
    Run(RunCommands),
    /// Create the reference and results tables in a SQLite database
    InitDb(InitDbCommands),
}
