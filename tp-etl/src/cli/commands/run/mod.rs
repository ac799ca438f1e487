mod handler;

pub use handler::handle_run_command;

use std::path::PathBuf;

use clap::Args;

use crate::config::{ConfigOverrides, ExportFormat};

#[derive(Args, Debug)]
pub struct RunCommands {
    /// Config file (defaults to $TP_ETL_CONFIG, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// EDD workbook to load
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Hydrologic year the records belong to
    #[arg(short, long)]
    pub year: Option<i32>,

    /// SQLite database with the event and results tables
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Directory for the run log and exports
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Format of the unmatched-record export
    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,

    /// Reconcile and export, but do not append
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompts (the preconditions are met)
    #[arg(long)]
    pub yes: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl RunCommands {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            input: self.input.clone(),
            hydrologic_year: self.year,
            database: self.database.clone(),
            workspace: self.workspace.clone(),
            export_format: self.format,
        }
    }
}
