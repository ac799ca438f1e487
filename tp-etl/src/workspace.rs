//! Output directory for the run log and exports

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::config::ExportFormat;

/// Dated file names inside the workspace directory
#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    dir: PathBuf,
    year: i32,
    date: NaiveDate,
}

impl Workspace {
    /// Create `dir` if missing
    pub fn prepare(dir: &Path, year: i32, date: NaiveDate) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create workspace: {}", dir.display()))?;

        Ok(Workspace {
            dir: dir.to_path_buf(),
            year,
            date,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn stamp(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    pub fn log_file(&self) -> PathBuf {
        self.dir.join(format!(
            "Periphyton_TP_HydroYear_{}_ETL_{}_logfile.txt",
            self.year,
            self.stamp()
        ))
    }

    pub fn unmatched_export(&self, format: ExportFormat) -> PathBuf {
        self.dir.join(format!(
            "RecordsNoEventinDB_{}.{}",
            self.stamp(),
            format.extension()
        ))
    }

    pub fn appended_export(&self) -> PathBuf {
        self.dir.join(format!("RecordsAppended_{}.csv", self.stamp()))
    }
}
