//! One ETL run: reconcile, report unmatched records, append

use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::append::{FailedRow, ResultWriter, append_rows, build_result_rows, export_appended};
use crate::config::EtlConfig;
use crate::reconcile::{Cascade, CascadeReport, Record, ReferenceSource, export_unmatched};
use crate::workspace::Workspace;

/// Operator attestations required before a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preconditions {
    /// QA/QC and Extra Sample events have `Site_IDLab_QCExtra` populated
    pub qc_extra_sites_defined: bool,
    /// `tbl_LabDuplicates` holds this deliverable's duplicate mappings
    pub lab_duplicates_defined: bool,
}

impl Preconditions {
    pub fn confirmed() -> Self {
        Preconditions {
            qc_extra_sites_defined: true,
            lab_duplicates_defined: true,
        }
    }

    pub fn check(&self) -> Result<()> {
        if !self.qc_extra_sites_defined {
            bail!(
                "QC/extra site ids (Site_IDLab_QCExtra) must be defined in tbl_Event before processing"
            );
        }
        if !self.lab_duplicates_defined {
            bail!("Lab duplicate records must be defined in tbl_LabDuplicates before processing");
        }
        Ok(())
    }
}

/// How a run ended, when it did not fail outright
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Appended { count: usize },
    /// Everything reconciled; nothing written
    DryRun { count: usize },
    /// Records without an event were exported; nothing written
    Unmatched { count: usize, export: PathBuf },
    WriteFailures { written: usize, failed: Vec<FailedRow> },
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Appended { .. } | RunStatus::DryRun { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub loaded: usize,
    pub cascade: CascadeReport,
    pub status: RunStatus,
}

pub struct EtlRun<'a> {
    config: &'a EtlConfig,
    workspace: &'a Workspace,
}

impl<'a> EtlRun<'a> {
    pub fn new(config: &'a EtlConfig, workspace: &'a Workspace) -> Self {
        Self { config, workspace }
    }

    /// Reconcile `records` and, if every one found an event, append them.
    /// Nothing reaches `writer` unless the whole set reconciled.
    pub async fn execute(
        &self,
        mut records: Vec<Record>,
        source: &dyn ReferenceSource,
        writer: &dyn ResultWriter,
        dry_run: bool,
    ) -> Result<RunReport> {
        let loaded = records.len();
        if loaded == 0 {
            log::warn!("No records found in {}", self.config.input.display());
        }

        let cascade = Cascade::new(self.config.hydrologic_year, self.config.duplicate_type.clone())
            .run(source, &mut records)
            .await?;

        if !cascade.is_complete() {
            let export = self.workspace.unmatched_export(self.config.export_format);
            log::warn!(
                "There are {} records without a defined event. Define the events in the database before re-running.",
                cascade.unmatched
            );
            export_unmatched(&records, &export, self.config.export_format)?;

            return Ok(RunReport {
                loaded,
                status: RunStatus::Unmatched {
                    count: cascade.unmatched,
                    export,
                },
                cascade,
            });
        }

        let rows = build_result_rows(&records, &self.config.lab)?;
        export_appended(&rows, &self.workspace.appended_export())?;

        if dry_run {
            log::info!("Dry run: {} records reconciled, nothing appended", rows.len());
            return Ok(RunReport {
                loaded,
                cascade,
                status: RunStatus::DryRun { count: rows.len() },
            });
        }

        let summary = append_rows(writer, &rows).await;

        let status = if summary.is_success() {
            log::info!(
                "Successfully processed: {} - Records in table - {}",
                summary.written,
                self.config.input.display()
            );
            RunStatus::Appended {
                count: summary.written,
            }
        } else {
            log::error!(
                "{} of {} records failed to append",
                summary.failed.len(),
                rows.len()
            );
            RunStatus::WriteFailures {
                written: summary.written,
                failed: summary.failed,
            }
        };

        Ok(RunReport {
            loaded,
            cascade,
            status,
        })
    }
}
