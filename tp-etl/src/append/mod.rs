//! Appending reconciled records to the results table

use std::path::Path;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use csv::Writer;
use uuid::Uuid;

use crate::config::LabMetadata;
use crate::reconcile::Record;

/// One row of `tbl_Lab_Data_TotalPhosphorus`
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// `TotalPhosphorus_Data_ID`
    pub id: Uuid,
    pub event_id: String,
    pub lab: LabMetadata,
    pub bottle_weight_g: Option<f64>,
    pub plant_weight_g: Option<f64>,
    pub sample_wet_weight_g: Option<f64>,
    pub total_phosphorus: Option<String>,
    pub duplicate: bool,
    pub notes: Option<String>,

    /// Source row and site, for reporting only
    pub row: usize,
    pub site_id: String,
}

/// Destination for result rows
#[async_trait]
pub trait ResultWriter: Send + Sync {
    async fn insert(&self, row: &ResultRow) -> Result<()>;
}

/// Attach run metadata and a fresh key to every record.
/// Fails if any record has no event.
pub fn build_result_rows(records: &[Record], lab: &LabMetadata) -> Result<Vec<ResultRow>> {
    records
        .iter()
        .map(|record| {
            let Some(event_id) = record.event_id.clone() else {
                bail!(
                    "Row {} (site '{}') has no event and cannot be appended",
                    record.row,
                    record.site_id
                );
            };
            Ok(ResultRow {
                id: Uuid::new_v4(),
                event_id,
                lab: lab.clone(),
                bottle_weight_g: record.bottle_weight_g,
                plant_weight_g: record.plant_weight_g,
                sample_wet_weight_g: record.sample_wet_weight_g,
                total_phosphorus: record.total_phosphorus.clone(),
                duplicate: record.duplicate,
                notes: None,
                row: record.row,
                site_id: record.site_id.clone(),
            })
        })
        .collect()
}

/// A row the writer rejected
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRow {
    pub row: usize,
    pub event_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppendSummary {
    pub written: usize,
    pub failed: Vec<FailedRow>,
}

impl AppendSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Insert rows one at a time. A failed row is logged and the rest are still
/// attempted; there is no transaction across rows.
pub async fn append_rows(writer: &dyn ResultWriter, rows: &[ResultRow]) -> AppendSummary {
    let mut summary = AppendSummary::default();

    for row in rows {
        match writer.insert(row).await {
            Ok(()) => {
                log::info!("Successfully appended record for Event_ID: {}", row.event_id);
                summary.written += 1;
            }
            Err(e) => {
                log::error!(
                    "Failed to append row {} (site '{}') for Event_ID {}: {:#}",
                    row.row,
                    row.site_id,
                    row.event_id,
                    e
                );
                summary.failed.push(FailedRow {
                    row: row.row,
                    event_id: row.event_id.clone(),
                    error: format!("{:#}", e),
                });
            }
        }
    }

    summary
}

const AUDIT_HEADER: [&str; 12] = [
    "TotalPhosphorus_Data_ID",
    "Event_ID",
    "TP_Lab_Name",
    "TP_Lab_SOP",
    "TP_Lab_ID",
    "TP_Lab_MDL",
    "Bottle_Weight_g",
    "Plant_Weight_g",
    "Sample_Wet_Weight_g",
    "Total_Phosphorus",
    "DuplicateRecord",
    "Notes",
];

/// Write the rows about to be appended, in table column order
pub fn export_appended(rows: &[ResultRow], path: &Path) -> Result<()> {
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    wtr.write_record(AUDIT_HEADER)
        .context("Failed to write CSV header")?;

    let number = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();

    for row in rows {
        wtr.write_record([
            row.id.to_string(),
            row.event_id.clone(),
            row.lab.name.clone(),
            row.lab.sop.clone(),
            row.lab.lab_id.clone().unwrap_or_default(),
            row.lab.mdl.clone(),
            number(row.bottle_weight_g),
            number(row.plant_weight_g),
            number(row.sample_wet_weight_g),
            row.total_phosphorus.clone().unwrap_or_default(),
            row.duplicate.to_string(),
            row.notes.clone().unwrap_or_default(),
        ])
        .with_context(|| format!("Failed to write row for Event_ID: {}", row.event_id))?;
    }

    wtr.flush().context("Failed to flush CSV writer")?;

    log::info!("Exported {} records to append to: {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Mutex;

    use super::*;

    /// Collects inserted rows; rejects any whose event id is listed
    #[derive(Default)]
    pub struct MemoryWriter {
        pub rows: Mutex<Vec<ResultRow>>,
        pub reject: Vec<String>,
    }

    impl MemoryWriter {
        pub fn rejecting(event_ids: &[&str]) -> Self {
            MemoryWriter {
                rows: Mutex::new(Vec::new()),
                reject: event_ids.iter().map(|s| s.to_string()).collect(),
            }
        }

        pub fn inserted(&self) -> Vec<ResultRow> {
            self.rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResultWriter for MemoryWriter {
        async fn insert(&self, row: &ResultRow) -> Result<()> {
            if self.reject.contains(&row.event_id) {
                bail!("UNIQUE constraint failed: tbl_Lab_Data_TotalPhosphorus.Event_ID");
            }
            self.rows.lock().unwrap().push(row.clone());
            Ok(())
        }
    }
}
