//! Records left without an event after the cascade

use std::path::Path;

use anyhow::{Context, Result};
use csv::Writer;
use rust_xlsxwriter::{Workbook, Worksheet};

use super::types::Record;
use crate::config::ExportFormat;
use crate::edd::COLUMNS;

/// Reconciliation columns appended after the EDD columns
const RECONCILIATION_COLUMNS: [&str; 5] = [
    "Event_ID",
    "Event_Group_ID",
    "Site_ID",
    "Visit_Type",
    "DuplicateRecord",
];

pub fn count_unmatched(records: &[Record]) -> usize {
    records.iter().filter(|r| !r.is_claimed()).count()
}

pub fn unmatched_records(records: &[Record]) -> Vec<&Record> {
    records.iter().filter(|r| !r.is_claimed()).collect()
}

/// Write the unmatched records to `path` so they can be fixed by hand.
/// Returns the number of rows written.
pub fn export_unmatched(records: &[Record], path: &Path, format: ExportFormat) -> Result<usize> {
    let rows = unmatched_records(records);

    match format {
        ExportFormat::Csv => write_csv(&rows, path)?,
        ExportFormat::Xlsx => write_xlsx(&rows, path)?,
    }

    log::info!(
        "Exported {} records with no event to: {}",
        rows.len(),
        path.display()
    );
    Ok(rows.len())
}

fn header() -> Vec<&'static str> {
    COLUMNS.iter().chain(RECONCILIATION_COLUMNS.iter()).copied().collect()
}

fn fields(record: &Record) -> Vec<String> {
    vec![
        record.sampling.clone(),
        record.site_id.clone(),
        record.date.clone().unwrap_or_default(),
        number(record.sample_plus_bottle_weight_g),
        number(record.bottle_weight_g),
        number(record.sample_wet_weight_g),
        record.total_phosphorus.clone().unwrap_or_default(),
        number(record.plant_weight_g),
        record.event_id.clone().unwrap_or_default(),
        record.event_group_id.clone().unwrap_or_default(),
        record.assigned_site_id.clone().unwrap_or_default(),
        record.visit_type.clone().unwrap_or_default(),
        record.duplicate.to_string(),
    ]
}

fn number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_csv(rows: &[&Record], path: &Path) -> Result<()> {
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    wtr.write_record(header())
        .context("Failed to write CSV header")?;

    for record in rows {
        wtr.write_record(fields(record))
            .with_context(|| format!("Failed to write row {}", record.row))?;
    }

    wtr.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

fn write_xlsx(rows: &[&Record], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("RecordsNoEventinDB")?;

    for (col, name) in header().iter().enumerate() {
        worksheet.write_string(0, col as u16, *name)?;
    }

    for (idx, record) in rows.iter().enumerate() {
        let row = (idx + 1) as u32;
        write_record(worksheet, row, record)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save Excel file: {}", path.display()))?;
    Ok(())
}

fn write_record(ws: &mut Worksheet, row: u32, record: &Record) -> Result<()> {
    // Weight columns are written as numbers
    let numeric = [
        (3u16, record.sample_plus_bottle_weight_g),
        (4, record.bottle_weight_g),
        (5, record.sample_wet_weight_g),
        (7, record.plant_weight_g),
    ];

    for (col, value) in fields(record).iter().enumerate() {
        let col = col as u16;
        if let Some((_, weight)) = numeric.iter().find(|(c, _)| *c == col) {
            if let Some(w) = weight {
                ws.write_number(row, col, *w)?;
            }
            continue;
        }
        if !value.is_empty() {
            ws.write_string(row, col, value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::fixtures::event;
    use calamine::{Data, Reader, open_workbook_auto};
    use uuid::Uuid;

    fn sample_records() -> Vec<Record> {
        let mut matched = Record::new(2, "A");
        matched.claim(&event("E1", "A"));

        let mut missing = Record::new(3, "Z");
        missing.sampling = "Periphyton".to_string();
        missing.bottle_weight_g = Some(12.5);
        missing.total_phosphorus = Some("<0.01".to_string());

        vec![matched, missing]
    }

    #[test]
    fn test_count_and_filter_unmatched() {
        let records = sample_records();
        assert_eq!(count_unmatched(&records), 1);

        let rows = unmatched_records(&records);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].site_id, "Z");
    }

    #[test]
    fn test_csv_export_keeps_record_attributes() {
        let path = std::env::temp_dir().join(format!("tp-etl-unmatched-{}.csv", Uuid::new_v4()));
        let written = export_unmatched(&sample_records(), &path, ExportFormat::Csv).unwrap();
        assert_eq!(written, 1);

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(&headers[1], "Site ID");
        assert_eq!(&headers[8], "Event_ID");

        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "Periphyton");
        assert_eq!(&rows[0][1], "Z");
        assert_eq!(&rows[0][4], "12.5");
        assert_eq!(&rows[0][6], "<0.01");
        assert_eq!(&rows[0][8], "");
        assert_eq!(&rows[0][12], "false");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_xlsx_export_readable() {
        let path = std::env::temp_dir().join(format!("tp-etl-unmatched-{}.xlsx", Uuid::new_v4()));
        export_unmatched(&sample_records(), &path, ExportFormat::Xlsx).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        let range = workbook.worksheet_range("RecordsNoEventinDB").unwrap();
        let rows: Vec<_> = range.rows().collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], Data::String("Sampling".to_string()));
        assert_eq!(rows[1][1], Data::String("Z".to_string()));
        assert_eq!(rows[1][4], Data::Float(12.5));

        std::fs::remove_file(&path).ok();
    }
}
