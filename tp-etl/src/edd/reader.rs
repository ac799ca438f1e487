//! Read lab records from the EDD workbook

use std::path::Path;

use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, open_workbook_auto};
use chrono::{NaiveDate, TimeDelta};

use super::{COLUMNS, cols};
use crate::reconcile::Record;

/// Load every data row below the header sentinel of `sheet`
pub fn load_edd(path: &Path, sheet: &str, sentinel: &str) -> Result<Vec<Record>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open EDD workbook: {}", path.display()))?;

    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        bail!(
            "Sheet '{}' not found in {} (available: {})",
            sheet,
            path.display(),
            workbook.sheet_names().join(", ")
        );
    }

    let range = workbook
        .worksheet_range(sheet)
        .with_context(|| format!("Failed to read sheet: {}", sheet))?;

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let records = parse_rows(range.rows(), first_row, sentinel)
        .with_context(|| format!("Failed to load records from {}", path.display()))?;

    log::info!(
        "Loaded {} records from sheet '{}' of {}",
        records.len(),
        sheet,
        path.display()
    );
    Ok(records)
}

/// Turn raw sheet rows into records
///
/// `first_row` is the 0-based sheet row of the first item in `rows`, used to
/// report 1-based row numbers.
pub fn parse_rows<'a, I>(rows: I, first_row: usize, sentinel: &str) -> Result<Vec<Record>>
where
    I: IntoIterator<Item = &'a [Data]>,
{
    let mut rows = rows.into_iter().enumerate();

    let header = loop {
        match rows.next() {
            Some((_, row)) if cell_text(row.first()).as_deref() == Some(sentinel) => break row,
            Some(_) => continue,
            None => bail!("Header row starting with '{}' not found", sentinel),
        }
    };

    let rows: Vec<(usize, &[Data])> = rows.collect();
    let width = sheet_width(header, rows.iter().map(|(_, row)| *row));

    if width < COLUMNS.len() {
        bail!(
            "Expected {} columns after '{}', found {}",
            COLUMNS.len(),
            sentinel,
            width
        );
    }
    if width > COLUMNS.len() {
        log::warn!(
            "Truncating imported dataset after field: {}",
            cell_text(header.get(COLUMNS.len() - 1))
                .unwrap_or_else(|| COLUMNS[COLUMNS.len() - 1].to_string())
        );
    }

    for (idx, expected) in COLUMNS.iter().enumerate() {
        let found = cell_text(header.get(idx)).unwrap_or_default();
        if found != *expected {
            log::debug!("Column {} header '{}' read as '{}'", idx + 1, found, expected);
        }
    }

    let mut records = Vec::new();
    for (idx, row) in rows {
        let row_number = first_row + idx + 1;
        let row = &row[..row.len().min(COLUMNS.len())];

        if row.iter().all(|cell| cell_text(Some(cell)).is_none()) {
            continue;
        }

        records.push(parse_record(row, row_number)?);
    }

    Ok(records)
}

/// Widest used extent of the header and every row below it
fn sheet_width<'a>(header: &[Data], rows: impl Iterator<Item = &'a [Data]>) -> usize {
    rows.map(used_width).fold(used_width(header), usize::max)
}

/// Columns up to and including the last non-blank cell
fn used_width(row: &[Data]) -> usize {
    row.iter()
        .rposition(|cell| cell_text(Some(cell)).is_some())
        .map(|last| last + 1)
        .unwrap_or(0)
}

fn parse_record(row: &[Data], row_number: usize) -> Result<Record> {
    let mut record = Record::new(row_number, cell_text(row.get(cols::SITE_ID)).unwrap_or_default());

    record.sampling = cell_text(row.get(cols::SAMPLING)).unwrap_or_default();
    record.date = cell_date(row.get(cols::DATE));
    record.sample_plus_bottle_weight_g = cell_number(row, cols::SAMPLE_PLUS_BOTTLE, row_number)?;
    record.bottle_weight_g = cell_number(row, cols::BOTTLE, row_number)?;
    record.sample_wet_weight_g = cell_number(row, cols::SAMPLE_WET, row_number)?;
    record.total_phosphorus = cell_text(row.get(cols::TOTAL_PHOSPHORUS));
    record.plant_weight_g = cell_number(row, cols::PLANT, row_number)?;

    Ok(record)
}

/// Trimmed text of a cell, `None` when blank. Whole numbers drop the
/// decimal part so numeric site ids compare as written.
fn cell_text(cell: Option<&Data>) -> Option<String> {
    let text = match cell? {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => {
            excel_serial_to_date(dt.as_f64()).unwrap_or_else(|| dt.as_f64().to_string())
        }
        Data::Error(_) | Data::Empty => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn cell_date(cell: Option<&Data>) -> Option<String> {
    match cell? {
        // Date columns formatted as numbers still hold Excel serials
        Data::Float(f) => excel_serial_to_date(*f).or_else(|| cell_text(cell)),
        _ => cell_text(cell),
    }
}

/// Excel serial day (1900 date system) to `YYYY-MM-DD`. `None` when the
/// serial falls outside the calendar chrono can represent.
fn excel_serial_to_date(serial: f64) -> Option<String> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = epoch.checked_add_signed(TimeDelta::try_days(serial.floor() as i64)?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn cell_number(row: &[Data], col: usize, row_number: usize) -> Result<Option<f64>> {
    match row.get(col) {
        None | Some(Data::Empty) => Ok(None),
        Some(Data::Float(f)) => Ok(Some(*f)),
        Some(Data::Int(i)) => Ok(Some(*i as f64)),
        Some(Data::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Data::String(s)) => s.trim().parse::<f64>().map(Some).with_context(|| {
            format!(
                "Row {}: '{}' is not a number in column '{}'",
                row_number, s, COLUMNS[col]
            )
        }),
        Some(other) => bail!(
            "Row {}: unexpected value {:?} in column '{}'",
            row_number,
            other,
            COLUMNS[col]
        ),
    }
}
