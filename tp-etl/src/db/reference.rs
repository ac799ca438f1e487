//! Reference event queries

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::reconcile::{LabDuplicateEvent, ReferenceEvent, ReferenceSource, VisitType};

const EVENTS_BY_VISIT_TYPE: &str = r#"
    SELECT e.Event_ID, e.Event_Group_ID, g.Hydrologic_Year, e.Start_Date,
           e.Site_ID, s.Site_Name, e.Site_IDLab_QCExtra, e.Visit_Type
    FROM tbl_Event e
    INNER JOIN tbl_Event_Group g ON g.Event_Group_ID = e.Event_Group_ID
    LEFT JOIN tbl_Site s ON s.Site_ID = e.Site_ID
    WHERE g.Hydrologic_Year = ? AND e.Visit_Type = ?
    ORDER BY e.Start_Date, s.Site_Name, e.Visit_Type, e.Event_ID
"#;

const LAB_DUPLICATE_EVENTS: &str = r#"
    SELECT e.Event_ID, e.Event_Group_ID, g.Hydrologic_Year, e.Start_Date,
           e.Site_ID, s.Site_Name, e.Site_IDLab_QCExtra, e.Visit_Type,
           d.LabSiteID, d.Type
    FROM tbl_LabDuplicates d
    INNER JOIN tbl_Event e ON e.Event_ID = d.Event_ID
    INNER JOIN tbl_Event_Group g ON g.Event_Group_ID = e.Event_Group_ID
    LEFT JOIN tbl_Site s ON s.Site_ID = e.Site_ID
    WHERE g.Hydrologic_Year = ? AND d.Type = ?
    ORDER BY e.Start_Date, d.LabSiteID, e.Visit_Type, e.Event_ID
"#;

/// Reads reference events from the periphyton database
pub struct SqliteReferenceSource {
    pool: SqlitePool,
}

impl SqliteReferenceSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn event_from_row(row: &SqliteRow) -> Result<ReferenceEvent> {
    let year: i64 = row.try_get("Hydrologic_Year")?;
    Ok(ReferenceEvent {
        event_id: row.try_get("Event_ID")?,
        event_group_id: row.try_get("Event_Group_ID")?,
        hydrologic_year: i32::try_from(year).context("Hydrologic_Year out of range")?,
        start_date: row.try_get("Start_Date")?,
        site_id: row.try_get("Site_ID")?,
        site_name: row.try_get("Site_Name")?,
        qc_extra_site_id: row.try_get("Site_IDLab_QCExtra")?,
        visit_type: row.try_get("Visit_Type")?,
    })
}

#[async_trait]
impl ReferenceSource for SqliteReferenceSource {
    async fn events(&self, year: i32, visit_type: VisitType) -> Result<Vec<ReferenceEvent>> {
        let rows = sqlx::query(EVENTS_BY_VISIT_TYPE)
            .bind(year)
            .bind(visit_type.db_value())
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to query {} events for {}", visit_type, year))?;

        rows.iter().map(event_from_row).collect()
    }

    async fn lab_duplicates(&self, year: i32, duplicate_type: &str) -> Result<Vec<LabDuplicateEvent>> {
        let rows = sqlx::query(LAB_DUPLICATE_EVENTS)
            .bind(year)
            .bind(duplicate_type)
            .fetch_all(&self.pool)
            .await
            .with_context(|| {
                format!("Failed to query '{}' lab duplicates for {}", duplicate_type, year)
            })?;

        rows.iter()
            .map(|row| -> Result<LabDuplicateEvent> {
                Ok(LabDuplicateEvent {
                    event: event_from_row(row)?,
                    lab_site_id: row.try_get("LabSiteID")?,
                    duplicate_type: row.try_get("Type")?,
                })
            })
            .collect()
    }
}
