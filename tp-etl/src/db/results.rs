//! Inserts into `tbl_Lab_Data_TotalPhosphorus`

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::append::{ResultRow, ResultWriter};

pub struct SqliteResultWriter {
    pool: SqlitePool,
}

impl SqliteResultWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultWriter for SqliteResultWriter {
    async fn insert(&self, row: &ResultRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tbl_Lab_Data_TotalPhosphorus (
                TotalPhosphorus_Data_ID, Event_ID, TP_Lab_Name, TP_Lab_SOP, TP_Lab_ID,
                TP_Lab_MDL, Bottle_Weight_g, Plant_Weight_g, Sample_Wet_Weight_g,
                Total_Phosphorus, DuplicateRecord, Notes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.id.to_string())
        .bind(&row.event_id)
        .bind(&row.lab.name)
        .bind(&row.lab.sop)
        .bind(&row.lab.lab_id)
        .bind(&row.lab.mdl)
        .bind(row.bottle_weight_g)
        .bind(row.plant_weight_g)
        .bind(row.sample_wet_weight_g)
        .bind(&row.total_phosphorus)
        .bind(row.duplicate)
        .bind(&row.notes)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert result for Event_ID: {}", row.event_id))?;

        Ok(())
    }
}
