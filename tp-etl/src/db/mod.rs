//! SQLite access for the periphyton database

mod reference;
mod results;

pub use reference::SqliteReferenceSource;
pub use results::SqliteResultWriter;

use std::path::Path;

use anyhow::{Context, Result, bail};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Open the database. A missing file is an error unless `create_if_missing`.
pub async fn connect(database: &Path, create_if_missing: bool) -> Result<SqlitePool> {
    if !create_if_missing && !database.exists() {
        bail!("Database does not exist: {}", database.display());
    }

    let options = SqliteConnectOptions::new()
        .filename(database)
        .create_if_missing(create_if_missing)
        .foreign_keys(true);

    // Single writer; one connection keeps inserts strictly ordered
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database: {}", database.display()))
}

/// Create the reference and results tables if they are missing
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to apply database migrations")?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Fresh in-memory database with the schema applied
    pub async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate(&pool).await.unwrap();
        pool
    }

    pub async fn insert_site(pool: &SqlitePool, site_id: &str, name: &str) {
        sqlx::query("INSERT INTO tbl_Site (Site_ID, Site_Name) VALUES (?, ?)")
            .bind(site_id)
            .bind(name)
            .execute(pool)
            .await
            .unwrap();
    }

    pub async fn insert_group(pool: &SqlitePool, group_id: &str, year: i32) {
        sqlx::query("INSERT INTO tbl_Event_Group (Event_Group_ID, Hydrologic_Year) VALUES (?, ?)")
            .bind(group_id)
            .bind(year)
            .execute(pool)
            .await
            .unwrap();
    }

    pub async fn insert_event(
        pool: &SqlitePool,
        event_id: &str,
        group_id: &str,
        site_id: &str,
        start_date: &str,
        visit_type: &str,
        qc_extra: Option<&str>,
    ) {
        sqlx::query(
            "INSERT INTO tbl_Event (Event_ID, Event_Group_ID, Site_ID, Start_Date, Visit_Type, Site_IDLab_QCExtra)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(event_id)
        .bind(group_id)
        .bind(site_id)
        .bind(start_date)
        .bind(visit_type)
        .bind(qc_extra)
        .execute(pool)
        .await
        .unwrap();
    }

    pub async fn insert_lab_duplicate(pool: &SqlitePool, event_id: &str, lab_site_id: &str, kind: &str) {
        sqlx::query("INSERT INTO tbl_LabDuplicates (Event_ID, LabSiteID, Type) VALUES (?, ?, ?)")
            .bind(event_id)
            .bind(lab_site_id)
            .bind(kind)
            .execute(pool)
            .await
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_connect_requires_existing_file() {
        let path = std::env::temp_dir().join(format!("tp-etl-{}.db", Uuid::new_v4()));

        assert!(connect(&path, false).await.is_err());

        let pool = connect(&path, true).await.unwrap();
        migrate(&pool).await.unwrap();
        // Re-running is a no-op
        migrate(&pool).await.unwrap();
        pool.close().await;

        assert!(connect(&path, false).await.is_ok());
        std::fs::remove_file(&path).ok();
    }
}
