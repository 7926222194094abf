//! Key-value accessors for the `local_storage` table

use crate::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Key holding anonymous reports
pub const REPORTS_KEY: &str = "anon_reports";
/// Key holding anonymous portfolios
pub const PORTFOLIOS_KEY: &str = "anon_portfolios";

/// Read the raw value stored under `key`
pub async fn get_item(db: &Pool<Sqlite>, key: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM local_storage WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    Ok(row.map(|(value,)| value))
}

/// Replace the value stored under `key`
pub async fn set_item(db: &Pool<Sqlite>, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO local_storage (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value)
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

/// Remove `key`; removing an absent key is not an error
pub async fn remove_item(db: &Pool<Sqlite>, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM local_storage WHERE key = ?")
        .bind(key)
        .execute(db)
        .await
        .map_err(Error::Database)?;

    Ok(())
}
