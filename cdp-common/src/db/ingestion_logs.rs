//! Ingestion log database operations

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::parse_ts;
use crate::db::models::{IngestionLog, RowError};
use crate::{Error, Result};

/// Insert a batch log row, returning its id
pub async fn insert_log(pool: &SqlitePool, log: &IngestionLog) -> Result<i64> {
    let errors = serde_json::to_string(&log.errors)
        .map_err(|e| Error::Internal(format!("Failed to serialize errors: {}", e)))?;

    let result = sqlx::query(
        r#"
        INSERT INTO ingestion_logs (
            source, file_name, total_rows, success_count, error_count,
            duplicate_count, errors, started_at, ended_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&log.source)
    .bind(&log.file_name)
    .bind(log.total_rows)
    .bind(log.success_count)
    .bind(log.error_count)
    .bind(log.duplicate_count)
    .bind(errors)
    .bind(log.started_at.to_rfc3339())
    .bind(log.ended_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

fn map_log(row: &SqliteRow) -> Result<IngestionLog> {
    let errors: String = row.get("errors");
    let errors: Vec<RowError> = serde_json::from_str(&errors)
        .map_err(|e| Error::Internal(format!("Invalid error detail JSON: {}", e)))?;
    let started_at: String = row.get("started_at");
    let ended_at: String = row.get("ended_at");

    Ok(IngestionLog {
        id: row.get("id"),
        source: row.get("source"),
        file_name: row.get("file_name"),
        total_rows: row.get("total_rows"),
        success_count: row.get("success_count"),
        error_count: row.get("error_count"),
        duplicate_count: row.get("duplicate_count"),
        errors,
        started_at: parse_ts(&started_at)?,
        ended_at: parse_ts(&ended_at)?,
    })
}

/// Load one batch log by id
pub async fn get_log(pool: &SqlitePool, id: i64) -> Result<Option<IngestionLog>> {
    let row = sqlx::query(
        r#"
        SELECT id, source, file_name, total_rows, success_count, error_count,
               duplicate_count, errors, started_at, ended_at
        FROM ingestion_logs
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_log).transpose()
}
