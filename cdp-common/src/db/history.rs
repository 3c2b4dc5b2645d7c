//! Offer history database operations
//!
//! The offer_history table is append-only: rows are written on every status
//! transition and never updated.

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{parse_ts, parse_uuid};
use crate::db::models::OfferHistoryEntry;
use crate::types::OfferStatus;
use crate::{Error, Result};

/// Append a status transition record
pub async fn append_history<'e, E>(
    db: E,
    offer_id: Uuid,
    old_status: Option<OfferStatus>,
    new_status: OfferStatus,
    reason: &str,
    snapshot: &serde_json::Value,
) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let snapshot = serde_json::to_string(snapshot)
        .map_err(|e| Error::Internal(format!("Failed to serialize snapshot: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO offer_history (offer_id, old_status, new_status, reason, snapshot, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(offer_id.to_string())
    .bind(old_status.map(|s| s.as_str()))
    .bind(new_status.as_str())
    .bind(reason)
    .bind(snapshot)
    .bind(Utc::now().to_rfc3339())
    .execute(db)
    .await?;

    Ok(())
}

fn map_entry(row: &SqliteRow) -> Result<OfferHistoryEntry> {
    let offer_id: String = row.get("offer_id");
    let old_status: Option<String> = row.get("old_status");
    let new_status: String = row.get("new_status");
    let snapshot: String = row.get("snapshot");
    let snapshot = serde_json::from_str(&snapshot)
        .map_err(|e| Error::Internal(format!("Invalid history snapshot JSON: {}", e)))?;
    let created_at: String = row.get("created_at");

    Ok(OfferHistoryEntry {
        id: row.get("id"),
        offer_id: parse_uuid(&offer_id)?,
        old_status: old_status
            .map(|s| {
                s.parse::<OfferStatus>()
                    .map_err(|e| Error::Internal(format!("Corrupt old_status column: {}", e)))
            })
            .transpose()?,
        new_status: new_status
            .parse::<OfferStatus>()
            .map_err(|e| Error::Internal(format!("Corrupt new_status column: {}", e)))?,
        reason: row.get("reason"),
        snapshot,
        created_at: parse_ts(&created_at)?,
    })
}

/// Transition history for one offer, oldest first
pub async fn history_for_offer(pool: &SqlitePool, offer_id: Uuid) -> Result<Vec<OfferHistoryEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, offer_id, old_status, new_status, reason, snapshot, created_at
        FROM offer_history
        WHERE offer_id = ?
        ORDER BY id
        "#,
    )
    .bind(offer_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_entry).collect()
}
