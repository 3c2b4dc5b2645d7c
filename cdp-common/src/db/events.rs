//! Campaign event database operations

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{parse_ts, parse_uuid};
use crate::db::models::CampaignEvent;
use crate::{Error, Result};

/// Record a campaign/journey event
pub async fn insert_event<'e, E>(
    db: E,
    customer_id: Option<Uuid>,
    offer_id: Option<Uuid>,
    source: &str,
    event_type: &str,
    payload: &serde_json::Value,
) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let payload = serde_json::to_string(payload)
        .map_err(|e| Error::Internal(format!("Failed to serialize payload: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO campaign_events (customer_id, offer_id, source, event_type, payload, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(customer_id.map(|id| id.to_string()))
    .bind(offer_id.map(|id| id.to_string()))
    .bind(source)
    .bind(event_type)
    .bind(payload)
    .bind(Utc::now().to_rfc3339())
    .execute(db)
    .await?;

    Ok(())
}

fn map_event(row: &SqliteRow) -> Result<CampaignEvent> {
    let customer_id: Option<String> = row.get("customer_id");
    let offer_id: Option<String> = row.get("offer_id");
    let payload: String = row.get("payload");
    let payload = serde_json::from_str(&payload)
        .map_err(|e| Error::Internal(format!("Invalid event payload JSON: {}", e)))?;
    let created_at: String = row.get("created_at");

    Ok(CampaignEvent {
        id: row.get("id"),
        customer_id: customer_id.as_deref().map(parse_uuid).transpose()?,
        offer_id: offer_id.as_deref().map(parse_uuid).transpose()?,
        source: row.get("source"),
        event_type: row.get("event_type"),
        payload,
        created_at: parse_ts(&created_at)?,
    })
}

/// Events for one customer, newest first
pub async fn events_for_customer(
    pool: &SqlitePool,
    customer_id: Uuid,
) -> Result<Vec<CampaignEvent>> {
    let rows = sqlx::query(
        r#"
        SELECT id, customer_id, offer_id, source, event_type, payload, created_at
        FROM campaign_events
        WHERE customer_id = ?
        ORDER BY id DESC
        "#,
    )
    .bind(customer_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_event).collect()
}
