//! Offer database operations

use chrono::{NaiveDate, Utc};
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{parse_date, parse_ts, parse_uuid};
use crate::db::models::Offer;
use crate::types::{OfferStatus, OfferType, ProductType};
use crate::{Error, Result};

const COLUMNS: &str = "guid, customer_id, offer_type, status, product_type, \
                       valid_from, valid_to, journey_started, lan, attributes, \
                       created_at, updated_at";

fn map_offer(row: &SqliteRow) -> Result<Offer> {
    let guid: String = row.get("guid");
    let customer_id: String = row.get("customer_id");
    let offer_type: String = row.get("offer_type");
    let status: String = row.get("status");
    let product_type: String = row.get("product_type");
    let valid_from: String = row.get("valid_from");
    let valid_to: String = row.get("valid_to");
    let attributes: String = row.get("attributes");
    let attributes = serde_json::from_str(&attributes)
        .map_err(|e| Error::Internal(format!("Invalid offer attributes JSON: {}", e)))?;
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Offer {
        guid: parse_uuid(&guid)?,
        customer_id: parse_uuid(&customer_id)?,
        offer_type: offer_type
            .parse::<OfferType>()
            .map_err(|e| Error::Internal(format!("Corrupt offer_type column: {}", e)))?,
        status: status
            .parse::<OfferStatus>()
            .map_err(|e| Error::Internal(format!("Corrupt status column: {}", e)))?,
        product_type: product_type
            .parse::<ProductType>()
            .map_err(|e| Error::Internal(format!("Corrupt product_type column: {}", e)))?,
        valid_from: parse_date(&valid_from)?,
        valid_to: parse_date(&valid_to)?,
        journey_started: row.get::<i64, _>("journey_started") != 0,
        lan: row.get("lan"),
        attributes,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

/// Insert a new offer row
pub async fn insert_offer<'e, E>(db: E, offer: &Offer) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let attributes = serde_json::to_string(&offer.attributes)
        .map_err(|e| Error::Internal(format!("Failed to serialize attributes: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO offers (
            guid, customer_id, offer_type, status, product_type,
            valid_from, valid_to, journey_started, lan, attributes,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(offer.guid.to_string())
    .bind(offer.customer_id.to_string())
    .bind(offer.offer_type.as_str())
    .bind(offer.status.as_str())
    .bind(offer.product_type.as_str())
    .bind(offer.valid_from.format("%Y-%m-%d").to_string())
    .bind(offer.valid_to.format("%Y-%m-%d").to_string())
    .bind(offer.journey_started as i64)
    .bind(&offer.lan)
    .bind(attributes)
    .bind(offer.created_at.to_rfc3339())
    .bind(offer.updated_at.to_rfc3339())
    .execute(db)
    .await?;

    Ok(())
}

/// Load an offer by primary key
pub async fn get_offer(pool: &SqlitePool, guid: Uuid) -> Result<Option<Offer>> {
    let sql = format!("SELECT {} FROM offers WHERE guid = ?", COLUMNS);
    let row = sqlx::query(&sql)
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(map_offer).transpose()
}

/// All offers for a customer, newest first
pub async fn offers_for_customer(pool: &SqlitePool, customer_id: Uuid) -> Result<Vec<Offer>> {
    let sql = format!(
        "SELECT {} FROM offers WHERE customer_id = ? ORDER BY created_at DESC",
        COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(customer_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(map_offer).collect()
}

/// Active offers for a customer, oldest first
///
/// Oldest-first matters: the precedence resolver keeps the first-in offer
/// on priority ties.
pub async fn active_offers_for_customer(
    pool: &SqlitePool,
    customer_id: Uuid,
) -> Result<Vec<Offer>> {
    let sql = format!(
        "SELECT {} FROM offers WHERE customer_id = ? AND status = 'Active' ORDER BY created_at",
        COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(customer_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(map_offer).collect()
}

/// Flip an offer's status
pub async fn update_status<'e, E>(db: E, offer_id: Uuid, new_status: OfferStatus) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE offers SET status = ?, updated_at = ? WHERE guid = ?")
        .bind(new_status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(offer_id.to_string())
        .execute(db)
        .await?;

    Ok(())
}

/// Mark an offer's journey as started (idempotent)
///
/// Returns false when the offer does not exist.
pub async fn set_journey_started<'e, E>(db: E, offer_id: Uuid) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE offers SET journey_started = 1, updated_at = ? WHERE guid = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(offer_id.to_string())
        .execute(db)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Refresh an offer in place (Enrich): new validity window and attributes
pub async fn refresh_offer<'e, E>(
    db: E,
    offer_id: Uuid,
    valid_from: NaiveDate,
    valid_to: NaiveDate,
    attributes: &serde_json::Value,
) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let attributes = serde_json::to_string(attributes)
        .map_err(|e| Error::Internal(format!("Failed to serialize attributes: {}", e)))?;

    sqlx::query(
        "UPDATE offers SET valid_from = ?, valid_to = ?, attributes = ?, updated_at = ? WHERE guid = ?",
    )
    .bind(valid_from.format("%Y-%m-%d").to_string())
    .bind(valid_to.format("%Y-%m-%d").to_string())
    .bind(attributes)
    .bind(Utc::now().to_rfc3339())
    .bind(offer_id.to_string())
    .execute(db)
    .await?;

    Ok(())
}
