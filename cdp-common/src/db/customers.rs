//! Customer database operations

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{parse_ts, parse_uuid};
use crate::db::models::Customer;
use crate::types::IdentifierKind;
use crate::{Error, Result};

const COLUMNS: &str =
    "guid, mobile, pan, aadhaar, ucid, prev_lan, attributes, segment, dnd, created_at, updated_at";

fn map_customer(row: &SqliteRow) -> Result<Customer> {
    let guid: String = row.get("guid");
    let attributes: String = row.get("attributes");
    let attributes = serde_json::from_str(&attributes)
        .map_err(|e| Error::Internal(format!("Invalid customer attributes JSON: {}", e)))?;
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Customer {
        guid: parse_uuid(&guid)?,
        mobile: row.get("mobile"),
        pan: row.get("pan"),
        aadhaar: row.get("aadhaar"),
        ucid: row.get("ucid"),
        prev_lan: row.get("prev_lan"),
        attributes,
        segment: row.get("segment"),
        dnd: row.get::<i64, _>("dnd") != 0,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

/// Insert a new customer row
pub async fn insert_customer<'e, E>(db: E, customer: &Customer) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let attributes = serde_json::to_string(&customer.attributes)
        .map_err(|e| Error::Internal(format!("Failed to serialize attributes: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO customers (
            guid, mobile, pan, aadhaar, ucid, prev_lan,
            attributes, segment, dnd, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(customer.guid.to_string())
    .bind(&customer.mobile)
    .bind(&customer.pan)
    .bind(&customer.aadhaar)
    .bind(&customer.ucid)
    .bind(&customer.prev_lan)
    .bind(attributes)
    .bind(&customer.segment)
    .bind(customer.dnd as i64)
    .bind(customer.created_at.to_rfc3339())
    .bind(customer.updated_at.to_rfc3339())
    .execute(db)
    .await?;

    Ok(())
}

/// Update an existing customer row (all mutable columns)
pub async fn update_customer<'e, E>(db: E, customer: &Customer) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let attributes = serde_json::to_string(&customer.attributes)
        .map_err(|e| Error::Internal(format!("Failed to serialize attributes: {}", e)))?;

    sqlx::query(
        r#"
        UPDATE customers SET
            mobile = ?, pan = ?, aadhaar = ?, ucid = ?, prev_lan = ?,
            attributes = ?, segment = ?, dnd = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&customer.mobile)
    .bind(&customer.pan)
    .bind(&customer.aadhaar)
    .bind(&customer.ucid)
    .bind(&customer.prev_lan)
    .bind(attributes)
    .bind(&customer.segment)
    .bind(customer.dnd as i64)
    .bind(customer.updated_at.to_rfc3339())
    .bind(customer.guid.to_string())
    .execute(db)
    .await?;

    Ok(())
}

/// Load a customer by primary key
pub async fn get_customer(pool: &SqlitePool, guid: Uuid) -> Result<Option<Customer>> {
    let sql = format!("SELECT {} FROM customers WHERE guid = ?", COLUMNS);
    let row = sqlx::query(&sql)
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(map_customer).transpose()
}

/// Find a customer by one identifier column
///
/// The column name comes from `IdentifierKind::column`, a fixed set of
/// static strings, never from user input.
pub async fn find_by_identifier(
    pool: &SqlitePool,
    kind: IdentifierKind,
    value: &str,
) -> Result<Option<Customer>> {
    let sql = format!(
        "SELECT {} FROM customers WHERE {} = ?",
        COLUMNS,
        kind.column()
    );
    let row = sqlx::query(&sql).bind(value).fetch_optional(pool).await?;

    row.as_ref().map(map_customer).transpose()
}

/// Customers created inside a time range (the "unique"/net-new report)
pub async fn customers_created_between(
    pool: &SqlitePool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Customer>> {
    let sql = format!(
        "SELECT {} FROM customers WHERE created_at >= ? AND created_at < ? ORDER BY created_at",
        COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(from.to_rfc3339())
        .bind(to.to_rfc3339())
        .fetch_all(pool)
        .await?;

    rows.iter().map(map_customer).collect()
}
