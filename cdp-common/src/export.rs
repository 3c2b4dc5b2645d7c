//! CSV export writers
//!
//! Moengage campaign file plus the duplicate / unique / error reports.
//! Each writer takes any `io::Write` sink so the same code backs the HTTP
//! download endpoints and the batch file exports.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::db::ingestion_logs;
use crate::{Error, Result};

/// Which export to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Moengage,
    Duplicates,
    Unique,
}

impl ExportKind {
    fn file_stem(&self) -> &'static str {
        match self {
            ExportKind::Moengage => "moengage_offers",
            ExportKind::Duplicates => "duplicate_report",
            ExportKind::Unique => "unique_report",
        }
    }
}

/// Write the Moengage campaign export: active offers joined to customers,
/// excluding DND customers, lapsed validity windows, and rows without a
/// mobile number (Moengage keys on mobile)
pub async fn write_moengage_csv<W: Write>(pool: &SqlitePool, out: W) -> Result<usize> {
    let rows = sqlx::query(
        r#"
        SELECT c.mobile, c.segment, o.product_type, o.offer_type,
               o.valid_from, o.valid_to, o.lan
        FROM offers o
        JOIN customers c ON c.guid = o.customer_id
        WHERE o.status = 'Active'
          AND c.dnd = 0
          AND c.mobile IS NOT NULL
          AND o.valid_to >= date('now')
        ORDER BY c.mobile
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "mobile",
        "segment",
        "product_type",
        "offer_type",
        "valid_from",
        "valid_to",
        "lan",
    ])?;

    for row in &rows {
        writer.write_record([
            row.get::<String, _>("mobile"),
            row.get::<Option<String>, _>("segment").unwrap_or_default(),
            row.get::<String, _>("product_type"),
            row.get::<String, _>("offer_type"),
            row.get::<String, _>("valid_from"),
            row.get::<String, _>("valid_to"),
            row.get::<Option<String>, _>("lan").unwrap_or_default(),
        ])?;
    }
    writer.flush()?;

    Ok(rows.len())
}

/// Write the duplicate report: offers recorded as Duplicate, with the
/// matched customer identifiers and the kept offer id
pub async fn write_duplicate_report<W: Write>(
    pool: &SqlitePool,
    out: W,
    since: Option<DateTime<Utc>>,
) -> Result<usize> {
    let since = since.unwrap_or(DateTime::UNIX_EPOCH).to_rfc3339();

    let rows = sqlx::query(
        r#"
        SELECT o.guid, o.customer_id, c.mobile, c.pan, o.product_type,
               o.attributes, o.created_at
        FROM offers o
        JOIN customers c ON c.guid = o.customer_id
        WHERE o.status = 'Duplicate' AND o.created_at >= ?
        ORDER BY o.created_at
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "offer_id",
        "customer_id",
        "mobile",
        "pan",
        "product_type",
        "kept_offer_id",
        "created_at",
    ])?;

    for row in &rows {
        // duplicate_of is stamped into the offer attributes at decision time
        let attributes: String = row.get("attributes");
        let kept = serde_json::from_str::<serde_json::Value>(&attributes)
            .ok()
            .and_then(|v| v.get("duplicate_of").and_then(|k| k.as_str()).map(str::to_string))
            .unwrap_or_default();

        writer.write_record([
            row.get::<String, _>("guid"),
            row.get::<String, _>("customer_id"),
            row.get::<Option<String>, _>("mobile").unwrap_or_default(),
            row.get::<Option<String>, _>("pan").unwrap_or_default(),
            row.get::<String, _>("product_type"),
            kept,
            row.get::<String, _>("created_at"),
        ])?;
    }
    writer.flush()?;

    Ok(rows.len())
}

/// Write the unique (net-new customer) report for a creation-time range
pub async fn write_unique_report<W: Write>(
    pool: &SqlitePool,
    out: W,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<usize> {
    let from = from.unwrap_or(DateTime::UNIX_EPOCH).to_rfc3339();
    let to = to.unwrap_or_else(Utc::now).to_rfc3339();

    let rows = sqlx::query(
        r#"
        SELECT guid, mobile, pan, ucid, segment, created_at
        FROM customers
        WHERE created_at >= ? AND created_at < ?
        ORDER BY created_at
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["customer_id", "mobile", "pan", "ucid", "segment", "created_at"])?;

    for row in &rows {
        writer.write_record([
            row.get::<String, _>("guid"),
            row.get::<Option<String>, _>("mobile").unwrap_or_default(),
            row.get::<Option<String>, _>("pan").unwrap_or_default(),
            row.get::<Option<String>, _>("ucid").unwrap_or_default(),
            row.get::<Option<String>, _>("segment").unwrap_or_default(),
            row.get::<String, _>("created_at"),
        ])?;
    }
    writer.flush()?;

    Ok(rows.len())
}

/// Write the error report for one ingestion log: one CSV row per captured
/// row-level error
pub async fn write_error_report<W: Write>(pool: &SqlitePool, out: W, log_id: i64) -> Result<usize> {
    let log = ingestion_logs::get_log(pool, log_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Ingestion log {}", log_id)))?;

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["row", "message"])?;

    for error in &log.errors {
        writer.write_record([error.row.to_string(), error.message.clone()])?;
    }
    writer.flush()?;

    Ok(log.errors.len())
}

/// Write one export to a timestamped file in `out_dir`, returning the path
/// and row count (the batch CLI entry point)
pub async fn export_to_file(
    pool: &SqlitePool,
    kind: ExportKind,
    out_dir: &Path,
) -> Result<(PathBuf, usize)> {
    std::fs::create_dir_all(out_dir)?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let path = out_dir.join(format!("{}_{}.csv", kind.file_stem(), stamp));
    let file = std::fs::File::create(&path)?;

    let count = match kind {
        ExportKind::Moengage => write_moengage_csv(pool, file).await?,
        ExportKind::Duplicates => write_duplicate_report(pool, file, None).await?,
        ExportKind::Unique => write_unique_report(pool, file, None, None).await?,
    };

    info!("Exported {} rows to {}", count, path.display());
    Ok((path, count))
}
