//! Retention purge
//!
//! Deletes terminal-status offers, old campaign events, and old ingestion
//! logs past their configured age. Windows come from the settings table
//! unless overridden per run. Idempotent; safe on any schedule.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::config::setting_i64;
use crate::Result;

/// Per-run overrides for the retention windows (days)
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionOverrides {
    pub offer_days: Option<i64>,
    pub event_days: Option<i64>,
    pub log_days: Option<i64>,
}

/// Deletion counts from one retention pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionSummary {
    pub offers_deleted: u64,
    pub events_deleted: u64,
    pub logs_deleted: u64,
}

/// Run one retention pass
///
/// Offer history rows follow their offers out via FK cascade. Only
/// terminal-status offers (Expired/Duplicate) are eligible; Active and
/// Inactive offers are never aged out.
pub async fn run_retention(
    pool: &SqlitePool,
    overrides: RetentionOverrides,
) -> Result<RetentionSummary> {
    let offer_days = match overrides.offer_days {
        Some(days) => days,
        None => setting_i64(pool, "retention_offer_days", 90).await?,
    };
    let event_days = match overrides.event_days {
        Some(days) => days,
        None => setting_i64(pool, "retention_event_days", 90).await?,
    };
    let log_days = match overrides.log_days {
        Some(days) => days,
        None => setting_i64(pool, "retention_log_days", 180).await?,
    };

    let now = Utc::now();
    let offer_cutoff = (now - Duration::days(offer_days)).to_rfc3339();
    let event_cutoff = (now - Duration::days(event_days)).to_rfc3339();
    let log_cutoff = (now - Duration::days(log_days)).to_rfc3339();

    let offers_deleted = sqlx::query(
        "DELETE FROM offers WHERE status IN ('Expired', 'Duplicate') AND updated_at < ?",
    )
    .bind(&offer_cutoff)
    .execute(pool)
    .await?
    .rows_affected();

    let events_deleted = sqlx::query("DELETE FROM campaign_events WHERE created_at < ?")
        .bind(&event_cutoff)
        .execute(pool)
        .await?
        .rows_affected();

    let logs_deleted = sqlx::query("DELETE FROM ingestion_logs WHERE ended_at < ?")
        .bind(&log_cutoff)
        .execute(pool)
        .await?
        .rows_affected();

    info!(
        "Retention pass: {} offers, {} events, {} logs deleted (windows {}/{}/{} days)",
        offers_deleted, events_deleted, logs_deleted, offer_days, event_days, log_days
    );

    Ok(RetentionSummary {
        offers_deleted,
        events_deleted,
        logs_deleted,
    })
}
