//! Database initialization
//!
//! Creates the database on first run, applies PRAGMAs, and brings the schema
//! up idempotently with `CREATE TABLE IF NOT EXISTS`. Safe to call on every
//! service start.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    // Bounded wait on lock contention between the API service and batch runs
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Schema creation (idempotent - safe to call multiple times)
    create_settings_table(&pool).await?;
    create_customers_table(&pool).await?;
    create_offers_table(&pool).await?;
    create_offer_history_table(&pool).await?;
    create_campaign_events_table(&pool).await?;
    create_ingestion_logs_table(&pool).await?;

    // Default settings
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the customers table
///
/// Each identifier column is individually unique when present. There is no
/// canonical cross-identifier merge; deduplication handles conflicts at
/// ingestion time.
pub async fn create_customers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            guid TEXT PRIMARY KEY,
            mobile TEXT,
            pan TEXT,
            aadhaar TEXT,
            ucid TEXT,
            prev_lan TEXT,
            attributes TEXT NOT NULL DEFAULT '{}',
            segment TEXT,
            dnd INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (dnd IN (0, 1))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Partial unique indexes: identifiers are unique when non-NULL
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_customers_mobile ON customers(mobile) WHERE mobile IS NOT NULL",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_customers_pan ON customers(pan) WHERE pan IS NOT NULL",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_customers_aadhaar ON customers(aadhaar) WHERE aadhaar IS NOT NULL",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_customers_ucid ON customers(ucid) WHERE ucid IS NOT NULL",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_customers_prev_lan ON customers(prev_lan) WHERE prev_lan IS NOT NULL",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the offers table
///
/// Enum-like columns carry CHECK constraints matching the Rust enums in
/// `types` - keep the string lists in sync.
pub async fn create_offers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS offers (
            guid TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL REFERENCES customers(guid) ON DELETE CASCADE,
            offer_type TEXT NOT NULL CHECK (offer_type IN ('Fresh', 'Enrich', 'New-old', 'New-new')),
            status TEXT NOT NULL CHECK (status IN ('Active', 'Inactive', 'Expired', 'Duplicate')),
            product_type TEXT NOT NULL CHECK (product_type IN ('Employee Loan', 'TW Loyalty', 'Top-up', 'Preapproved', 'Prospect', 'Insta', 'E-aggregator')),
            valid_from TEXT NOT NULL,
            valid_to TEXT NOT NULL,
            journey_started INTEGER NOT NULL DEFAULT 0,
            lan TEXT,
            attributes TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (journey_started IN (0, 1)),
            CHECK (valid_to >= valid_from)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_offers_customer ON offers(customer_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_offers_status ON offers(status)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_offers_customer_status ON offers(customer_id, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the offer_history table
///
/// Append-only audit of status transitions with a JSON snapshot of the
/// offer at transition time.
pub async fn create_offer_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS offer_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            offer_id TEXT NOT NULL REFERENCES offers(guid) ON DELETE CASCADE,
            old_status TEXT,
            new_status TEXT NOT NULL,
            reason TEXT NOT NULL,
            snapshot TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_offer_history_offer ON offer_history(offer_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the campaign_events table
pub async fn create_campaign_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS campaign_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id TEXT,
            offer_id TEXT,
            source TEXT NOT NULL,
            event_type TEXT NOT NULL,
            payload TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_campaign_events_customer ON campaign_events(customer_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_campaign_events_created ON campaign_events(created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the ingestion_logs table
pub async fn create_ingestion_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingestion_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            file_name TEXT,
            total_rows INTEGER NOT NULL,
            success_count INTEGER NOT NULL,
            error_count INTEGER NOT NULL,
            duplicate_count INTEGER NOT NULL,
            errors TEXT NOT NULL DEFAULT '[]',
            started_at TEXT NOT NULL,
            ended_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_ingestion_logs_started ON ingestion_logs(started_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures all required settings exist with default values and resets
/// NULL values back to defaults.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Retention windows (days)
    ensure_setting(pool, "retention_offer_days", "90").await?;
    ensure_setting(pool, "retention_event_days", "90").await?;
    ensure_setting(pool, "retention_log_days", "180").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if !exists {
        // INSERT OR IGNORE handles concurrent initialization races
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(default_value)
            .execute(pool)
            .await?;
        return Ok(());
    }

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;
    }

    Ok(())
}
