//! Integration tests for database initialization
//!
//! Covers automatic database creation, idempotent re-initialization,
//! default settings, and the identifier uniqueness indexes.

use tempfile::TempDir;

use cdp_common::db::init_database;

async fn setup() -> (TempDir, sqlx::SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("cdp.db");
    let pool = init_database(&db_path).await.unwrap();
    (temp_dir, pool)
}

#[tokio::test]
async fn database_is_created_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("cdp.db");
    assert!(!db_path.exists());

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn reinitialization_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("cdp.db");

    let pool1 = init_database(&db_path).await.unwrap();
    drop(pool1);

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to reopen existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn expected_tables_exist() {
    let (_temp_dir, pool) = setup().await;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for expected in [
        "campaign_events",
        "customers",
        "ingestion_logs",
        "offer_history",
        "offers",
        "settings",
    ] {
        assert!(
            tables.iter().any(|t| t == expected),
            "Missing table '{}', have {:?}",
            expected,
            tables
        );
    }
}

#[tokio::test]
async fn retention_defaults_are_seeded() {
    let (_temp_dir, pool) = setup().await;

    for (key, expected) in [
        ("retention_offer_days", "90"),
        ("retention_event_days", "90"),
        ("retention_log_days", "180"),
    ] {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
                .bind(key)
                .fetch_optional(&pool)
                .await
                .unwrap();

        assert_eq!(value.as_deref(), Some(expected), "wrong default for {}", key);
    }
}

#[tokio::test]
async fn null_setting_is_reset_to_default() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("cdp.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("UPDATE settings SET value = NULL WHERE key = 'retention_offer_days'")
        .execute(&pool)
        .await
        .unwrap();
    drop(pool);

    let pool = init_database(&db_path).await.unwrap();
    let value: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'retention_offer_days'")
            .fetch_optional(&pool)
            .await
            .unwrap();
    assert_eq!(value.as_deref(), Some("90"));
}

#[tokio::test]
async fn identifier_uniqueness_is_enforced_per_column() {
    let (_temp_dir, pool) = setup().await;

    sqlx::query(
        "INSERT INTO customers (guid, mobile, attributes, created_at, updated_at)
         VALUES ('a', '9000000001', '{}', '2026-01-01T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
    )
    .execute(&pool)
    .await
    .unwrap();

    // Same mobile again violates the partial unique index
    let duplicate = sqlx::query(
        "INSERT INTO customers (guid, mobile, attributes, created_at, updated_at)
         VALUES ('b', '9000000001', '{}', '2026-01-01T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
    )
    .execute(&pool)
    .await;
    assert!(duplicate.is_err());

    // NULL mobiles do not collide with each other
    for guid in ["c", "d"] {
        sqlx::query(
            "INSERT INTO customers (guid, attributes, created_at, updated_at)
             VALUES (?, '{}', '2026-01-01T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
        )
        .bind(guid)
        .execute(&pool)
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn offer_status_check_constraint_holds() {
    let (_temp_dir, pool) = setup().await;

    sqlx::query(
        "INSERT INTO customers (guid, mobile, attributes, created_at, updated_at)
         VALUES ('a', '9000000001', '{}', '2026-01-01T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let bad_status = sqlx::query(
        "INSERT INTO offers (guid, customer_id, offer_type, status, product_type,
                             valid_from, valid_to, created_at, updated_at)
         VALUES ('o1', 'a', 'Fresh', 'Cancelled', 'Insta',
                 '2026-01-01', '2026-03-31', '2026-01-01T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
    )
    .execute(&pool)
    .await;
    assert!(bad_status.is_err(), "CHECK constraint should reject unknown status");
}
