//! Database layer: pool initialization, schema, and per-entity queries

pub mod customers;
pub mod events;
pub mod history;
pub mod ingestion_logs;
pub mod init;
pub mod models;
pub mod offers;

pub use init::init_database;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{Error, Result};

/// Parse a UUID column stored as TEXT
pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
}

/// Parse an RFC 3339 timestamp column stored as TEXT
pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))
}

/// Parse a `YYYY-MM-DD` date column stored as TEXT
pub(crate) fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::Internal(format!("Invalid date in database: {}", e)))
}
