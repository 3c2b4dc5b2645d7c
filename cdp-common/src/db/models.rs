//! Database entity models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::precedence::ActiveOffer;
use crate::types::{IdentifierKind, OfferStatus, OfferType, ProductType};

/// A customer row
///
/// Identifiers are each optional; uniqueness is enforced per-column by
/// partial unique indexes. Free-form attributes live in a JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub guid: Uuid,
    pub mobile: Option<String>,
    pub pan: Option<String>,
    pub aadhaar: Option<String>,
    pub ucid: Option<String>,
    pub prev_lan: Option<String>,
    pub attributes: serde_json::Value,
    pub segment: Option<String>,
    pub dnd: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// The stored value for one identifier column
    pub fn identifier(&self, kind: IdentifierKind) -> Option<&str> {
        match kind {
            IdentifierKind::Mobile => self.mobile.as_deref(),
            IdentifierKind::Pan => self.pan.as_deref(),
            IdentifierKind::Aadhaar => self.aadhaar.as_deref(),
            IdentifierKind::Ucid => self.ucid.as_deref(),
            IdentifierKind::PrevLan => self.prev_lan.as_deref(),
        }
    }
}

/// An offer row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub guid: Uuid,
    pub customer_id: Uuid,
    pub offer_type: OfferType,
    pub status: OfferStatus,
    pub product_type: ProductType,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub journey_started: bool,
    pub lan: Option<String>,
    pub attributes: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    /// The facts the precedence resolver needs about this offer
    pub fn facts(&self) -> ActiveOffer {
        ActiveOffer {
            offer_id: self.guid,
            product_type: self.product_type,
            journey_started: self.journey_started,
        }
    }
}

/// An append-only offer status transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferHistoryEntry {
    pub id: i64,
    pub offer_id: Uuid,
    pub old_status: Option<OfferStatus>,
    pub new_status: OfferStatus,
    pub reason: String,
    pub snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A generic campaign/journey event log row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignEvent {
    pub id: i64,
    pub customer_id: Option<Uuid>,
    pub offer_id: Option<Uuid>,
    pub source: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// One row per batch/file upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionLog {
    pub id: i64,
    pub source: String,
    pub file_name: Option<String>,
    pub total_rows: i64,
    pub success_count: i64,
    pub error_count: i64,
    pub duplicate_count: i64,
    pub errors: Vec<RowError>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// A row-level error captured during batch ingestion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowError {
    /// 1-indexed data row number (header row not counted)
    pub row: usize,
    pub message: String,
}
