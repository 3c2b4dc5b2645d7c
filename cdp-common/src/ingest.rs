//! Ingestion pipeline
//!
//! Single-record path: validate -> dedup -> derive offer type -> resolve
//! precedence -> apply decision. Batch path: stream a CSV, run the
//! single-record path per row, capture row-level errors and continue, then
//! write one ingestion_logs row with totals.

use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::models::{IngestionLog, Offer, RowError};
use crate::db::{events as db_events, history, ingestion_logs, offers};
use crate::dedup::{dedup_customer, CustomerInput, DedupOutcome};
use crate::events::{CdpEvent, EventBus};
use crate::precedence::{resolve, Decision, IncomingOffer};
use crate::types::{OfferStatus, OfferType, ProductType};
use crate::{Error, Result};

/// One incoming customer + offer record, source-agnostic
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRecord {
    #[serde(flatten)]
    pub customer: CustomerInput,
    pub product_type: ProductType,
    /// Absent offer type is derived from the dedup outcome:
    /// matched customer -> New-old, created customer -> New-new
    pub offer_type: Option<OfferType>,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub lan: Option<String>,
    #[serde(default)]
    pub offer_attributes: serde_json::Map<String, serde_json::Value>,
}

/// Business outcome for one ingested record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Offer written as Active with no competition
    Created,
    /// Offer written as Active after expiring lower-priority incumbents
    Superseded,
    /// Existing active offer refreshed in place
    Enriched,
    /// Offer written with status Duplicate
    Duplicate,
    /// Nothing written beyond the audit trail
    Rejected,
}

/// What happened to one record
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub customer_id: Uuid,
    /// The written or refreshed offer; None for rejections
    pub offer_id: Option<Uuid>,
    pub matched_existing_customer: bool,
    pub outcome: IngestOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Totals for one batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub log_id: i64,
    pub total: usize,
    pub success: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub errors: Vec<RowError>,
}

/// Ingest one record end to end
pub async fn ingest_record(
    pool: &SqlitePool,
    bus: &EventBus,
    source: &str,
    record: &IngestRecord,
) -> Result<IngestReport> {
    if record.valid_from > record.valid_to {
        return Err(Error::InvalidInput(format!(
            "valid_from {} is after valid_to {}",
            record.valid_from, record.valid_to
        )));
    }

    let dedup = dedup_customer(pool, &record.customer).await?;
    let customer_id = dedup.customer().guid;

    if let DedupOutcome::Matched { conflicts, .. } = &dedup {
        if !conflicts.is_empty() {
            record_identifier_conflict(pool, bus, source, customer_id, conflicts).await?;
        }
    }

    let matched = dedup.is_matched();
    let offer_type = record.offer_type.unwrap_or(if matched {
        OfferType::NewOld
    } else {
        OfferType::NewNew
    });

    let active = offers::active_offers_for_customer(pool, customer_id).await?;
    let facts: Vec<_> = active.iter().map(Offer::facts).collect();
    let decision = resolve(
        &facts,
        &IncomingOffer {
            product_type: record.product_type,
            offer_type,
        },
    );

    apply_decision(
        pool, bus, source, customer_id, matched, offer_type, record, &active, decision,
    )
    .await
}

/// Execute a precedence decision against the database
///
/// All writes for one record happen inside a single transaction.
#[allow(clippy::too_many_arguments)]
async fn apply_decision(
    pool: &SqlitePool,
    bus: &EventBus,
    source: &str,
    customer_id: Uuid,
    matched: bool,
    offer_type: OfferType,
    record: &IngestRecord,
    active: &[Offer],
    decision: Decision,
) -> Result<IngestReport> {
    let now = Utc::now();

    match decision {
        Decision::CreateActive => {
            let offer = new_offer(customer_id, offer_type, record, OfferStatus::Active);
            let snapshot = snapshot_of(&offer)?;

            let mut tx = pool.begin().await?;
            offers::insert_offer(&mut *tx, &offer).await?;
            history::append_history(
                &mut *tx,
                offer.guid,
                None,
                OfferStatus::Active,
                "Created as active",
                &snapshot,
            )
            .await?;
            db_events::insert_event(
                &mut *tx,
                Some(customer_id),
                Some(offer.guid),
                source,
                "offer_created",
                &json!({ "product_type": offer.product_type }),
            )
            .await?;
            tx.commit().await?;

            bus.emit(CdpEvent::OfferCreated {
                customer_id,
                offer_id: offer.guid,
                product_type: offer.product_type,
                timestamp: now,
            });

            Ok(IngestReport {
                customer_id,
                offer_id: Some(offer.guid),
                matched_existing_customer: matched,
                outcome: IngestOutcome::Created,
                detail: None,
            })
        }

        Decision::Enrich { target } => {
            let existing = active
                .iter()
                .find(|o| o.guid == target)
                .ok_or_else(|| Error::Internal("Enrich target missing from active set".into()))?;

            let mut attributes = existing
                .attributes
                .as_object()
                .cloned()
                .unwrap_or_default();
            for (key, value) in &record.offer_attributes {
                attributes.insert(key.clone(), value.clone());
            }
            let attributes = serde_json::Value::Object(attributes);

            let mut tx = pool.begin().await?;
            offers::refresh_offer(&mut *tx, target, record.valid_from, record.valid_to, &attributes)
                .await?;
            db_events::insert_event(
                &mut *tx,
                Some(customer_id),
                Some(target),
                source,
                "enrich_applied",
                &json!({ "valid_from": record.valid_from, "valid_to": record.valid_to }),
            )
            .await?;
            tx.commit().await?;

            bus.emit(CdpEvent::EnrichApplied {
                offer_id: target,
                timestamp: now,
            });

            Ok(IngestReport {
                customer_id,
                offer_id: Some(target),
                matched_existing_customer: matched,
                outcome: IngestOutcome::Enriched,
                detail: None,
            })
        }

        Decision::ExpireAndCreate { expire } => {
            let offer = new_offer(customer_id, offer_type, record, OfferStatus::Active);
            let snapshot = snapshot_of(&offer)?;

            let mut tx = pool.begin().await?;
            for expired_id in &expire {
                let old = active
                    .iter()
                    .find(|o| o.guid == *expired_id)
                    .ok_or_else(|| Error::Internal("Expired offer missing from active set".into()))?;
                let old_snapshot = snapshot_of(old)?;

                offers::update_status(&mut *tx, *expired_id, OfferStatus::Expired).await?;
                history::append_history(
                    &mut *tx,
                    *expired_id,
                    Some(OfferStatus::Active),
                    OfferStatus::Expired,
                    &format!(
                        "Expired: superseded by {} offer {}",
                        offer.product_type, offer.guid
                    ),
                    &old_snapshot,
                )
                .await?;
                db_events::insert_event(
                    &mut *tx,
                    Some(customer_id),
                    Some(*expired_id),
                    source,
                    "offer_expired",
                    &json!({ "superseded_by": offer.product_type }),
                )
                .await?;
            }

            offers::insert_offer(&mut *tx, &offer).await?;
            history::append_history(
                &mut *tx,
                offer.guid,
                None,
                OfferStatus::Active,
                "Created as active, superseding expired offers",
                &snapshot,
            )
            .await?;
            db_events::insert_event(
                &mut *tx,
                Some(customer_id),
                Some(offer.guid),
                source,
                "offer_created",
                &json!({ "product_type": offer.product_type }),
            )
            .await?;
            tx.commit().await?;

            for expired_id in &expire {
                bus.emit(CdpEvent::OfferExpired {
                    offer_id: *expired_id,
                    superseded_by: offer.product_type,
                    timestamp: now,
                });
            }
            bus.emit(CdpEvent::OfferCreated {
                customer_id,
                offer_id: offer.guid,
                product_type: offer.product_type,
                timestamp: now,
            });

            Ok(IngestReport {
                customer_id,
                offer_id: Some(offer.guid),
                matched_existing_customer: matched,
                outcome: IngestOutcome::Superseded,
                detail: Some(format!("expired {} offer(s)", expire.len())),
            })
        }

        Decision::MarkNewDuplicate { kept } => {
            let mut offer = new_offer(customer_id, offer_type, record, OfferStatus::Duplicate);
            // The duplicate report reads this back out
            if let Some(map) = offer.attributes.as_object_mut() {
                map.insert("duplicate_of".to_string(), json!(kept.to_string()));
            }
            let snapshot = snapshot_of(&offer)?;

            let mut tx = pool.begin().await?;
            offers::insert_offer(&mut *tx, &offer).await?;
            history::append_history(
                &mut *tx,
                offer.guid,
                None,
                OfferStatus::Duplicate,
                &format!("Duplicate of offer {}", kept),
                &snapshot,
            )
            .await?;
            db_events::insert_event(
                &mut *tx,
                Some(customer_id),
                Some(offer.guid),
                source,
                "offer_duplicate",
                &json!({ "kept_offer_id": kept.to_string() }),
            )
            .await?;
            tx.commit().await?;

            bus.emit(CdpEvent::OfferDuplicate {
                offer_id: offer.guid,
                kept_offer_id: kept,
                timestamp: now,
            });

            Ok(IngestReport {
                customer_id,
                offer_id: Some(offer.guid),
                matched_existing_customer: matched,
                outcome: IngestOutcome::Duplicate,
                detail: Some(format!("kept offer {}", kept)),
            })
        }

        Decision::Reject { reason } => {
            db_events::insert_event(
                pool,
                Some(customer_id),
                None,
                source,
                "offer_rejected",
                &json!({ "product_type": record.product_type, "reason": reason }),
            )
            .await?;

            bus.emit(CdpEvent::OfferRejected {
                customer_id,
                product_type: record.product_type,
                reason: reason.clone(),
                timestamp: now,
            });

            Ok(IngestReport {
                customer_id,
                offer_id: None,
                matched_existing_customer: matched,
                outcome: IngestOutcome::Rejected,
                detail: Some(reason),
            })
        }
    }
}

fn new_offer(
    customer_id: Uuid,
    offer_type: OfferType,
    record: &IngestRecord,
    status: OfferStatus,
) -> Offer {
    let now = Utc::now();
    Offer {
        guid: Uuid::new_v4(),
        customer_id,
        offer_type,
        status,
        product_type: record.product_type,
        valid_from: record.valid_from,
        valid_to: record.valid_to,
        journey_started: false,
        lan: record.lan.clone().filter(|v| !v.trim().is_empty()),
        attributes: serde_json::Value::Object(record.offer_attributes.clone()),
        created_at: now,
        updated_at: now,
    }
}

fn snapshot_of(offer: &Offer) -> Result<serde_json::Value> {
    serde_json::to_value(offer)
        .map_err(|e| Error::Internal(format!("Failed to snapshot offer: {}", e)))
}

async fn record_identifier_conflict(
    pool: &SqlitePool,
    bus: &EventBus,
    source: &str,
    winner: Uuid,
    losers: &[Uuid],
) -> Result<()> {
    warn!(
        "Identifier conflict: record matched customer {} and also {:?}",
        winner, losers
    );

    db_events::insert_event(
        pool,
        Some(winner),
        None,
        source,
        "identifier_conflict",
        &json!({ "losers": losers.iter().map(|id| id.to_string()).collect::<Vec<_>>() }),
    )
    .await?;

    bus.emit(CdpEvent::IdentifierConflict {
        winner,
        losers: losers.to_vec(),
        timestamp: Utc::now(),
    });

    Ok(())
}

// ---------------------------------------------------------------------------
// CSV batch path
// ---------------------------------------------------------------------------

/// Ingest a CSV stream: one ingestion_logs row per call, row-level errors
/// captured and skipped, never aborting the batch on a bad row
pub async fn ingest_csv<R: Read>(
    pool: &SqlitePool,
    bus: &EventBus,
    source: &str,
    file_name: Option<&str>,
    reader: R,
) -> Result<BatchSummary> {
    let started_at = Utc::now();
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let mut total = 0usize;
    let mut success = 0usize;
    let mut duplicates = 0usize;
    let mut rejected = 0usize;
    let mut errors: Vec<RowError> = Vec::new();

    for (index, row) in csv_reader.records().enumerate() {
        let row_number = index + 1;
        total += 1;

        let record = match row {
            Ok(row) => match parse_row(&headers, &row) {
                Ok(record) => record,
                Err(e) => {
                    errors.push(RowError {
                        row: row_number,
                        message: e.to_string(),
                    });
                    continue;
                }
            },
            Err(e) => {
                errors.push(RowError {
                    row: row_number,
                    message: format!("CSV parse error: {}", e),
                });
                continue;
            }
        };

        match ingest_record(pool, bus, source, &record).await {
            Ok(report) => match report.outcome {
                IngestOutcome::Created | IngestOutcome::Superseded | IngestOutcome::Enriched => {
                    success += 1;
                }
                IngestOutcome::Duplicate => duplicates += 1,
                IngestOutcome::Rejected => rejected += 1,
            },
            Err(e) => {
                errors.push(RowError {
                    row: row_number,
                    message: e.to_string(),
                });
            }
        }
    }

    let ended_at = Utc::now();
    let log = IngestionLog {
        id: 0,
        source: source.to_string(),
        file_name: file_name.map(str::to_string),
        total_rows: total as i64,
        success_count: success as i64,
        error_count: errors.len() as i64,
        duplicate_count: duplicates as i64,
        errors: errors.clone(),
        started_at,
        ended_at,
    };
    let log_id = ingestion_logs::insert_log(pool, &log).await?;

    info!(
        "Batch '{}' complete: {} rows, {} success, {} duplicate, {} rejected, {} errors",
        source,
        total,
        success,
        duplicates,
        rejected,
        errors.len()
    );

    bus.emit(CdpEvent::BatchCompleted {
        source: source.to_string(),
        total,
        success,
        errors: errors.len(),
        timestamp: ended_at,
    });

    Ok(BatchSummary {
        log_id,
        total,
        success,
        duplicates,
        rejected,
        errors,
    })
}

/// Ingest a CSV file from disk (the batch CLI entry point)
pub async fn ingest_csv_file(
    pool: &SqlitePool,
    bus: &EventBus,
    source: &str,
    path: &Path,
) -> Result<BatchSummary> {
    let file = std::fs::File::open(path)?;
    let file_name = path.file_name().and_then(|n| n.to_str());
    ingest_csv(pool, bus, source, file_name, file).await
}

/// Build an IngestRecord from one CSV row
///
/// Unknown columns fold into the customer attributes JSON as strings.
fn parse_row(headers: &csv::StringRecord, row: &csv::StringRecord) -> Result<IngestRecord> {
    let mut customer = CustomerInput::default();
    let mut product_type: Option<ProductType> = None;
    let mut offer_type: Option<OfferType> = None;
    let mut valid_from: Option<NaiveDate> = None;
    let mut valid_to: Option<NaiveDate> = None;
    let mut lan: Option<String> = None;

    for (header, value) in headers.iter().zip(row.iter()) {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match header {
            "mobile" => customer.mobile = Some(value.to_string()),
            "pan" => customer.pan = Some(value.to_string()),
            "aadhaar" => customer.aadhaar = Some(value.to_string()),
            "ucid" => customer.ucid = Some(value.to_string()),
            "prev_lan" => customer.prev_lan = Some(value.to_string()),
            "segment" => customer.segment = Some(value.to_string()),
            "dnd" => customer.dnd = Some(parse_flag(value)?),
            "product_type" => product_type = Some(value.parse()?),
            "offer_type" => offer_type = Some(value.parse()?),
            "valid_from" => valid_from = Some(parse_csv_date(value)?),
            "valid_to" => valid_to = Some(parse_csv_date(value)?),
            "lan" => lan = Some(value.to_string()),
            other => {
                customer
                    .attributes
                    .insert(other.to_string(), serde_json::Value::String(value.to_string()));
            }
        }
    }

    Ok(IngestRecord {
        customer,
        product_type: product_type
            .ok_or_else(|| Error::InvalidInput("Missing product_type".to_string()))?,
        offer_type,
        valid_from: valid_from
            .ok_or_else(|| Error::InvalidInput("Missing valid_from".to_string()))?,
        valid_to: valid_to.ok_or_else(|| Error::InvalidInput("Missing valid_to".to_string()))?,
        lan,
        offer_attributes: serde_json::Map::new(),
    })
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" => Ok(false),
        other => Err(Error::InvalidInput(format!("Invalid flag value: '{}'", other))),
    }
}

fn parse_csv_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| Error::InvalidInput(format!("Invalid date (expected YYYY-MM-DD): '{}'", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[(&str, &str)]) -> (csv::StringRecord, csv::StringRecord) {
        let headers = csv::StringRecord::from(
            fields.iter().map(|(h, _)| *h).collect::<Vec<_>>(),
        );
        let row = csv::StringRecord::from(
            fields.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
        );
        (headers, row)
    }

    #[test]
    fn parse_row_maps_known_columns() {
        let (headers, row) = record(&[
            ("mobile", "9000000001"),
            ("pan", "ABCDE1234F"),
            ("segment", "retail"),
            ("dnd", "yes"),
            ("product_type", "Top-up"),
            ("offer_type", "Fresh"),
            ("valid_from", "2026-01-01"),
            ("valid_to", "2026-03-31"),
            ("lan", "LAN-42"),
        ]);

        let parsed = parse_row(&headers, &row).unwrap();
        assert_eq!(parsed.customer.mobile.as_deref(), Some("9000000001"));
        assert_eq!(parsed.customer.dnd, Some(true));
        assert_eq!(parsed.product_type, ProductType::TopUp);
        assert_eq!(parsed.offer_type, Some(OfferType::Fresh));
        assert_eq!(parsed.lan.as_deref(), Some("LAN-42"));
    }

    #[test]
    fn parse_row_folds_unknown_columns_into_attributes() {
        let (headers, row) = record(&[
            ("mobile", "9000000001"),
            ("product_type", "Insta"),
            ("valid_from", "2026-01-01"),
            ("valid_to", "2026-03-31"),
            ("city", "Pune"),
            ("income_band", "B2"),
        ]);

        let parsed = parse_row(&headers, &row).unwrap();
        assert_eq!(parsed.customer.attributes["city"], "Pune");
        assert_eq!(parsed.customer.attributes["income_band"], "B2");
    }

    #[test]
    fn parse_row_requires_product_and_dates() {
        let (headers, row) = record(&[("mobile", "9000000001"), ("product_type", "Insta")]);
        let err = parse_row(&headers, &row).unwrap_err();
        assert!(err.to_string().contains("valid_from"));

        let (headers, row) = record(&[
            ("mobile", "9000000001"),
            ("valid_from", "2026-01-01"),
            ("valid_to", "2026-03-31"),
        ]);
        let err = parse_row(&headers, &row).unwrap_err();
        assert!(err.to_string().contains("product_type"));
    }

    #[test]
    fn parse_row_rejects_bad_values() {
        let (headers, row) = record(&[
            ("mobile", "9000000001"),
            ("product_type", "Gold Loan"),
            ("valid_from", "2026-01-01"),
            ("valid_to", "2026-03-31"),
        ]);
        assert!(parse_row(&headers, &row).is_err());

        let (headers, row) = record(&[
            ("mobile", "9000000001"),
            ("dnd", "maybe"),
            ("product_type", "Insta"),
            ("valid_from", "2026-01-01"),
            ("valid_to", "2026-03-31"),
        ]);
        assert!(parse_row(&headers, &row).is_err());

        let (headers, row) = record(&[
            ("mobile", "9000000001"),
            ("product_type", "Insta"),
            ("valid_from", "01/01/2026"),
            ("valid_to", "2026-03-31"),
        ]);
        assert!(parse_row(&headers, &row).is_err());
    }

    #[test]
    fn empty_cells_are_ignored() {
        let (headers, row) = record(&[
            ("mobile", "9000000001"),
            ("pan", ""),
            ("offer_type", ""),
            ("product_type", "Insta"),
            ("valid_from", "2026-01-01"),
            ("valid_to", "2026-03-31"),
        ]);

        let parsed = parse_row(&headers, &row).unwrap();
        assert_eq!(parsed.customer.pan, None);
        assert_eq!(parsed.offer_type, None);
    }
}
