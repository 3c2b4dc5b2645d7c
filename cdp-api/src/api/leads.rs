//! Lead ingestion endpoint
//!
//! Single-record JSON ingestion: dedup, precedence resolution and offer
//! write all happen in `cdp_common::ingest`.

use axum::{extract::State, routing::post, Json, Router};

use cdp_common::ingest::{self, IngestRecord, IngestReport};

use crate::{ApiError, AppState};

/// POST /api/leads
///
/// Ingest one customer + offer record. Returns the per-record report with
/// the dedup and precedence outcome.
pub async fn create_lead(
    State(state): State<AppState>,
    Json(record): Json<IngestRecord>,
) -> Result<Json<IngestReport>, ApiError> {
    let report = ingest::ingest_record(&state.db, &state.event_bus, "api", &record).await?;
    Ok(Json(report))
}

/// Build lead ingestion routes
pub fn lead_routes() -> Router<AppState> {
    Router::new().route("/api/leads", post(create_lead))
}
