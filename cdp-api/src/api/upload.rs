//! Bulk CSV upload endpoint

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};

use cdp_common::ingest::{self, BatchSummary};

use crate::{ApiError, AppState};

/// POST /api/upload/offers
///
/// Multipart CSV bulk upload. The first field carrying a file is ingested;
/// row-level failures are captured in the returned summary, not surfaced
/// as HTTP errors.
pub async fn upload_offers(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchSummary>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.file_name().is_none() && field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

        let summary = ingest::ingest_csv(
            &state.db,
            &state.event_bus,
            "upload",
            file_name.as_deref(),
            &data[..],
        )
        .await?;

        return Ok(Json(summary));
    }

    Err(ApiError::BadRequest(
        "No file field in multipart body".to_string(),
    ))
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new().route("/api/upload/offers", post(upload_offers))
}
