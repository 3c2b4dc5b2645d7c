//! External SMS/journey event capture

use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cdp_common::db::{events as db_events, offers};
use cdp_common::events::CdpEvent;

use crate::{ApiError, AppState};

/// POST /api/events request
#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub source: String,
    pub event_type: String,
    pub customer_id: Option<Uuid>,
    pub offer_id: Option<Uuid>,
    #[serde(default = "empty_payload")]
    pub payload: serde_json::Value,
}

fn empty_payload() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub recorded: bool,
}

/// POST /api/events
///
/// Record an external campaign/journey event. A `journey_started` event for
/// a known offer also flips the offer's journey flag (idempotent), which
/// pins the offer against precedence expiry.
pub async fn record_event(
    State(state): State<AppState>,
    Json(request): Json<EventRequest>,
) -> Result<Json<EventResponse>, ApiError> {
    if request.event_type.trim().is_empty() {
        return Err(ApiError::BadRequest("event_type is required".to_string()));
    }

    if request.event_type == "journey_started" {
        let offer_id = request
            .offer_id
            .ok_or_else(|| ApiError::BadRequest("journey_started requires offer_id".to_string()))?;

        let updated = offers::set_journey_started(&state.db, offer_id).await?;
        if !updated {
            return Err(ApiError::NotFound(format!("Offer {}", offer_id)));
        }

        state.event_bus.emit(CdpEvent::JourneyStarted {
            offer_id,
            timestamp: Utc::now(),
        });
    }

    db_events::insert_event(
        &state.db,
        request.customer_id,
        request.offer_id,
        &request.source,
        &request.event_type,
        &request.payload,
    )
    .await?;

    Ok(Json(EventResponse { recorded: true }))
}

/// Build event routes
pub fn event_routes() -> Router<AppState> {
    Router::new().route("/api/events", post(record_event))
}
