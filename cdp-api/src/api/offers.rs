//! Offer eligibility lookup and explicit status transitions

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use cdp_common::db::models::Offer;
use cdp_common::db::{events as db_events, history, offers};
use cdp_common::dedup::{self, CustomerInput};
use cdp_common::types::OfferStatus;

use crate::{ApiError, AppState};

/// POST /api/offers/eligibility request: any subset of identifiers
#[derive(Debug, Deserialize)]
pub struct EligibilityRequest {
    #[serde(flatten)]
    pub identifiers: CustomerInput,
}

/// Eligibility response: matched customer and their active offers
#[derive(Debug, Serialize)]
pub struct EligibilityResponse {
    pub customer_id: Uuid,
    pub dnd: bool,
    pub active_offers: Vec<Offer>,
}

/// POST /api/offers/eligibility
///
/// Look up a customer by any identifier and return their active offers.
pub async fn check_eligibility(
    State(state): State<AppState>,
    Json(request): Json<EligibilityRequest>,
) -> Result<Json<EligibilityResponse>, ApiError> {
    if !request.identifiers.has_identifier() {
        return Err(ApiError::BadRequest(
            "At least one identifier is required".to_string(),
        ));
    }

    let matches = dedup::find_matches(&state.db, &request.identifiers).await?;
    let customer = matches
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound("No customer matches the identifiers".to_string()))?;

    let active_offers = offers::active_offers_for_customer(&state.db, customer.guid).await?;

    Ok(Json(EligibilityResponse {
        customer_id: customer.guid,
        dnd: customer.dnd,
        active_offers,
    }))
}

/// POST /api/offers/:guid/status request
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OfferStatus,
    pub reason: Option<String>,
}

/// POST /api/offers/:guid/status
///
/// Explicit operational status transition. Legal transitions:
/// Active -> Inactive, Active -> Expired, and Inactive -> Active while the
/// validity window still holds. Everything else is a 409.
pub async fn update_offer_status(
    State(state): State<AppState>,
    Path(guid): Path<Uuid>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<Offer>, ApiError> {
    let offer = offers::get_offer(&state.db, guid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Offer {}", guid)))?;

    check_transition(&offer, request.status)?;

    let reason = request
        .reason
        .unwrap_or_else(|| "Manual status update".to_string());
    let snapshot = serde_json::to_value(&offer)
        .map_err(|e| ApiError::Internal(format!("Failed to snapshot offer: {}", e)))?;

    let mut tx = state.db.begin().await.map_err(cdp_common::Error::from)?;
    offers::update_status(&mut *tx, guid, request.status).await?;
    history::append_history(
        &mut *tx,
        guid,
        Some(offer.status),
        request.status,
        &reason,
        &snapshot,
    )
    .await?;
    db_events::insert_event(
        &mut *tx,
        Some(offer.customer_id),
        Some(guid),
        "api",
        "status_updated",
        &json!({ "from": offer.status, "to": request.status, "reason": reason }),
    )
    .await?;
    tx.commit().await.map_err(cdp_common::Error::from)?;

    let updated = offers::get_offer(&state.db, guid)
        .await?
        .ok_or_else(|| ApiError::Internal("Offer vanished mid-update".to_string()))?;

    Ok(Json(updated))
}

fn check_transition(offer: &Offer, to: OfferStatus) -> Result<(), ApiError> {
    let legal = match (offer.status, to) {
        (OfferStatus::Active, OfferStatus::Inactive) => true,
        (OfferStatus::Active, OfferStatus::Expired) => true,
        (OfferStatus::Inactive, OfferStatus::Active) => {
            let today = Utc::now().date_naive();
            if offer.valid_from <= today && today <= offer.valid_to {
                true
            } else {
                return Err(ApiError::Conflict(format!(
                    "Offer {} validity window has lapsed",
                    offer.guid
                )));
            }
        }
        _ => false,
    };

    if legal {
        Ok(())
    } else {
        Err(ApiError::Conflict(format!(
            "Illegal status transition {} -> {}",
            offer.status, to
        )))
    }
}

/// Build offer routes
pub fn offer_routes() -> Router<AppState> {
    Router::new()
        .route("/api/offers/eligibility", post(check_eligibility))
        .route("/api/offers/:guid/status", post(update_offer_status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn offer_with(status: OfferStatus, valid_from: NaiveDate, valid_to: NaiveDate) -> Offer {
        let now = Utc::now();
        Offer {
            guid: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            offer_type: cdp_common::types::OfferType::Fresh,
            status,
            product_type: cdp_common::types::ProductType::Insta,
            valid_from,
            valid_to,
            journey_started: false,
            lan: None,
            attributes: json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    fn current_window() -> (NaiveDate, NaiveDate) {
        let today = Utc::now().date_naive();
        (today - Duration::days(7), today + Duration::days(7))
    }

    #[test]
    fn active_to_inactive_is_legal() {
        let (from, to) = current_window();
        let offer = offer_with(OfferStatus::Active, from, to);
        assert!(check_transition(&offer, OfferStatus::Inactive).is_ok());
    }

    #[test]
    fn inactive_to_active_requires_valid_window() {
        let (from, to) = current_window();
        let offer = offer_with(OfferStatus::Inactive, from, to);
        assert!(check_transition(&offer, OfferStatus::Active).is_ok());

        let lapsed = offer_with(
            OfferStatus::Inactive,
            from - Duration::days(60),
            from - Duration::days(30),
        );
        assert!(check_transition(&lapsed, OfferStatus::Active).is_err());
    }

    #[test]
    fn terminal_statuses_cannot_move() {
        let (from, to) = current_window();
        let offer = offer_with(OfferStatus::Expired, from, to);
        assert!(check_transition(&offer, OfferStatus::Active).is_err());

        let offer = offer_with(OfferStatus::Duplicate, from, to);
        assert!(check_transition(&offer, OfferStatus::Inactive).is_err());
    }
}
