//! Customer lookup endpoint

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use cdp_common::db::models::{Customer, Offer};
use cdp_common::db::{customers, offers};

use crate::{ApiError, AppState};

/// Customer detail response: the row plus all of its offers
#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub offers: Vec<Offer>,
}

/// GET /api/customers/:guid
pub async fn get_customer_detail(
    State(state): State<AppState>,
    Path(guid): Path<Uuid>,
) -> Result<Json<CustomerDetail>, ApiError> {
    let customer = customers::get_customer(&state.db, guid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Customer {}", guid)))?;

    let offers = offers::offers_for_customer(&state.db, guid).await?;

    Ok(Json(CustomerDetail { customer, offers }))
}

/// Build customer routes
pub fn customer_routes() -> Router<AppState> {
    Router::new().route("/api/customers/:guid", get(get_customer_detail))
}
