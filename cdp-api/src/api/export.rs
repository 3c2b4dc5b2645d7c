//! CSV report download endpoints

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use cdp_common::export;

use crate::{ApiError, AppState};

/// Optional date range for the duplicate/unique reports
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn csv_response(filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (
                header::CONTENT_TYPE,
                "text/csv; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

/// GET /api/export/moengage
pub async fn export_moengage(State(state): State<AppState>) -> Result<Response, ApiError> {
    let mut buf = Vec::new();
    export::write_moengage_csv(&state.db, &mut buf).await?;
    Ok(csv_response("moengage_offers.csv", buf))
}

/// GET /api/export/duplicates?from=YYYY-MM-DD
pub async fn export_duplicates(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> Result<Response, ApiError> {
    let mut buf = Vec::new();
    export::write_duplicate_report(&state.db, &mut buf, range.from.map(start_of_day)).await?;
    Ok(csv_response("duplicate_report.csv", buf))
}

/// GET /api/export/unique?from=YYYY-MM-DD&to=YYYY-MM-DD
pub async fn export_unique(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> Result<Response, ApiError> {
    let mut buf = Vec::new();
    export::write_unique_report(
        &state.db,
        &mut buf,
        range.from.map(start_of_day),
        range.to.map(start_of_day),
    )
    .await?;
    Ok(csv_response("unique_report.csv", buf))
}

/// GET /api/export/errors/:log_id
pub async fn export_errors(
    State(state): State<AppState>,
    Path(log_id): Path<i64>,
) -> Result<Response, ApiError> {
    let mut buf = Vec::new();
    export::write_error_report(&state.db, &mut buf, log_id).await?;
    Ok(csv_response(
        &format!("error_report_{}.csv", log_id),
        buf,
    ))
}

/// Build export routes
pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/api/export/moengage", get(export_moengage))
        .route("/api/export/duplicates", get(export_duplicates))
        .route("/api/export/unique", get(export_unique))
        .route("/api/export/errors/:log_id", get(export_errors))
}
