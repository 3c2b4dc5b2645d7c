//! Integration tests for cdp-api endpoints
//!
//! Each test runs the router against a fresh temporary database via
//! `tower::ServiceExt::oneshot`. Covers lead ingestion, eligibility lookup,
//! customer detail, status transitions, event capture, multipart upload,
//! CSV exports, and the error taxonomy (400/404/409).

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use cdp_api::{build_router, AppState};
use cdp_common::events::EventBus;

/// Test helper: fresh app over a temporary database
async fn setup_app() -> (TempDir, Router) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("cdp.db");
    let pool = cdp_common::db::init_database(&db_path).await.unwrap();

    let state = AppState::new(pool, EventBus::new(100));
    (temp_dir, build_router(state))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn extract_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn lead_body(mobile: &str, product_type: &str) -> Value {
    let today = Utc::now().date_naive();
    json!({
        "mobile": mobile,
        "product_type": product_type,
        "valid_from": (today - Duration::days(1)).to_string(),
        "valid_to": (today + Duration::days(30)).to_string(),
    })
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (_tmp, app) = setup_app().await;

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "cdp-api");
    assert!(body["version"].is_string());
    assert!(body["uptime_seconds"].is_number());
}

#[tokio::test]
async fn lead_ingestion_creates_customer_and_offer() {
    let (_tmp, app) = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/leads",
            lead_body("9000000001", "Top-up"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = extract_json(response.into_body()).await;
    assert_eq!(report["outcome"], "created");
    assert_eq!(report["matched_existing_customer"], false);
    let customer_id = report["customer_id"].as_str().unwrap().to_string();

    // Customer detail shows the offer
    let response = app
        .oneshot(get_request(&format!("/api/customers/{}", customer_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let detail = extract_json(response.into_body()).await;
    assert_eq!(detail["mobile"], "9000000001");
    assert_eq!(detail["offers"].as_array().unwrap().len(), 1);
    assert_eq!(detail["offers"][0]["product_type"], "Top-up");
}

#[tokio::test]
async fn lead_without_identifiers_is_bad_request() {
    let (_tmp, app) = setup_app().await;

    let today = Utc::now().date_naive();
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/leads",
            json!({
                "product_type": "Insta",
                "valid_from": today.to_string(),
                "valid_to": (today + Duration::days(30)).to_string(),
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn eligibility_returns_active_offers() {
    let (_tmp, app) = setup_app().await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/leads",
            lead_body("9000000001", "Preapproved"),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/offers/eligibility",
            json!({ "mobile": "9000000001" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["dnd"], false);
    let offers = body["active_offers"].as_array().unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0]["product_type"], "Preapproved");
    assert_eq!(offers[0]["status"], "Active");
}

#[tokio::test]
async fn eligibility_for_unknown_customer_is_not_found() {
    let (_tmp, app) = setup_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/offers/eligibility",
            json!({ "mobile": "9999999999" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn status_transitions_enforce_legality() {
    let (_tmp, app) = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/leads",
            lead_body("9000000001", "Top-up"),
        ))
        .await
        .unwrap();
    let report = extract_json(response.into_body()).await;
    let offer_id = report["offer_id"].as_str().unwrap().to_string();

    // Active -> Inactive is legal
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/offers/{}/status", offer_id),
            json!({ "status": "Inactive", "reason": "ops hold" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = extract_json(response.into_body()).await;
    assert_eq!(updated["status"], "Inactive");

    // Inactive -> Expired is not
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/offers/{}/status", offer_id),
            json!({ "status": "Expired" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "CONFLICT");

    // Unknown offer is a 404
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/offers/00000000-0000-0000-0000-000000000042/status",
            json!({ "status": "Inactive" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn journey_started_event_pins_offer() {
    let (_tmp, app) = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/leads",
            lead_body("9000000001", "Insta"),
        ))
        .await
        .unwrap();
    let report = extract_json(response.into_body()).await;
    let offer_id = report["offer_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/events",
            json!({
                "source": "journey",
                "event_type": "journey_started",
                "offer_id": offer_id,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A higher-priority lead now resolves to duplicate instead of expiry
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/leads",
            lead_body("9000000001", "Employee Loan"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = extract_json(response.into_body()).await;
    assert_eq!(report["outcome"], "duplicate");
}

#[tokio::test]
async fn journey_started_for_unknown_offer_is_not_found() {
    let (_tmp, app) = setup_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/events",
            json!({
                "source": "journey",
                "event_type": "journey_started",
                "offer_id": "00000000-0000-0000-0000-000000000042",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn multipart_upload_ingests_csv() {
    let (_tmp, app) = setup_app().await;

    let today = Utc::now().date_naive();
    let csv = format!(
        "mobile,product_type,valid_from,valid_to\n\
         9000000001,Insta,{from},{to}\n\
         9000000002,Bad Product,{from},{to}\n",
        from = today - Duration::days(1),
        to = today + Duration::days(30)
    );

    let boundary = "cdp-test-boundary";
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"offers.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {csv}\r\n\
         --{b}--\r\n",
        b = boundary,
        csv = csv
    );

    let request = Request::builder()
        .method("POST")
        .uri("/api/upload/offers")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let summary = extract_json(response.into_body()).await;
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["success"], 1);
    assert_eq!(summary["errors"].as_array().unwrap().len(), 1);
    assert!(summary["log_id"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn upload_without_file_is_bad_request() {
    let (_tmp, app) = setup_app().await;

    let boundary = "cdp-test-boundary";
    let body = format!("--{b}--\r\n", b = boundary);

    let request = Request::builder()
        .method("POST")
        .uri("/api/upload/offers")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn moengage_export_serves_csv_attachment() {
    let (_tmp, app) = setup_app().await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/leads",
            lead_body("9000000001", "Top-up"),
        ))
        .await
        .unwrap();

    let response = app.oneshot(get_request("/api/export/moengage")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("moengage_offers.csv"));

    let content = extract_text(response.into_body()).await;
    let mut lines = content.lines();
    assert_eq!(
        lines.next(),
        Some("mobile,segment,product_type,offer_type,valid_from,valid_to,lan")
    );
    assert!(content.contains("9000000001"));
}

#[tokio::test]
async fn error_report_for_unknown_log_is_not_found() {
    let (_tmp, app) = setup_app().await;

    let response = app
        .oneshot(get_request("/api/export/errors/9999"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_and_unique_exports_round_trip() {
    let (_tmp, app) = setup_app().await;

    for _ in 0..2 {
        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/leads",
                lead_body("9000000001", "Insta"),
            ))
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(get_request("/api/export/duplicates"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content = extract_text(response.into_body()).await;
    // Header plus the one duplicate row
    assert_eq!(content.lines().count(), 2);

    let response = app.oneshot(get_request("/api/export/unique")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content = extract_text(response.into_body()).await;
    assert_eq!(content.lines().count(), 2);
}
