//! cdp-api library - HTTP service for the loan-offer CDP
//!
//! Exposes the router and application state for integration testing.

pub mod api;
pub mod error;

pub use error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use cdp_common::events::EventBus;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for in-process broadcast
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self {
            db,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::lead_routes())
        .merge(api::customer_routes())
        .merge(api::offer_routes())
        .merge(api::event_routes())
        .merge(api::upload_routes())
        .merge(api::export_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
