//! Liveness and readiness.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;

use crate::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(liveness))
        .route("/api/health", get(readiness))
}

async fn liveness() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": VERSION }))
}

/// Adds a database round trip; 503 while the database is unreachable.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.db.health_check().await;
    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if db_ok { "ok" } else { "degraded" },
            "version": VERSION,
            "timestamp": Utc::now(),
            "database": if db_ok { "ok" } else { "unavailable" },
        })),
    )
}
