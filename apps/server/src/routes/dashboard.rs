//! Dashboard figures, cached per store and day.
//!
//! Sales, cancellations, returns, and customer payments drop the store's
//! entries. Product edits do not; those show up after the TTL.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use crate::cache::{dashboard_key, dashboard_prefix};
use crate::error::ApiResult;
use crate::{ApiError, AppState, Identity};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(stats))
        .route("/clear-cache", post(clear_cache))
}

async fn stats(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<Value>> {
    let today = Utc::now().date_naive();
    let key = dashboard_key(&identity.tenant_id, today);

    if let Some(cached) = state.cache.get(&key).await {
        debug!(tenant_id = %identity.tenant_id, "Dashboard cache hit");
        return Ok(Json(cached));
    }

    let stats = state.db.reports().dashboard(&identity.tenant_id, today).await?;
    let value = serde_json::to_value(&stats).map_err(ApiError::internal)?;
    state
        .cache
        .set(&key, value.clone(), state.config.dashboard_cache_ttl)
        .await;

    Ok(Json(value))
}

async fn clear_cache(State(state): State<AppState>, identity: Identity) -> Json<Value> {
    state.cache.invalidate_prefix(&dashboard_prefix(&identity.tenant_id)).await;
    Json(json!({ "message": "Dashboard cache cleared" }))
}
