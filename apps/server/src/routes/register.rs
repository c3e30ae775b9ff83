//! Store self-registration with an invitation code.
//!
//! ```text
//! POST /api/register/validate-code  {code}  ──► 200 {valid, store_name, ...} | 404
//! POST /api/register                {invitation_code, username, ...}
//!        └── one transaction: tenant + admin + code used + default categories
//!        ──► 201 {token, user, store}
//! ```

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use invenstore_db::StoreRegistration;

use super::auth::SessionResponse;
use crate::error::{ApiJson, ApiResult};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register))
        .route("/validate-code", post(validate_code))
}

#[derive(Debug, Deserialize)]
pub struct ValidateCodeRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct CodeInfo {
    pub valid: bool,
    pub store_name: String,
    pub owner_name: String,
    pub owner_phone: Option<String>,
    pub owner_address: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

async fn validate_code(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ValidateCodeRequest>,
) -> ApiResult<Json<CodeInfo>> {
    let invitation = state.db.invitations().find_redeemable(&body.code).await?;

    Ok(Json(CodeInfo {
        valid: true,
        store_name: invitation.store_name,
        owner_name: invitation.owner_name,
        owner_phone: invitation.owner_phone,
        owner_address: invitation.owner_address,
        expires_at: invitation.expires_at,
    }))
}

async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<StoreRegistration>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let (store, user) = state.db.invitations().register_store(&body).await?;
    let token = state.jwt.issue(&user)?;

    info!(tenant_id = %store.id, store = %store.name, "Store registered");

    Ok((StatusCode::CREATED, Json(SessionResponse { token, user, store })))
}
