//! Login and current identity.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use invenstore_core::{Role, Tenant, User};

use crate::error::{ApiJson, ApiResult};
use crate::{ApiError, AppState, ErrorCode, Identity};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Token plus the user and store it was issued for.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
    pub store: Tenant,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub store: Tenant,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let (Some(username), Some(password)) = (non_empty(body.username), non_empty(body.password))
    else {
        return Err(ApiError::validation("username and password are required"));
    };

    let Some(credentials) = state.db.users().authenticate(&username, &password).await? else {
        warn!(username = %username.trim(), "Failed login attempt");
        return Err(ApiError::new(
            ErrorCode::InvalidCredentials,
            "Invalid username or password",
        ));
    };

    let user = credentials.user;
    if user.role != Role::SuperAdmin && !credentials.tenant_status.is_active() {
        return Err(ApiError::new(
            ErrorCode::TenantInactive,
            format!("Store subscription is {}", credentials.tenant_status),
        ));
    }

    let store = state.db.tenants().get(&user.tenant_id).await?;
    let token = state.jwt.issue(&user)?;

    info!(user_id = %user.id, tenant_id = %user.tenant_id, role = %user.role, "User logged in");

    Ok(Json(SessionResponse { token, user, store }))
}

pub async fn me(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<MeResponse>> {
    let user = state
        .db
        .users()
        .get(&identity.tenant_id, &identity.user_id)
        .await?;
    let store = state.db.tenants().get(&identity.tenant_id).await?;

    Ok(Json(MeResponse { user, store }))
}
