//! Platform administration: stores, subscriptions, invitation codes, and
//! the super admin's own password.
//!
//! Every handler requires `super_admin`. These are the only routes that
//! act across tenants.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use invenstore_core::validation::{clamp_limit, validate_admin_password};
use invenstore_core::{InvitationCode, Role, SubscriptionStatus, Tenant};
use invenstore_db::{
    InvitationFilter, InvitationPage, NewInvitation, PlatformMetrics, StoreDetail, StoreOverview,
};

use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::{ApiError, AppState, Identity};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stores", get(list_stores))
        .route("/stores/{id}", get(store_detail))
        .route("/stores/{id}/subscription", patch(update_subscription))
        .route("/change-password", put(change_password))
        .route("/metrics", get(metrics))
        .route("/invitation-codes", get(list_invitations).post(create_invitation))
        .route("/invitation-codes/{id}", delete(deactivate_invitation))
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreQuery {
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct StorePage {
    pub stores: Vec<StoreOverview>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionUpdate {
    pub status: SubscriptionStatus,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvitationQuery {
    #[serde(default)]
    pub status: InvitationFilter,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        clamp_limit(limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE),
        offset.unwrap_or(0).max(0),
    )
}

async fn list_stores(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(query): ApiQuery<StoreQuery>,
) -> ApiResult<Json<StorePage>> {
    identity.require(Role::SuperAdmin)?;
    let (limit, offset) = page(query.limit, query.offset);

    let (stores, total) = state
        .db
        .tenants()
        .list_with_counts(query.search.as_deref(), limit, offset)
        .await?;

    Ok(Json(StorePage {
        stores,
        total,
        limit,
        offset,
    }))
}

async fn store_detail(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<StoreDetail>> {
    identity.require(Role::SuperAdmin)?;
    Ok(Json(state.db.tenants().detail(&id).await?))
}

async fn change_password(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<PasswordChange>,
) -> ApiResult<Json<Value>> {
    identity.require(Role::SuperAdmin)?;

    let (Some(current), Some(new)) = (body.current_password, body.new_password) else {
        return Err(ApiError::validation(
            "current_password and new_password are required",
        ));
    };
    validate_admin_password(&new)?;

    state
        .db
        .users()
        .change_password(&identity.user_id, &current, &new)
        .await?;
    info!(user_id = %identity.user_id, "Super admin password changed");

    Ok(Json(json!({ "message": "Password updated" })))
}

async fn update_subscription(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SubscriptionUpdate>,
) -> ApiResult<Json<Tenant>> {
    identity.require(Role::SuperAdmin)?;

    let tenant = state.db.tenants().update_subscription(&id, body.status).await?;
    info!(tenant_id = %id, status = %body.status, by = %identity.user_id, "Subscription changed");
    Ok(Json(tenant))
}

async fn metrics(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<PlatformMetrics>> {
    identity.require(Role::SuperAdmin)?;
    Ok(Json(state.db.tenants().platform_metrics().await?))
}

async fn list_invitations(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(query): ApiQuery<InvitationQuery>,
) -> ApiResult<Json<InvitationPage>> {
    identity.require(Role::SuperAdmin)?;
    let (limit, offset) = page(query.limit, query.offset);

    Ok(Json(
        state.db.invitations().list(query.status, limit, offset).await?,
    ))
}

async fn create_invitation(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<NewInvitation>,
) -> ApiResult<(StatusCode, Json<InvitationCode>)> {
    identity.require(Role::SuperAdmin)?;

    let invitation = state.db.invitations().create(&body).await?;
    info!(code = %invitation.code, store = %invitation.store_name, "Invitation code issued");
    Ok((StatusCode::CREATED, Json(invitation)))
}

async fn deactivate_invitation(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    identity.require(Role::SuperAdmin)?;

    state.db.invitations().deactivate(&id).await?;
    Ok(Json(json!({ "message": "Invitation code deactivated" })))
}
