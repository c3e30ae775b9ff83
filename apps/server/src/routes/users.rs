//! Store user management.
//!
//! ```text
//! caller     may create / modify      may delete
//! ─────────  ───────────────────────  ──────────────────────
//! admin      admin, manager, employee anyone but themselves
//! manager    employee                 nobody
//! employee   nobody                   nobody
//! ```

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use invenstore_core::{Role, User};
use invenstore_db::{NewUser, UpdateUser};

use crate::error::{ApiJson, ApiResult};
use crate::{ApiError, AppState, Identity};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", patch(update).delete(remove))
}

async fn list(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<Vec<User>>> {
    identity.require(Role::Manager)?;
    Ok(Json(state.db.users().list(&identity.tenant_id).await?))
}

async fn create(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    identity.require(Role::Manager)?;

    if body.role == Role::SuperAdmin {
        return Err(ApiError::validation(
            "role must be one of: admin, manager, employee",
        ));
    }
    if !identity.role.can_manage(body.role) {
        return Err(ApiError::forbidden(format!(
            "A {} cannot create {} users",
            identity.role, body.role
        )));
    }

    let user = state.db.users().create(&identity.tenant_id, &body).await?;
    info!(
        tenant_id = %identity.tenant_id,
        created_by = %identity.user_id,
        user_id = %user.id,
        role = %user.role,
        "User created"
    );

    Ok((StatusCode::CREATED, Json(user)))
}

async fn update(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateUser>,
) -> ApiResult<Json<User>> {
    identity.require(Role::Manager)?;

    if body.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }

    let target = state.db.users().get(&identity.tenant_id, &id).await?;
    if !identity.role.can_manage(target.role) {
        return Err(ApiError::forbidden(format!(
            "A {} cannot modify {} users",
            identity.role, target.role
        )));
    }

    Ok(Json(
        state.db.users().update(&identity.tenant_id, &id, &body).await?,
    ))
}

async fn remove(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    identity.require(Role::Admin)?;

    if id == identity.user_id {
        return Err(ApiError::validation("You cannot delete your own user"));
    }

    state.db.users().delete(&identity.tenant_id, &id).await?;
    Ok(Json(json!({ "message": "User deleted" })))
}
