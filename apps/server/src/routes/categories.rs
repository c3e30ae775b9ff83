use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use invenstore_core::{Category, Role};
use invenstore_db::{CategoryWithCount, NewCategory, UpdateCategory};

use crate::error::{ApiJson, ApiResult};
use crate::{AppState, Identity};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", put(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<Vec<CategoryWithCount>>> {
    Ok(Json(state.db.categories().list(&identity.tenant_id).await?))
}

async fn create(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<NewCategory>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    identity.require(Role::Manager)?;
    let category = state.db.categories().create(&identity.tenant_id, &body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateCategory>,
) -> ApiResult<Json<Category>> {
    identity.require(Role::Manager)?;
    Ok(Json(
        state.db.categories().update(&identity.tenant_id, &id, &body).await?,
    ))
}

async fn remove(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    identity.require(Role::Manager)?;
    state.db.categories().soft_delete(&identity.tenant_id, &id).await?;
    Ok(Json(json!({ "message": "Category deleted" })))
}
