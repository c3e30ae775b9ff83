//! Product catalog. Reads for every role, writes for managers and up.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use invenstore_core::{Product, Role};
use invenstore_db::{NewProduct, UpdateProduct};

use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::{AppState, Identity};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/low-stock", get(low_stock))
        .route("/barcode/{barcode}", get(by_barcode))
        .route("/{id}", get(get_one).put(update).delete(remove))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category_id: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<Json<Vec<Product>>> {
    let products = state
        .db
        .products()
        .list(&identity.tenant_id, query.category_id.as_deref())
        .await?;
    Ok(Json(products))
}

async fn low_stock(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.db.products().low_stock(&identity.tenant_id).await?))
}

async fn by_barcode(
    State(state): State<AppState>,
    identity: Identity,
    Path(barcode): Path<String>,
) -> ApiResult<Json<Product>> {
    Ok(Json(
        state.db.products().by_barcode(&identity.tenant_id, &barcode).await?,
    ))
}

async fn get_one(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.products().get(&identity.tenant_id, &id).await?))
}

async fn create(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    identity.require(Role::Manager)?;

    let product = state.db.products().create(&identity.tenant_id, &body).await?;
    info!(tenant_id = %identity.tenant_id, product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateProduct>,
) -> ApiResult<Json<Product>> {
    identity.require(Role::Manager)?;

    Ok(Json(
        state.db.products().update(&identity.tenant_id, &id, &body).await?,
    ))
}

/// Soft delete: sale history keeps pointing at the row.
async fn remove(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    identity.require(Role::Manager)?;

    state.db.products().soft_delete(&identity.tenant_id, &id).await?;
    info!(tenant_id = %identity.tenant_id, product_id = %id, "Product deactivated");
    Ok(Json(json!({ "message": "Product deleted" })))
}
