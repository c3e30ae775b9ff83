use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

use invenstore_db::{
    NewReturn, ReturnDetail, ReturnFilter, ReturnSummary, ReturnableItem, ReturnableSale,
    ReturnableSaleFilter,
};

use crate::cache::dashboard_prefix;
use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::{AppState, Identity};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/search-sales", get(search_sales))
        .route("/sale-items/{sale_id}", get(sale_items))
        .route("/{id}", get(get_one))
}

async fn create(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<NewReturn>,
) -> ApiResult<(StatusCode, Json<ReturnDetail>)> {
    let detail = state
        .db
        .returns()
        .process_return(&identity.tenant_id, &identity.user_id, &body)
        .await?;

    state.cache.invalidate_prefix(&dashboard_prefix(&identity.tenant_id)).await;
    info!(
        tenant_id = %identity.tenant_id,
        return_id = %detail.sale_return.id,
        total_cents = detail.sale_return.total_cents,
        "Return processed"
    );

    Ok((StatusCode::CREATED, Json(detail)))
}

async fn list(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(filter): ApiQuery<ReturnFilter>,
) -> ApiResult<Json<Vec<ReturnSummary>>> {
    Ok(Json(state.db.returns().list(&identity.tenant_id, &filter).await?))
}

async fn get_one(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<ReturnDetail>> {
    Ok(Json(state.db.returns().get(&identity.tenant_id, &id).await?))
}

async fn search_sales(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(filter): ApiQuery<ReturnableSaleFilter>,
) -> ApiResult<Json<Vec<ReturnableSale>>> {
    Ok(Json(
        state.db.returns().search_sales(&identity.tenant_id, &filter).await?,
    ))
}

async fn sale_items(
    State(state): State<AppState>,
    identity: Identity,
    Path(sale_id): Path<String>,
) -> ApiResult<Json<Vec<ReturnableItem>>> {
    Ok(Json(
        state.db.returns().sale_items(&identity.tenant_id, &sale_id).await?,
    ))
}
