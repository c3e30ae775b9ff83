//! Sales: the checkout endpoint plus listing and cancellation.
//!
//! ```text
//! POST /api/sales {items, payment_type, customer_id?, cash/credit?}
//!      │
//!      ▼
//! SaleRepository::process_sale      one transaction (stock, sale, balance)
//!      │
//!      ├── dashboard cache for the store dropped
//!      ▼
//! 201 SaleReceipt
//! ```

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

use invenstore_core::{Role, Sale};
use invenstore_db::{NewSale, SaleDetail, SaleFilter, SaleReceipt, SaleSummary};

use crate::cache::dashboard_prefix;
use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::{AppState, Identity};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one).delete(cancel))
}

async fn create(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<NewSale>,
) -> ApiResult<(StatusCode, Json<SaleReceipt>)> {
    let receipt = state
        .db
        .sales()
        .process_sale(&identity.tenant_id, &identity.user_id, &body)
        .await?;

    state.cache.invalidate_prefix(&dashboard_prefix(&identity.tenant_id)).await;
    info!(
        tenant_id = %identity.tenant_id,
        sale_id = %receipt.sale_id,
        total_cents = receipt.total_cents,
        payment_type = %receipt.payment_type,
        "Sale processed"
    );

    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn list(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(filter): ApiQuery<SaleFilter>,
) -> ApiResult<Json<Vec<SaleSummary>>> {
    Ok(Json(state.db.sales().list(&identity.tenant_id, &filter).await?))
}

async fn get_one(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<SaleDetail>> {
    Ok(Json(state.db.sales().get_detail(&identity.tenant_id, &id).await?))
}

/// Deletes the sale after putting its stock and credit back.
async fn cancel(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<Sale>> {
    identity.require(Role::Manager)?;

    let sale = state.db.sales().cancel(&identity.tenant_id, &id).await?;
    state.cache.invalidate_prefix(&dashboard_prefix(&identity.tenant_id)).await;
    info!(tenant_id = %identity.tenant_id, sale_id = %id, user_id = %identity.user_id, "Sale cancelled");

    Ok(Json(sale))
}
