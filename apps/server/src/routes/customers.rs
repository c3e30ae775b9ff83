//! Customers and credit ("fiado") balances.
//!
//! Balances only move through sales, returns, and the payments endpoint.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use invenstore_core::{Customer, CustomerPayment};
use invenstore_db::{NewCustomer, PaymentWithUser, UpdateCustomer};

use crate::cache::dashboard_prefix;
use crate::error::{ApiJson, ApiResult};
use crate::{AppState, Identity};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/with-debt", get(with_debt))
        .route("/{id}", get(get_one).put(update))
        .route("/{id}/payments", get(payments).post(record_payment))
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount_cents: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub payment: CustomerPayment,
    pub new_balance_cents: i64,
}

async fn list(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(state.db.customers().list(&identity.tenant_id).await?))
}

async fn with_debt(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(state.db.customers().with_debt(&identity.tenant_id).await?))
}

async fn get_one(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.db.customers().get(&identity.tenant_id, &id).await?))
}

async fn create(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<NewCustomer>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let customer = state.db.customers().create(&identity.tenant_id, &body).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

async fn update(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateCustomer>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(
        state.db.customers().update(&identity.tenant_id, &id, &body).await?,
    ))
}

async fn record_payment(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<PaymentRequest>,
) -> ApiResult<(StatusCode, Json<PaymentResponse>)> {
    let (payment, customer) = state
        .db
        .customers()
        .record_payment(
            &identity.tenant_id,
            &id,
            &identity.user_id,
            body.amount_cents,
            body.notes.as_deref(),
        )
        .await?;

    state.cache.invalidate_prefix(&dashboard_prefix(&identity.tenant_id)).await;
    info!(
        tenant_id = %identity.tenant_id,
        customer_id = %id,
        amount_cents = body.amount_cents,
        "Customer payment recorded"
    );

    Ok((
        StatusCode::CREATED,
        Json(PaymentResponse {
            payment,
            new_balance_cents: customer.balance_cents,
        }),
    ))
}

async fn payments(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<PaymentWithUser>>> {
    Ok(Json(
        state.db.customers().payments(&identity.tenant_id, &id).await?,
    ))
}
