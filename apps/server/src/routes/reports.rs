//! Read-only reports for managers and up.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use invenstore_core::Role;
use invenstore_db::{DailySales, ProfitReport, TopDebtor, TopProduct};

use super::DateRangeQuery;
use crate::error::{ApiQuery, ApiResult};
use crate::{AppState, Identity};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sales-by-date", get(sales_by_date))
        .route("/top-products", get(top_products))
        .route("/profit", get(profit))
        .route("/top-debtors", get(top_debtors))
}

#[derive(Debug, Default, Deserialize)]
pub struct TopProductsQuery {
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

async fn sales_by_date(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(range): ApiQuery<DateRangeQuery>,
) -> ApiResult<Json<Vec<DailySales>>> {
    identity.require(Role::Manager)?;
    let (start, end) = range.required()?;

    Ok(Json(
        state.db.reports().sales_by_date(&identity.tenant_id, start, end).await?,
    ))
}

async fn top_products(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(query): ApiQuery<TopProductsQuery>,
) -> ApiResult<Json<Vec<TopProduct>>> {
    identity.require(Role::Manager)?;

    let rows = state
        .db
        .reports()
        .top_products(&identity.tenant_id, query.start_date, query.end_date, query.limit)
        .await?;
    Ok(Json(rows))
}

async fn profit(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(range): ApiQuery<DateRangeQuery>,
) -> ApiResult<Json<ProfitReport>> {
    identity.require(Role::Manager)?;
    let (start, end) = range.required()?;

    Ok(Json(
        state.db.reports().profit(&identity.tenant_id, start, end).await?,
    ))
}

async fn top_debtors(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> ApiResult<Json<Vec<TopDebtor>>> {
    identity.require(Role::Manager)?;

    Ok(Json(
        state.db.reports().top_debtors(&identity.tenant_id, query.limit).await?,
    ))
}
