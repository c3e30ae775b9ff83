//! End-of-day cash register reconciliation.
//!
//! ```text
//! GET  /summary?date=YYYY-MM-DD   expected cash for the day (default today)
//! POST /close {actual_cash_cents, notes?}
//!        └── one closing per store per day ──► 409 DUPLICATE_CLOSING
//! GET  /history?limit&offset&start_date&end_date
//! GET  /export/{id}               closing + that day's summary as JSON
//! ```

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use invenstore_core::{CashRegisterClosing, Tenant};
use invenstore_db::{ClosingHistory, ClosingWithUser, DailySummary, HistoryFilter};

use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::{AppState, Identity};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summary", get(summary))
        .route("/close", post(close))
        .route("/history", get(history))
        .route("/export/{id}", get(export))
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    pub actual_cash_cents: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClosingExport {
    pub store: Tenant,
    pub closing: ClosingWithUser,
    pub summary: DailySummary,
    pub generated_at: DateTime<Utc>,
}

async fn summary(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> ApiResult<Json<DailySummary>> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(
        state.db.cash_register().daily_summary(&identity.tenant_id, date).await?,
    ))
}

async fn close(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<CloseRequest>,
) -> ApiResult<(StatusCode, Json<CashRegisterClosing>)> {
    let closing = state
        .db
        .cash_register()
        .close(
            &identity.tenant_id,
            &identity.user_id,
            body.actual_cash_cents,
            body.notes.as_deref(),
        )
        .await?;

    info!(
        tenant_id = %identity.tenant_id,
        date = %closing.closing_date,
        difference_cents = closing.difference_cents,
        "Cash register closed"
    );

    Ok((StatusCode::CREATED, Json(closing)))
}

async fn history(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(filter): ApiQuery<HistoryFilter>,
) -> ApiResult<Json<ClosingHistory>> {
    Ok(Json(
        state.db.cash_register().history(&identity.tenant_id, &filter).await?,
    ))
}

async fn export(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<ClosingExport>> {
    let closing = state.db.cash_register().get(&identity.tenant_id, &id).await?;
    let summary = state
        .db
        .cash_register()
        .daily_summary(&identity.tenant_id, closing.closing.closing_date)
        .await?;
    let store = state.db.tenants().get(&identity.tenant_id).await?;

    Ok(Json(ClosingExport {
        store,
        closing,
        summary,
        generated_at: Utc::now(),
    }))
}
