//! Download endpoints. These are usually opened in a new tab, so they also
//! accept the token as `?token=`.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use super::DateRangeQuery;
use crate::error::{ApiQuery, ApiResult};
use crate::export::{sales_csv, sales_report_html, ticket_html, CsvFlavor};
use crate::{AppState, Identity};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sales-csv", get(csv_sales))
        .route("/excel/sales", get(spreadsheet_sales))
        .route("/pdf/sales", get(printable_sales))
        .route("/ticket/{sale_id}", get(ticket))
}

fn csv_attachment(body: String, start: chrono::NaiveDate, end: chrono::NaiveDate) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=sales-{}-{}.csv", start, end),
            ),
        ],
        body,
    )
        .into_response()
}

async fn export_csv(
    state: &AppState,
    identity: &Identity,
    range: &DateRangeQuery,
    flavor: CsvFlavor,
) -> ApiResult<Response> {
    let (start, end) = range.required()?;
    let rows = state
        .db
        .reports()
        .export_sales(&identity.tenant_id, start, end)
        .await?;

    Ok(csv_attachment(sales_csv(&rows, flavor), start, end))
}

async fn csv_sales(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(range): ApiQuery<DateRangeQuery>,
) -> ApiResult<Response> {
    export_csv(&state, &identity, &range, CsvFlavor::Comma).await
}

async fn spreadsheet_sales(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(range): ApiQuery<DateRangeQuery>,
) -> ApiResult<Response> {
    export_csv(&state, &identity, &range, CsvFlavor::Spreadsheet).await
}

async fn printable_sales(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(range): ApiQuery<DateRangeQuery>,
) -> ApiResult<Html<String>> {
    let (start, end) = range.required()?;
    let store = state.db.tenants().get(&identity.tenant_id).await?;
    let rows = state
        .db
        .reports()
        .export_sales(&identity.tenant_id, start, end)
        .await?;

    Ok(Html(sales_report_html(&store, start, end, &rows)))
}

async fn ticket(
    State(state): State<AppState>,
    identity: Identity,
    Path(sale_id): Path<String>,
) -> ApiResult<Html<String>> {
    let store = state.db.tenants().get(&identity.tenant_id).await?;
    let sale = state.db.sales().get_detail(&identity.tenant_id, &sale_id).await?;

    Ok(Html(ticket_html(&store, &sale)))
}
