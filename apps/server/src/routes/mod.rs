//! HTTP routes.
//!
//! ```text
//! Router
//! ├── health::router()            /health, /api/health
//! ├── /api/auth/login
//! ├── register::router()          /api/register, /api/register/validate-code
//! └── protected (require_auth)
//!     ├── /api/auth/me
//!     ├── /api/products, /api/categories, /api/customers
//!     ├── /api/sales, /api/returns, /api/cash-register
//!     ├── /api/reports, /api/dashboard, /api/export
//!     ├── /api/promotions, /api/users
//!     └── /api/admin              super_admin only
//! ```
//!
//! Handlers read the caller from the [`Identity`](crate::Identity)
//! extractor and pass `identity.tenant_id` to every repository call.

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use crate::auth::require_auth;
use crate::AppState;

pub mod admin;
pub mod auth;
pub mod cash_register;
pub mod categories;
pub mod customers;
pub mod dashboard;
pub mod export;
pub mod health;
pub mod products;
pub mod promotions;
pub mod register;
pub mod reports;
pub mod returns;
pub mod sales;
pub mod users;

#[cfg(test)]
mod tests;

/// All routes with state applied.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/auth/me", get(auth::me))
        .nest("/api/products", products::router())
        .nest("/api/categories", categories::router())
        .nest("/api/customers", customers::router())
        .nest("/api/sales", sales::router())
        .nest("/api/returns", returns::router())
        .nest("/api/cash-register", cash_register::router())
        .nest("/api/reports", reports::router())
        .nest("/api/dashboard", dashboard::router())
        .nest("/api/export", export::router())
        .nest("/api/promotions", promotions::router())
        .nest("/api/users", users::router())
        .nest("/api/admin", admin::router())
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(health::router())
        .route("/api/auth/login", post(auth::login))
        .nest("/api/register", register::router())
        .merge(protected)
        .with_state(state)
}

/// `?start_date=&end_date=` shared by reports and exports.
#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
}

impl DateRangeQuery {
    /// Both bounds present and ordered.
    pub fn required(&self) -> Result<(chrono::NaiveDate, chrono::NaiveDate), crate::ApiError> {
        Ok(invenstore_core::validation::require_date_range(
            self.start_date,
            self.end_date,
        )?)
    }
}
