//! # InvenStore Server
//!
//! REST API for the multi-tenant point-of-sale and inventory service.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          InvenStore Server                              │
//! │                                                                         │
//! │  TraceLayer ─► CorsLayer ─► TimeoutLayer ─► Router                     │
//! │                                               │                         │
//! │        ┌──────────────────────────────────────┴──────────────┐         │
//! │        │ public                      │ protected (require_auth)│        │
//! │        │  /health, /api/health       │  /api/products ...      │        │
//! │        │  /api/auth/login            │  /api/sales, /returns   │        │
//! │        │  /api/register/*            │  /api/cash-register     │        │
//! │        │                             │  /api/reports, /export  │        │
//! │        │                             │  /api/users, /admin     │        │
//! │        └─────────────────────────────┴─────────────────────────┘        │
//! │                                               │                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────┴──────────────────────┐  │
//! │  │  JwtManager  │  │  dyn Cache   │  │  invenstore-db::Database     │  │
//! │  │  (sessions)  │  │ memory/Redis │  │  tenant-scoped repositories  │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config::ServerConfig`]; every setting comes from the environment.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod routes;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use invenstore_db::Database;

// Re-exports
pub use auth::{Identity, JwtManager};
pub use cache::{Cache, MemoryCache};
pub use config::ServerConfig;
pub use error::{ApiError, ErrorCode};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
    pub cache: Arc<dyn Cache>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, cache: Arc<dyn Cache>, config: ServerConfig) -> Self {
        AppState {
            db,
            jwt: Arc::new(JwtManager::new(&config.jwt_secret, config.jwt_lifetime_secs)),
            cache,
            config: Arc::new(config),
        }
    }
}

/// Builds the full application: routes plus the HTTP middleware stack.
pub fn build_app(state: AppState) -> Router {
    let timeout = state.config.request_timeout;
    let cors = cors_layer(&state.config.allowed_origins);

    routes::router(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}
