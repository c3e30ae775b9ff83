//! Error types for the REST API.
//!
//! Every failure leaves the server as `{"code": "...", "message": "..."}`
//! with the status from [`ErrorCode::status`].
//!
//! ```text
//! CoreError ──┐
//!             ├──► ApiError { code, message } ──► IntoResponse
//! DbError ────┤        │
//! Rejection ──┘        └── Internal: logged in full, client gets a fixed message
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use invenstore_core::{CoreError, ValidationError};
use invenstore_db::DbError;

/// Stable error codes clients can match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    InsufficientStock,
    NoToken,
    TokenExpired,
    InvalidToken,
    InvalidCredentials,
    Forbidden,
    TenantInactive,
    NotFound,
    DuplicateClosing,
    Conflict,
    InternalError,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError | ErrorCode::InsufficientStock => StatusCode::BAD_REQUEST,
            ErrorCode::NoToken
            | ErrorCode::TokenExpired
            | ErrorCode::InvalidToken
            | ErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden | ErrorCode::TenantInactive => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::DuplicateClosing | ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error returned by every handler.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Logs `detail` and hides it from the client.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!(error = %detail, "Internal error");
        Self::new(ErrorCode::InternalError, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(_)
            | CoreError::CustomerNotFound(_)
            | CoreError::SaleNotFound(_) => ApiError::not_found(err.to_string()),
            CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, err.to_string())
            }
            CoreError::SaleHasReturns(_) => ApiError::new(ErrorCode::Conflict, err.to_string()),
            _ => ApiError::validation(err.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, .. } => ApiError::not_found(format!("{} not found", entity)),
            DbError::UniqueViolation { ref field, .. } if field == "closing_date" => ApiError::new(
                ErrorCode::DuplicateClosing,
                "The cash register is already closed for this date",
            ),
            DbError::UniqueViolation { .. } => ApiError::new(ErrorCode::Conflict, err.to_string()),
            DbError::ForeignKeyViolation { .. } => ApiError::new(
                ErrorCode::Conflict,
                "The record is referenced by other data",
            ),
            DbError::Domain(core) => core.into(),
            other => ApiError::internal(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

/// `Json` extractor whose rejections are `VALIDATION_ERROR` responses.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` extractor whose rejections are `VALIDATION_ERROR` responses.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_codes() {
        let err: ApiError = CoreError::InsufficientStock {
            product: "Pan".into(),
            available: 1,
            requested: 2,
        }
        .into();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert_eq!(err.code.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = CoreError::EmptyTicket.into();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err: ApiError = CoreError::CustomerNotFound("c".into()).into();
        assert_eq!(err.code.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_db_errors_map_to_codes() {
        let err: ApiError = DbError::duplicate("closing_date", "2024-05-01").into();
        assert_eq!(err.code, ErrorCode::DuplicateClosing);

        let err: ApiError = DbError::duplicate("username", "ana").into();
        assert_eq!(err.code, ErrorCode::Conflict);
        assert_eq!(err.code.status(), StatusCode::CONFLICT);

        let err: ApiError = DbError::QueryFailed("syntax error near SELECT".into()).into();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert!(!err.message.contains("SELECT"));
    }

    #[test]
    fn test_code_serializes_screaming() {
        let body = serde_json::to_value(ApiError::new(ErrorCode::TenantInactive, "x")).unwrap();
        assert_eq!(body["code"], "TENANT_INACTIVE");
        assert_eq!(body["message"], "x");
    }
}
