//! JWT authentication module.
//!
//! Issues session tokens at login/registration and checks them on every
//! protected request.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         require_auth layer                              │
//! │                                                                         │
//! │  Authorization: Bearer <jwt>   or   ?token=<jwt>                       │
//! │       │ none ──────────────────────────────────────► 401 NO_TOKEN      │
//! │       ▼                                                                 │
//! │  JwtManager::verify                                                    │
//! │       │ expired ───────────────────────────────────► 401 TOKEN_EXPIRED │
//! │       │ bad signature / malformed ─────────────────► 401 INVALID_TOKEN │
//! │       ▼                                                                 │
//! │  users().session(sub)                                                  │
//! │       │ gone, moved tenant, or deactivated ────────► 401 INVALID_TOKEN │
//! │       │ store not active (super admin exempt) ─────► 403 TENANT_INACTIVE│
//! │       ▼                                                                 │
//! │  request.extensions += Identity                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::{FromRequestParts, Query, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Uri};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use invenstore_core::{Role, User};

use crate::error::{ApiError, ErrorCode};
use crate::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    pub tenant_id: String,

    pub role: Role,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// JWT token manager.
#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: &str, lifetime_secs: i64) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;

        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime_secs,
        }
    }

    /// Issue a session token for `user`.
    pub fn issue(&self, user: &User) -> Result<String, ApiError> {
        self.issue_with_lifetime(user, self.lifetime_secs)
    }

    fn issue_with_lifetime(&self, user: &User, lifetime_secs: i64) -> Result<String, ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(lifetime_secs);

        let claims = Claims {
            sub: user.id.clone(),
            tenant_id: user.tenant_id.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to generate token: {}", e)))
    }

    /// Validate and decode a token.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    ApiError::new(ErrorCode::TokenExpired, "Session expired, log in again")
                }
                _ => ApiError::new(ErrorCode::InvalidToken, "Invalid token"),
            })
    }
}

/// The authenticated caller, attached to the request by [`require_auth`].
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub tenant_id: String,
    pub username: String,
    pub full_name: String,
    pub role: Role,
}

impl Identity {
    /// Fails with `FORBIDDEN` unless the caller holds at least `min`.
    pub fn require(&self, min: Role) -> Result<(), ApiError> {
        if self.role.at_least(min) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("Requires {} role or above", min)))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| ApiError::new(ErrorCode::NoToken, "Authentication required"))
    }
}

/// Extract bearer token from the authorization header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// `?token=` fallback for links opened in a new tab (exports, tickets).
fn extract_query_token(uri: &Uri) -> Option<String> {
    let Query(query) = Query::<TokenQuery>::try_from_uri(uri).ok()?;
    query.token.filter(|t| !t.is_empty())
}

/// Authentication layer for every tenant-scoped route.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(req.headers())
        .map(str::to_string)
        .or_else(|| extract_query_token(req.uri()))
        .ok_or_else(|| ApiError::new(ErrorCode::NoToken, "Authentication required"))?;

    let claims = state.jwt.verify(&token)?;

    let session = state
        .db
        .users()
        .session(&claims.sub)
        .await?
        .filter(|s| s.user.tenant_id == claims.tenant_id)
        .ok_or_else(|| ApiError::new(ErrorCode::InvalidToken, "Invalid token"))?;

    if !session.user.active {
        return Err(ApiError::new(ErrorCode::InvalidToken, "User is inactive"));
    }

    if session.user.role != Role::SuperAdmin && !session.tenant_status.is_active() {
        debug!(tenant_id = %claims.tenant_id, status = %session.tenant_status, "Rejected inactive store");
        return Err(ApiError::new(
            ErrorCode::TenantInactive,
            format!("Store subscription is {}", session.tenant_status),
        ));
    }

    req.extensions_mut().insert(Identity {
        user_id: session.user.id,
        tenant_id: session.user.tenant_id,
        username: session.user.username,
        full_name: session.user.full_name,
        role: session.user.role,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn user(role: Role) -> User {
        User {
            id: "user-1".into(),
            tenant_id: "tenant-1".into(),
            username: "ana".into(),
            full_name: "Ana".into(),
            role,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret-test-secret-test-secret", 3600);
        let token = manager.issue(&user(Role::Manager)).unwrap();

        let claims = manager.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.tenant_id, "tenant-1");
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_expired_token() {
        let manager = JwtManager::new("test-secret-test-secret-test-secret", 3600);
        let token = manager.issue_with_lifetime(&user(Role::Employee), -10).unwrap();

        let err = manager.verify(&token).unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenExpired);
    }

    #[test]
    fn test_wrong_secret() {
        let issuer = JwtManager::new("test-secret-test-secret-test-secret", 3600);
        let other = JwtManager::new("another-secret-another-secret-xx", 3600);
        let token = issuer.issue(&user(Role::Admin)).unwrap();

        assert_eq!(other.verify(&token).unwrap_err().code, ErrorCode::InvalidToken);
        assert_eq!(issuer.verify("garbage").unwrap_err().code, ErrorCode::InvalidToken);
    }

    #[test]
    fn test_token_extraction() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_none());

        let uri = |s: &str| s.parse::<Uri>().unwrap();
        assert_eq!(
            extract_query_token(&uri("/api/export/sales-csv?start=1&token=xyz")),
            Some("xyz".to_string())
        );
        assert_eq!(
            extract_query_token(&uri("/x?token=a%2Eb%2Ec&start_date=2024-01-01")),
            Some("a.b.c".to_string())
        );
        assert_eq!(extract_query_token(&uri("/x?token=")), None);
        assert_eq!(extract_query_token(&uri("/x")), None);
    }

    #[test]
    fn test_role_requirement() {
        let identity = Identity {
            user_id: "u".into(),
            tenant_id: "t".into(),
            username: "u".into(),
            full_name: "U".into(),
            role: Role::Employee,
        };
        assert!(identity.require(Role::Employee).is_ok());
        assert_eq!(identity.require(Role::Manager).unwrap_err().code, ErrorCode::Forbidden);
    }
}
