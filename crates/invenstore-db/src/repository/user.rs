//! # User Repository
//!
//! Store users and their credentials.
//!
//! ## Login Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Login                                           │
//! │                                                                         │
//! │  username, password                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT user + password_hash + tenant status   (username is global)    │
//! │       │                                                                 │
//! │       ├── no row / inactive user ──────────► None                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  argon2 verify (blocking pool)                                         │
//! │       │                                                                 │
//! │       ├── mismatch ────────────────────────► None                      │
//! │       ▼                                                                 │
//! │  Some(UserCredentials { user, tenant_status })                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The password hash is read inside this module only and never returned.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::password::{hash_password, verify_password};
use invenstore_core::validation::{validate_name, validate_password, validate_username};
use invenstore_core::{new_id, Role, SubscriptionStatus, User, ValidationError};

/// A user together with the subscription status of their store.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub tenant_status: SubscriptionStatus,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: User,
    password_hash: String,
    tenant_status: SubscriptionStatus,
}

/// Input for creating a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

/// Partial update. At least one field must be present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUser {
    pub full_name: Option<String>,
    pub active: Option<bool>,
    pub password: Option<String>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.active.is_none() && self.password.is_none()
    }
}

const USER_COLUMNS: &str = "u.id, u.tenant_id, u.username, u.full_name, u.role, u.active, u.created_at";

/// Repository for users.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    async fn fetch_credentials(&self, column: &str, value: &str) -> DbResult<Option<CredentialRow>> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}, u.password_hash, t.subscription_status AS tenant_status
            FROM users u
            INNER JOIN tenants t ON t.id = u.tenant_id
            WHERE u.{column} = ?
            "#
        );

        Ok(sqlx::query_as::<_, CredentialRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Checks a username/password pair.
    ///
    /// Returns `None` for an unknown username, an inactive user, or a wrong
    /// password, without saying which.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> DbResult<Option<UserCredentials>> {
        let username = username.trim();
        debug!(username = %username, "Authenticating user");

        let Some(row) = self.fetch_credentials("username", username).await? else {
            return Ok(None);
        };

        if !row.user.active {
            return Ok(None);
        }

        let hash = row.password_hash;
        let candidate = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&candidate, &hash))
            .await
            .map_err(|e| DbError::Internal(format!("Password verification task failed: {}", e)))?;

        if !matches {
            return Ok(None);
        }

        Ok(Some(UserCredentials {
            user: row.user,
            tenant_status: row.tenant_status,
        }))
    }

    /// Loads a user with their store's current status, for per-request
    /// session checks.
    pub async fn session(&self, user_id: &str) -> DbResult<Option<UserCredentials>> {
        Ok(self
            .fetch_credentials("id", user_id)
            .await?
            .map(|row| UserCredentials {
                user: row.user,
                tenant_status: row.tenant_status,
            }))
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ? AND u.tenant_id = ?");

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    pub async fn list(&self, tenant_id: &str) -> DbResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.tenant_id = ? ORDER BY u.created_at DESC"
        );

        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Creates a user in the tenant.
    ///
    /// ## Errors
    /// - `Domain(Validation)` for a malformed username, short password, or
    ///   empty full name
    /// - `UniqueViolation { field: "username" }` when the username is taken
    ///   in any store
    pub async fn create(&self, tenant_id: &str, input: &NewUser) -> DbResult<User> {
        let username = validate_username(&input.username)?;
        validate_password(&input.password)?;
        let full_name = validate_name("full_name", &input.full_name)?;

        let password = input.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| DbError::Internal(format!("Password hashing task failed: {}", e)))??;

        let user = User {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            username,
            full_name,
            role: input.role,
            active: true,
            created_at: Utc::now(),
        };

        info!(tenant_id = %tenant_id, username = %user.username, role = %user.role, "Creating user");

        sqlx::query(
            r#"
            INSERT INTO users (id, tenant_id, username, password_hash, full_name, role, active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.tenant_id)
        .bind(&user.username)
        .bind(&password_hash)
        .bind(&user.full_name)
        .bind(user.role)
        .bind(user.active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_context("username", &user.username))?;

        Ok(user)
    }

    /// Applies a partial update and returns the updated user.
    pub async fn update(&self, tenant_id: &str, id: &str, changes: &UpdateUser) -> DbResult<User> {
        if changes.is_empty() {
            return Err(ValidationError::invalid("body", "no fields to update").into());
        }

        let full_name = changes
            .full_name
            .as_deref()
            .map(|n| validate_name("full_name", n))
            .transpose()?;

        let password_hash = match &changes.password {
            Some(password) => {
                validate_password(password)?;
                let password = password.clone();
                Some(
                    tokio::task::spawn_blocking(move || hash_password(&password))
                        .await
                        .map_err(|e| {
                            DbError::Internal(format!("Password hashing task failed: {}", e))
                        })??,
                )
            }
            None => None,
        };

        debug!(tenant_id = %tenant_id, user_id = %id, "Updating user");

        let result = sqlx::query(
            r#"
            UPDATE users SET
                full_name = COALESCE(?, full_name),
                active = COALESCE(?, active),
                password_hash = COALESCE(?, password_hash)
            WHERE id = ? AND tenant_id = ?
            "#,
        )
        .bind(full_name)
        .bind(changes.active)
        .bind(password_hash)
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        self.get(tenant_id, id).await
    }

    /// Replaces a user's password after checking the current one.
    ///
    /// ## Errors
    /// - `Domain(Validation)` when `current` does not match or `new` is too short
    /// - `NotFound` for an unknown user
    pub async fn change_password(&self, user_id: &str, current: &str, new: &str) -> DbResult<()> {
        validate_password(new)?;

        let row = self
            .fetch_credentials("id", user_id)
            .await?
            .ok_or_else(|| DbError::not_found("User", user_id))?;

        let hash = row.password_hash;
        let candidate = current.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&candidate, &hash))
            .await
            .map_err(|e| DbError::Internal(format!("Password verification task failed: {}", e)))?;
        if !matches {
            return Err(ValidationError::invalid("current_password", "is incorrect").into());
        }

        let new = new.to_string();
        let new_hash = tokio::task::spawn_blocking(move || hash_password(&new))
            .await
            .map_err(|e| DbError::Internal(format!("Password hashing task failed: {}", e)))??;

        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(new_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Deletes a user. Users referenced by sales or closings cannot be
    /// deleted (foreign key violation); deactivate them instead.
    pub async fn delete(&self, tenant_id: &str, id: &str) -> DbResult<()> {
        info!(tenant_id = %tenant_id, user_id = %id, "Deleting user");

        let result = sqlx::query("DELETE FROM users WHERE id = ? AND tenant_id = ?")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }
}
