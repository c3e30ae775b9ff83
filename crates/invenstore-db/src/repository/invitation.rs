//! # Invitation Repository
//!
//! Invitation codes and self-service store registration.
//!
//! ## Code Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Invitation Code Lifecycle                            │
//! │                                                                         │
//! │  super admin: create ──► ACTIVE (used = 0, expires_at in the future)   │
//! │                            │                 │                          │
//! │              register_store│                 │ deactivate / time passes │
//! │                            ▼                 ▼                          │
//! │                  USED (tenant_id set)      EXPIRED                      │
//! │                                                                         │
//! │  USED and EXPIRED are terminal.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Registration Transaction
//! 1. Claim the code (`UPDATE ... WHERE used = 0 AND not expired`)
//! 2. Insert the tenant
//! 3. Insert the admin user
//! 4. Seed the default categories
//! 5. Link the code to the tenant
//!
//! Any failure (for example a taken username) rolls back all five steps and
//! the code stays redeemable.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::password::hash_password;
use invenstore_core::validation::{
    normalize_invitation_code, normalize_optional, validate_name, validate_password,
    validate_username,
};
use invenstore_core::{
    new_id, InvitationCode, Role, SubscriptionStatus, Tenant, User, ValidationError,
    DEFAULT_CATEGORIES, INVITATION_CODE_ALPHABET, INVITATION_CODE_LEN,
};

/// Days an invitation stays redeemable when no expiry is given.
pub const DEFAULT_INVITATION_DAYS: i64 = 30;

const MAX_CODE_ATTEMPTS: usize = 10;

const INVITATION_COLUMNS: &str = r#"
    id, code, store_name, owner_name, owner_phone, owner_address,
    used, used_at, tenant_id, expires_at, created_at
"#;

/// Input for issuing an invitation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInvitation {
    pub store_name: String,
    pub owner_name: String,
    pub owner_phone: Option<String>,
    pub owner_address: Option<String>,
    pub expires_in_days: Option<i64>,
}

/// Status filter for the invitation listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationFilter {
    #[default]
    All,
    Active,
    Used,
    Expired,
}

impl InvitationFilter {
    fn where_clause(&self) -> &'static str {
        match self {
            InvitationFilter::All => "1 = 1",
            InvitationFilter::Active => "used = 0 AND (expires_at IS NULL OR expires_at > ?1)",
            InvitationFilter::Used => "used = 1",
            InvitationFilter::Expired => "used = 0 AND expires_at <= ?1",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvitationPage {
    pub codes: Vec<InvitationCode>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Input for redeeming a code into a new store.
///
/// Store and owner fields fall back to the values recorded on the
/// invitation when omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreRegistration {
    pub invitation_code: String,
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub store_name: Option<String>,
    pub owner_name: Option<String>,
    pub owner_phone: Option<String>,
    pub owner_address: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ClaimedCode {
    id: String,
    store_name: String,
    owner_name: String,
    owner_phone: Option<String>,
    owner_address: Option<String>,
}

/// Draws an invitation code from a v4 UUID's random bytes.
///
/// Bytes 6 and 8 carry the UUID version and variant bits and are skipped.
fn generate_code() -> String {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 6 && *i != 8)
        .take(INVITATION_CODE_LEN)
        .map(|(_, b)| INVITATION_CODE_ALPHABET[*b as usize % INVITATION_CODE_ALPHABET.len()] as char)
        .collect()
}

/// Repository for invitation codes.
#[derive(Debug, Clone)]
pub struct InvitationRepository {
    pool: SqlitePool,
}

impl InvitationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvitationRepository { pool }
    }

    /// Issues a new code, retrying on the rare collision.
    pub async fn create(&self, input: &NewInvitation) -> DbResult<InvitationCode> {
        let store_name = validate_name("store_name", &input.store_name)?;
        let owner_name = validate_name("owner_name", &input.owner_name)?;
        let days = input.expires_in_days.unwrap_or(DEFAULT_INVITATION_DAYS);
        if !(1..=365).contains(&days) {
            return Err(ValidationError::OutOfRange {
                field: "expires_in_days".to_string(),
                min: 1,
                max: 365,
            }
            .into());
        }

        let now = Utc::now();
        let mut invitation = InvitationCode {
            id: new_id(),
            code: String::new(),
            store_name,
            owner_name,
            owner_phone: normalize_optional(input.owner_phone.as_deref()),
            owner_address: normalize_optional(input.owner_address.as_deref()),
            used: false,
            used_at: None,
            tenant_id: None,
            expires_at: Some(now + Duration::days(days)),
            created_at: now,
        };

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            invitation.code = generate_code();

            let result = sqlx::query(
                r#"
                INSERT INTO invitation_codes (
                    id, code, store_name, owner_name, owner_phone, owner_address,
                    used, used_at, tenant_id, expires_at, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, 0, NULL, NULL, ?, ?)
                "#,
            )
            .bind(&invitation.id)
            .bind(&invitation.code)
            .bind(&invitation.store_name)
            .bind(&invitation.owner_name)
            .bind(&invitation.owner_phone)
            .bind(&invitation.owner_address)
            .bind(invitation.expires_at)
            .bind(invitation.created_at)
            .execute(&self.pool)
            .await;

            match result.map_err(DbError::from) {
                Ok(_) => {
                    info!(code = %invitation.code, store = %invitation.store_name, "Invitation code issued");
                    return Ok(invitation);
                }
                Err(e) if e.is_unique_violation() => {
                    warn!(attempt, "Invitation code collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(DbError::Internal(
            "Could not generate a unique invitation code".to_string(),
        ))
    }

    /// Finds a code that can still be redeemed.
    ///
    /// The code is uppercased first. Unknown, used, and expired codes are
    /// all `NotFound`.
    pub async fn find_redeemable(&self, code: &str) -> DbResult<InvitationCode> {
        let code = normalize_invitation_code(code)?;
        let sql = format!("SELECT {INVITATION_COLUMNS} FROM invitation_codes WHERE code = ?");

        let invitation = sqlx::query_as::<_, InvitationCode>(&sql)
            .bind(&code)
            .fetch_optional(&self.pool)
            .await?;

        match invitation {
            Some(inv) if inv.is_redeemable(Utc::now()) => Ok(inv),
            _ => Err(DbError::not_found("Invitation code", code)),
        }
    }

    /// Lists codes newest first.
    pub async fn list(
        &self,
        filter: InvitationFilter,
        limit: i64,
        offset: i64,
    ) -> DbResult<InvitationPage> {
        let now: DateTime<Utc> = Utc::now();
        let where_clause = filter.where_clause();

        let sql = format!(
            "SELECT {INVITATION_COLUMNS} FROM invitation_codes WHERE {where_clause} \
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
        );
        let codes = sqlx::query_as::<_, InvitationCode>(&sql)
            .bind(now)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        // ?1 is bound even when the clause does not reference it
        let count_sql = format!(
            "SELECT COUNT(*) FROM invitation_codes WHERE {where_clause} AND ?1 IS NOT NULL"
        );
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(InvitationPage {
            codes,
            total,
            limit,
            offset,
        })
    }

    /// Expires an unused code immediately. Used codes are left alone and
    /// reported as `NotFound`.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE invitation_codes SET expires_at = ? WHERE id = ? AND used = 0",
        )
        .bind(Utc::now() - Duration::days(1))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Unused invitation code", id));
        }

        info!(invitation_id = %id, "Invitation code deactivated");
        Ok(())
    }

    /// Redeems a code: creates the store, its admin user, and the default
    /// categories in one transaction.
    pub async fn register_store(&self, input: &StoreRegistration) -> DbResult<(Tenant, User)> {
        let code = normalize_invitation_code(&input.invitation_code)?;
        let username = validate_username(&input.username)?;
        validate_password(&input.password)?;
        let full_name = validate_name("full_name", &input.full_name)?;

        let password = input.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| DbError::Internal(format!("Password hashing task failed: {}", e)))??;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query_as::<_, ClaimedCode>(
            r#"
            UPDATE invitation_codes
            SET used = 1, used_at = ?1
            WHERE code = ?2 AND used = 0 AND (expires_at IS NULL OR expires_at > ?1)
            RETURNING id, store_name, owner_name, owner_phone, owner_address
            "#,
        )
        .bind(now)
        .bind(&code)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ValidationError::invalid("invitation_code", "is invalid or expired"))?;

        let store_name = match input.store_name.as_deref() {
            Some(name) if !name.trim().is_empty() => validate_name("store_name", name)?,
            _ => claimed.store_name,
        };
        let owner_name = match input.owner_name.as_deref() {
            Some(name) if !name.trim().is_empty() => validate_name("owner_name", name)?,
            _ => claimed.owner_name,
        };

        let tenant = Tenant {
            id: new_id(),
            name: store_name,
            owner_name: Some(owner_name),
            phone: normalize_optional(input.owner_phone.as_deref()).or(claimed.owner_phone),
            address: normalize_optional(input.owner_address.as_deref()).or(claimed.owner_address),
            subscription_status: SubscriptionStatus::Active,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, owner_name, phone, address, subscription_status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.owner_name)
        .bind(&tenant.phone)
        .bind(&tenant.address)
        .bind(tenant.subscription_status)
        .bind(tenant.created_at)
        .execute(&mut *tx)
        .await?;

        let user = User {
            id: new_id(),
            tenant_id: tenant.id.clone(),
            username,
            full_name,
            role: Role::Admin,
            active: true,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, tenant_id, username, password_hash, full_name, role, active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.tenant_id)
        .bind(&user.username)
        .bind(&password_hash)
        .bind(&user.full_name)
        .bind(user.role)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_context("username", &user.username))?;

        for name in DEFAULT_CATEGORIES {
            sqlx::query(
                r#"
                INSERT INTO categories (id, tenant_id, name, description, active, created_at)
                VALUES (?, ?, ?, ?, 1, ?)
                "#,
            )
            .bind(new_id())
            .bind(&tenant.id)
            .bind(*name)
            .bind(format!("Categoría {}", name))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE invitation_codes SET tenant_id = ? WHERE id = ?")
            .bind(&tenant.id)
            .bind(&claimed.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            tenant_id = %tenant.id,
            store = %tenant.name,
            admin = %user.username,
            "Store registered from invitation"
        );
        debug!(code = %code, "Invitation code consumed");

        Ok((tenant, user))
    }
}
