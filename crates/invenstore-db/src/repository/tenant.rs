//! # Tenant Repository
//!
//! Stores and their subscription state, plus the cross-tenant queries behind
//! the platform admin surface. This is the only repository whose queries
//! are not scoped to a single tenant.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use invenstore_core::{new_id, SubscriptionStatus, Tenant, User};

/// How many of a store's latest sales the admin detail view shows.
pub const RECENT_SALES_LIMIT: i64 = 10;

/// A store row with usage counters, for the admin store listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoreOverview {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub tenant: Tenant,
    pub total_users: i64,
    pub total_products: i64,
    pub total_sales: i64,
}

/// One store as the super admin sees it: counters, revenue, its users,
/// and its latest sales.
#[derive(Debug, Clone, Serialize)]
pub struct StoreDetail {
    #[serde(flatten)]
    pub store: StoreOverview,
    pub total_revenue_cents: i64,
    pub users: Vec<User>,
    pub recent_sales: Vec<RecentSale>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RecentSale {
    pub id: String,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OverviewWithRevenue {
    #[sqlx(flatten)]
    overview: StoreOverview,
    total_revenue_cents: i64,
}

/// Sales volume of one store (counts only, no amounts).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoreActivity {
    pub store_id: String,
    pub store_name: String,
    pub owner_name: Option<String>,
    pub total_sales: i64,
}

/// Platform-wide counters for the super admin.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformMetrics {
    pub total_stores: i64,
    pub active_stores: i64,
    pub total_users: i64,
    pub total_sales: i64,
    pub active_invitations: i64,
    pub used_invitations: i64,
    pub top_stores: Vec<StoreActivity>,
}

/// Repository for tenant (store) rows.
#[derive(Debug, Clone)]
pub struct TenantRepository {
    pool: SqlitePool,
}

impl TenantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TenantRepository { pool }
    }

    /// Creates an active tenant. Registration goes through
    /// [`InvitationRepository::register_store`](super::InvitationRepository::register_store);
    /// this is for provisioning and the seed tool.
    pub async fn create(
        &self,
        name: &str,
        owner_name: Option<&str>,
        phone: Option<&str>,
        address: Option<&str>,
    ) -> DbResult<Tenant> {
        let tenant = Tenant {
            id: new_id(),
            name: name.to_string(),
            owner_name: owner_name.map(str::to_string),
            phone: phone.map(str::to_string),
            address: address.map(str::to_string),
            subscription_status: SubscriptionStatus::Active,
            created_at: Utc::now(),
        };

        info!(tenant_id = %tenant.id, name = %tenant.name, "Creating tenant");

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
        .execute(&self.pool)
        .await?;

        Ok(tenant)
    }

    pub async fn get(&self, id: &str) -> DbResult<Tenant> {
        sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, name, owner_name, phone, address, subscription_status, created_at
            FROM tenants
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Store", id))
    }

    /// Lists stores newest first, with a total for pagination.
    ///
    /// `search` matches the store name or the owner name.
    pub async fn list_with_counts(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<(Vec<StoreOverview>, i64)> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        debug!(search = ?pattern, limit, offset, "Listing stores");

        let stores = sqlx::query_as::<_, StoreOverview>(
            r#"
            SELECT
                t.id, t.name, t.owner_name, t.phone, t.address,
                t.subscription_status, t.created_at,
                (SELECT COUNT(*) FROM users u WHERE u.tenant_id = t.id) AS total_users,
                (SELECT COUNT(*) FROM products p WHERE p.tenant_id = t.id AND p.active = 1) AS total_products,
                (SELECT COUNT(*) FROM sales s WHERE s.tenant_id = t.id) AS total_sales
            FROM tenants t
            WHERE ?1 IS NULL OR t.name LIKE ?1 OR t.owner_name LIKE ?1
            ORDER BY t.created_at DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tenants t WHERE ?1 IS NULL OR t.name LIKE ?1 OR t.owner_name LIKE ?1",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        Ok((stores, total))
    }

    /// Loads one store with its counters, users, and latest sales.
    pub async fn detail(&self, id: &str) -> DbResult<StoreDetail> {
        let row = sqlx::query_as::<_, OverviewWithRevenue>(
            r#"
            SELECT
                t.id, t.name, t.owner_name, t.phone, t.address,
                t.subscription_status, t.created_at,
                (SELECT COUNT(*) FROM users u WHERE u.tenant_id = t.id) AS total_users,
                (SELECT COUNT(*) FROM products p WHERE p.tenant_id = t.id AND p.active = 1) AS total_products,
                (SELECT COUNT(*) FROM sales s WHERE s.tenant_id = t.id) AS total_sales,
                (SELECT COALESCE(SUM(s.total_cents), 0) FROM sales s WHERE s.tenant_id = t.id)
                    AS total_revenue_cents
            FROM tenants t
            WHERE t.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Store", id))?;

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, tenant_id, username, full_name, role, active, created_at
            FROM users
            WHERE tenant_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let recent_sales = sqlx::query_as::<_, RecentSale>(
            r#"
            SELECT id, total_cents, created_at
            FROM sales
            WHERE tenant_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(id)
        .bind(RECENT_SALES_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(StoreDetail {
            store: row.overview,
            total_revenue_cents: row.total_revenue_cents,
            users,
            recent_sales,
        })
    }

    /// Changes a store's subscription status.
    ///
    /// Takes effect on the store's next request: the auth layer re-reads the
    /// status every time.
    pub async fn update_subscription(
        &self,
        id: &str,
        status: SubscriptionStatus,
    ) -> DbResult<Tenant> {
        info!(tenant_id = %id, status = %status, "Updating subscription status");

        let result = sqlx::query("UPDATE tenants SET subscription_status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Store", id));
        }

        self.get(id).await
    }

    /// Platform-wide counters. Amounts are deliberately not aggregated
    /// across stores.
    pub async fn platform_metrics(&self) -> DbResult<PlatformMetrics> {
        let (total_stores, active_stores, total_users, total_sales, active_invitations, used_invitations): (
            i64,
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM tenants),
                (SELECT COUNT(*) FROM tenants WHERE subscription_status = 'active'),
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM sales),
                (SELECT COUNT(*) FROM invitation_codes
                    WHERE used = 0 AND (expires_at IS NULL OR expires_at > ?1)),
                (SELECT COUNT(*) FROM invitation_codes WHERE used = 1)
            "#,
        )
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        let top_stores = sqlx::query_as::<_, StoreActivity>(
            r#"
            SELECT
                t.id AS store_id,
                t.name AS store_name,
                t.owner_name,
                COUNT(s.id) AS total_sales
            FROM tenants t
            LEFT JOIN sales s ON s.tenant_id = t.id
            GROUP BY t.id
            ORDER BY total_sales DESC, t.name
            LIMIT 5
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(PlatformMetrics {
            total_stores,
            active_stores,
            total_users,
            total_sales,
            active_invitations,
            used_invitations,
            top_stores,
        })
    }
}
