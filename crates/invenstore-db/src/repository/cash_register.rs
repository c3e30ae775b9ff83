//! # Cash Register Repository
//!
//! End-of-day reconciliation between the cash the system expects in the
//! drawer and what the cashier counted.
//!
//! ## Closing Lifecycle
//! ```text
//! ┌──────────────────────┐   close(actual_cash)   ┌──────────────────────┐
//! │ no closing for today │ ─────────────────────► │   closing created    │
//! └──────────────────────┘                        └──────────┬───────────┘
//!                                                            │ close again
//!                                                            ▼
//!                                          UNIQUE(tenant_id, closing_date)
//!                                          ──► UniqueViolation("closing_date")
//! ```
//!
//! Every sale stores its cash and credit portions (a cash sale has
//! `credit_amount_cents = 0` and vice versa), so the expected drawer total
//! is just the sum of cash portions for the day.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use invenstore_core::validation::{
    clamp_limit, normalize_optional, validate_closing_notes, validate_date_range,
    validate_non_negative_cents,
};
use invenstore_core::{new_id, CashRegisterClosing};

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 200;

const CLOSING_COLUMNS: &str = r#"
    c.id, c.tenant_id, c.user_id, c.closing_date, c.expected_cash_cents,
    c.actual_cash_cents, c.difference_cents, c.notes, c.created_at
"#;

/// Sales totals for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DailySummary {
    pub date: NaiveDate,
    /// Cash sales plus the cash portion of mixed sales.
    pub expected_cash_cents: i64,
    /// Credit sales plus the credit portion of mixed sales.
    pub credit_sales_cents: i64,
    pub total_sales_cents: i64,
    pub total_transactions: i64,
    /// Cash and mixed sales.
    pub cash_transactions: i64,
    pub credit_transactions: i64,
    pub has_closing: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ClosingWithUser {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub closing: CashRegisterClosing,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClosingHistory {
    pub closings: Vec<ClosingWithUser>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryFilter {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct CashRegisterRepository {
    pool: SqlitePool,
}

impl CashRegisterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CashRegisterRepository { pool }
    }

    /// Totals of the completed sales made on `date` (UTC).
    pub async fn daily_summary(&self, tenant_id: &str, date: NaiveDate) -> DbResult<DailySummary> {
        let summary = sqlx::query_as::<_, DailySummary>(
            r#"
            SELECT
                ?2 AS date,
                COALESCE(SUM(s.cash_amount_cents), 0) AS expected_cash_cents,
                COALESCE(SUM(s.credit_amount_cents), 0) AS credit_sales_cents,
                COALESCE(SUM(s.total_cents), 0) AS total_sales_cents,
                COUNT(s.id) AS total_transactions,
                COALESCE(SUM(CASE WHEN s.payment_type IN ('cash', 'mixed') THEN 1 ELSE 0 END), 0)
                    AS cash_transactions,
                COALESCE(SUM(CASE WHEN s.payment_type = 'credit' THEN 1 ELSE 0 END), 0)
                    AS credit_transactions,
                EXISTS(
                    SELECT 1 FROM cash_register_closings c
                    WHERE c.tenant_id = ?1 AND c.closing_date = ?2
                ) AS has_closing
            FROM sales s
            WHERE s.tenant_id = ?1
              AND date(s.created_at) = ?2
              AND s.status = 'completed'
            "#,
        )
        .bind(tenant_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }

    /// Closes today's register.
    ///
    /// ## Errors
    /// - `Domain(Validation)` for a negative count or notes over 500 chars
    /// - `UniqueViolation { field: "closing_date", .. }` if today is closed
    pub async fn close(
        &self,
        tenant_id: &str,
        user_id: &str,
        actual_cash_cents: i64,
        notes: Option<&str>,
    ) -> DbResult<CashRegisterClosing> {
        validate_non_negative_cents("actual_cash", actual_cash_cents)?;
        if let Some(notes) = notes {
            validate_closing_notes(notes)?;
        }

        let now = Utc::now();
        let today = now.date_naive();
        let summary = self.daily_summary(tenant_id, today).await?;

        let closing = CashRegisterClosing {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            closing_date: today,
            expected_cash_cents: summary.expected_cash_cents,
            actual_cash_cents,
            difference_cents: actual_cash_cents - summary.expected_cash_cents,
            notes: normalize_optional(notes),
            created_at: now,
        };

        debug!(
            tenant_id = %tenant_id,
            expected_cents = closing.expected_cash_cents,
            actual_cents = closing.actual_cash_cents,
            "Closing cash register"
        );

        sqlx::query(
            r#"
            INSERT INTO cash_register_closings (
                id, tenant_id, user_id, closing_date, expected_cash_cents,
                actual_cash_cents, difference_cents, notes, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&closing.id)
        .bind(&closing.tenant_id)
        .bind(&closing.user_id)
        .bind(closing.closing_date)
        .bind(closing.expected_cash_cents)
        .bind(closing.actual_cash_cents)
        .bind(closing.difference_cents)
        .bind(&closing.notes)
        .bind(closing.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_context("closing_date", &today.to_string()))?;

        info!(
            tenant_id = %tenant_id,
            closing_id = %closing.id,
            difference_cents = closing.difference_cents,
            "Cash register closed"
        );

        Ok(closing)
    }

    /// Closings newest first.
    pub async fn history(&self, tenant_id: &str, filter: &HistoryFilter) -> DbResult<ClosingHistory> {
        validate_date_range(filter.start_date, filter.end_date)?;
        let limit = clamp_limit(filter.limit, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT);
        let offset = filter.offset.unwrap_or(0).max(0);

        let sql = format!(
            r#"
            SELECT {CLOSING_COLUMNS}, u.full_name AS user_name
            FROM cash_register_closings c
            LEFT JOIN users u ON u.id = c.user_id
            WHERE c.tenant_id = ?1
              AND (?2 IS NULL OR c.closing_date >= ?2)
              AND (?3 IS NULL OR c.closing_date <= ?3)
            ORDER BY c.closing_date DESC
            LIMIT ?4 OFFSET ?5
            "#
        );

        let closings = sqlx::query_as::<_, ClosingWithUser>(&sql)
            .bind(tenant_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM cash_register_closings
            WHERE tenant_id = ?1
              AND (?2 IS NULL OR closing_date >= ?2)
              AND (?3 IS NULL OR closing_date <= ?3)
            "#,
        )
        .bind(tenant_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(ClosingHistory {
            closings,
            total,
            limit,
            offset,
        })
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<ClosingWithUser> {
        let sql = format!(
            r#"
            SELECT {CLOSING_COLUMNS}, u.full_name AS user_name
            FROM cash_register_closings c
            LEFT JOIN users u ON u.id = c.user_id
            WHERE c.id = ? AND c.tenant_id = ?
            "#
        );

        sqlx::query_as::<_, ClosingWithUser>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Closing", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{NewSale, NewSaleItem};
    use crate::test_support::*;
    use invenstore_core::{CoreError, PaymentType};

    #[allow(clippy::too_many_arguments)]
    async fn sell(
        db: &crate::Database,
        tenant_id: &str,
        user_id: &str,
        product_id: &str,
        quantity: i64,
        payment_type: PaymentType,
        customer_id: Option<&str>,
        cash: Option<i64>,
    ) {
        db.sales()
            .process_sale(
                tenant_id,
                user_id,
                &NewSale {
                    items: vec![NewSaleItem {
                        product_id: product_id.to_string(),
                        quantity,
                    }],
                    payment_type,
                    customer_id: customer_id.map(str::to_string),
                    cash_amount_cents: cash,
                    credit_amount_cents: None,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_daily_summary_splits_mixed_sales() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;
        let customer = seed_customer(&db, &tenant.id, "Lupita").await;
        let product = seed_product(&db, &tenant.id, "Pan", 1000, 100).await;

        sell(&db, &tenant.id, &user.id, &product.id, 2, PaymentType::Cash, None, None).await;
        sell(&db, &tenant.id, &user.id, &product.id, 3, PaymentType::Credit, Some(&customer.id), None).await;
        sell(&db, &tenant.id, &user.id, &product.id, 5, PaymentType::Mixed, Some(&customer.id), Some(1_500)).await;

        let summary = db
            .cash_register()
            .daily_summary(&tenant.id, Utc::now().date_naive())
            .await
            .unwrap();

        assert_eq!(summary.expected_cash_cents, 2_000 + 1_500);
        assert_eq!(summary.credit_sales_cents, 3_000 + 3_500);
        assert_eq!(summary.total_sales_cents, 10_000);
        assert_eq!(summary.total_transactions, 3);
        assert_eq!(summary.cash_transactions, 2);
        assert_eq!(summary.credit_transactions, 1);
        assert!(!summary.has_closing);
    }

    #[tokio::test]
    async fn test_empty_day_is_all_zero() {
        let db = test_db().await;
        let tenant = seed_tenant(&db, "Tienda").await;
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let summary = db.cash_register().daily_summary(&tenant.id, date).await.unwrap();
        assert_eq!(summary.date, date);
        assert_eq!(summary.total_transactions, 0);
        assert_eq!(summary.expected_cash_cents, 0);
    }

    #[tokio::test]
    async fn test_second_close_conflicts_and_keeps_first() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;
        let product = seed_product(&db, &tenant.id, "Leche", 2_500, 10).await;
        sell(&db, &tenant.id, &user.id, &product.id, 2, PaymentType::Cash, None, None).await;

        let first = db
            .cash_register()
            .close(&tenant.id, &user.id, 4_800, Some("faltan 2 pesos"))
            .await
            .unwrap();
        assert_eq!(first.expected_cash_cents, 5_000);
        assert_eq!(first.difference_cents, -200);

        let err = db
            .cash_register()
            .close(&tenant.id, &user.id, 9_999, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "closing_date"));

        let history = db
            .cash_register()
            .history(&tenant.id, &HistoryFilter::default())
            .await
            .unwrap();
        assert_eq!(history.total, 1);
        assert_eq!(history.limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(history.closings[0].closing.actual_cash_cents, 4_800);
        assert_eq!(history.closings[0].user_name.as_deref(), Some(user.full_name.as_str()));

        let summary = db
            .cash_register()
            .daily_summary(&tenant.id, Utc::now().date_naive())
            .await
            .unwrap();
        assert!(summary.has_closing);
    }

    #[tokio::test]
    async fn test_close_validates_input() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;

        let err = db.cash_register().close(&tenant.id, &user.id, -1, None).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let long = "x".repeat(501);
        let err = db
            .cash_register()
            .close(&tenant.id, &user.id, 0, Some(&long))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_is_tenant_scoped() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;
        let other = seed_tenant(&db, "Otra").await;

        let closing = db.cash_register().close(&tenant.id, &user.id, 0, None).await.unwrap();
        assert!(db.cash_register().get(&tenant.id, &closing.id).await.is_ok());
        assert!(matches!(
            db.cash_register().get(&other.id, &closing.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
