//! # Report Repository
//!
//! Read-only aggregations over sales, products and customers: manager
//! reports, the dashboard and the rows behind the exports.
//!
//! Every query filters on `tenant_id`; date ranges are inclusive and compare
//! the UTC calendar date of `created_at`.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use invenstore_core::validation::{clamp_limit, validate_date_range};
use invenstore_core::PaymentType;

pub const DEFAULT_REPORT_LIMIT: i64 = 10;
const MAX_REPORT_LIMIT: i64 = 100;

/// Sales of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DailySales {
    pub date: NaiveDate,
    pub count: i64,
    pub amount_cents: i64,
    pub cash_cents: i64,
    pub credit_cents: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub id: String,
    pub name: String,
    pub total_quantity: i64,
    pub total_revenue_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ProfitReport {
    pub revenue_cents: i64,
    pub cost_cents: i64,
    pub net_profit_cents: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopDebtor {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub balance_cents: i64,
}

/// Dashboard tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DashboardStats {
    pub daily_sales_cents: i64,
    pub monthly_sales_cents: i64,
    /// Revenue minus current product cost for this month's items.
    pub monthly_profit_cents: i64,
    pub low_stock_count: i64,
    /// Sum of all customer balances.
    pub pending_credit_cents: i64,
}

/// One sale as it appears in the CSV and printable exports.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ExportSaleRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub user_name: String,
    pub customer_name: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub payment_type: PaymentType,
}

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Per-day totals, newest day first. Cash and credit include the
    /// portions of mixed sales.
    pub async fn sales_by_date(
        &self,
        tenant_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DbResult<Vec<DailySales>> {
        validate_date_range(Some(start), Some(end))?;

        let rows = sqlx::query_as::<_, DailySales>(
            r#"
            SELECT
                date(created_at) AS date,
                COUNT(*) AS count,
                COALESCE(SUM(total_cents), 0) AS amount_cents,
                COALESCE(SUM(cash_amount_cents), 0) AS cash_cents,
                COALESCE(SUM(credit_amount_cents), 0) AS credit_cents
            FROM sales
            WHERE tenant_id = ?1
              AND date(created_at) BETWEEN ?2 AND ?3
            GROUP BY date(created_at)
            ORDER BY date DESC
            "#,
        )
        .bind(tenant_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Best sellers by quantity, optionally within a date range.
    pub async fn top_products(
        &self,
        tenant_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        limit: Option<i64>,
    ) -> DbResult<Vec<TopProduct>> {
        validate_date_range(start, end)?;
        let limit = clamp_limit(limit, DEFAULT_REPORT_LIMIT, MAX_REPORT_LIMIT);

        let rows = sqlx::query_as::<_, TopProduct>(
            r#"
            SELECT
                p.id, p.name,
                SUM(si.quantity) AS total_quantity,
                SUM(si.subtotal_cents) AS total_revenue_cents
            FROM sale_items si
            INNER JOIN sales s ON s.id = si.sale_id
            INNER JOIN products p ON p.id = si.product_id
            WHERE s.tenant_id = ?1
              AND (?2 IS NULL OR date(s.created_at) >= ?2)
              AND (?3 IS NULL OR date(s.created_at) <= ?3)
            GROUP BY p.id, p.name
            ORDER BY total_quantity DESC, p.name
            LIMIT ?4
            "#,
        )
        .bind(tenant_id)
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Revenue against current product cost for the range.
    pub async fn profit(
        &self,
        tenant_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DbResult<ProfitReport> {
        validate_date_range(Some(start), Some(end))?;

        let report = sqlx::query_as::<_, ProfitReport>(
            r#"
            SELECT
                COALESCE(SUM(si.subtotal_cents), 0) AS revenue_cents,
                COALESCE(SUM(p.cost_price_cents * si.quantity), 0) AS cost_cents,
                COALESCE(SUM(si.subtotal_cents - p.cost_price_cents * si.quantity), 0)
                    AS net_profit_cents
            FROM sale_items si
            INNER JOIN sales s ON s.id = si.sale_id
            INNER JOIN products p ON p.id = si.product_id
            WHERE s.tenant_id = ?1
              AND date(s.created_at) BETWEEN ?2 AND ?3
            "#,
        )
        .bind(tenant_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(report)
    }

    pub async fn top_debtors(&self, tenant_id: &str, limit: Option<i64>) -> DbResult<Vec<TopDebtor>> {
        let limit = clamp_limit(limit, DEFAULT_REPORT_LIMIT, MAX_REPORT_LIMIT);

        let rows = sqlx::query_as::<_, TopDebtor>(
            r#"
            SELECT id, name, phone, balance_cents
            FROM customers
            WHERE tenant_id = ? AND balance_cents > 0
            ORDER BY balance_cents DESC
            LIMIT ?
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Dashboard figures for `today` and the month containing it.
    pub async fn dashboard(&self, tenant_id: &str, today: NaiveDate) -> DbResult<DashboardStats> {
        let month_start = today.with_day(1).unwrap_or(today);

        debug!(tenant_id = %tenant_id, %today, "Computing dashboard");

        let stats = sqlx::query_as::<_, DashboardStats>(
            r#"
            SELECT
                (SELECT COALESCE(SUM(total_cents), 0) FROM sales
                    WHERE tenant_id = ?1 AND date(created_at) = ?2
                ) AS daily_sales_cents,
                (SELECT COALESCE(SUM(total_cents), 0) FROM sales
                    WHERE tenant_id = ?1 AND date(created_at) BETWEEN ?3 AND ?2
                ) AS monthly_sales_cents,
                (SELECT COALESCE(SUM(si.subtotal_cents - p.cost_price_cents * si.quantity), 0)
                    FROM sale_items si
                    INNER JOIN sales s ON s.id = si.sale_id
                    INNER JOIN products p ON p.id = si.product_id
                    WHERE s.tenant_id = ?1 AND date(s.created_at) BETWEEN ?3 AND ?2
                ) AS monthly_profit_cents,
                (SELECT COUNT(*) FROM products
                    WHERE tenant_id = ?1 AND active = 1 AND stock <= min_stock
                ) AS low_stock_count,
                (SELECT COALESCE(SUM(balance_cents), 0) FROM customers
                    WHERE tenant_id = ?1
                ) AS pending_credit_cents
            "#,
        )
        .bind(tenant_id)
        .bind(today)
        .bind(month_start)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    /// Sales in the range with seller and customer names, newest first.
    pub async fn export_sales(
        &self,
        tenant_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DbResult<Vec<ExportSaleRow>> {
        validate_date_range(Some(start), Some(end))?;

        let rows = sqlx::query_as::<_, ExportSaleRow>(
            r#"
            SELECT
                s.id, s.created_at,
                u.full_name AS user_name,
                c.name AS customer_name,
                s.subtotal_cents, s.discount_cents, s.total_cents, s.payment_type
            FROM sales s
            INNER JOIN users u ON u.id = s.user_id
            LEFT JOIN customers c ON c.id = s.customer_id
            WHERE s.tenant_id = ?1
              AND date(s.created_at) BETWEEN ?2 AND ?3
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
