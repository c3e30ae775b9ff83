//! # Return Repository
//!
//! The return processor, mirror image of the sale processor: goods come
//! back into stock and the customer's balance goes down.
//!
//! ## Return Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       process_return                                    │
//! │                                                                         │
//! │  0. Shape checks: lines present, quantities in range, prices ≥ 0       │
//! │  0. sale_id given   ──► sale must exist in tenant                      │
//! │     customer_id     ──► given, else the sale's customer, else none     │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │  1. Per line: UPDATE products SET stock = stock + q                    │
//! │               WHERE id = ? AND tenant_id = ?                           │
//! │        └── no row ──► ProductNotFound ──► ROLLBACK                     │
//! │  2. INSERT returns, INSERT return_items                                │
//! │  3. customer ──► balance = MAX(0, balance - total)                     │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Returned quantities are not capped by what the originating sale sold;
//! `sale_items` reports `returned_quantity` so the counter can show it.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use invenstore_core::checkout::{check_ticket_shape, ticket_total};
use invenstore_core::validation::{
    clamp_limit, normalize_optional, validate_date_range, validate_non_negative_cents,
};
use invenstore_core::{
    new_id, CheckoutLine, CoreError, Money, PaymentType, ReturnItem, SaleReturn,
    DEFAULT_RETURN_REASON,
};

/// Default page size of the returns listing.
pub const DEFAULT_RETURNS_LIMIT: i64 = 100;
const MAX_RETURNS_LIMIT: i64 = 1_000;

/// Search window for returnable sales when no dates are given.
pub const RETURN_SEARCH_DAYS: i64 = 30;
const RETURN_SEARCH_LIMIT: i64 = 50;

const RETURN_COLUMNS: &str = r#"
    r.id, r.tenant_id, r.sale_id, r.customer_id, r.reason,
    r.total_cents, r.processed_by, r.created_at
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct NewReturnItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReturn {
    pub items: Vec<NewReturnItem>,
    pub sale_id: Option<String>,
    pub customer_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnableSaleFilter {
    pub sale_id: Option<String>,
    pub customer_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReturnSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub sale_return: SaleReturn,
    pub processed_by_name: Option<String>,
    pub customer_name: Option<String>,
    pub items_count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReturnItemDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: ReturnItem,
    pub product_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnDetail {
    #[serde(flatten)]
    pub sale_return: SaleReturn,
    pub processed_by_name: Option<String>,
    pub customer_name: Option<String>,
    pub items: Vec<ReturnItemDetail>,
}

/// A recent sale that goods may be returned against.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReturnableSale {
    pub id: String,
    pub created_at: chrono::DateTime<Utc>,
    pub total_cents: i64,
    pub payment_type: PaymentType,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub items_count: i64,
}

/// A line of a sale with what has already come back.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReturnableItem {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
    pub stock: i64,
    pub returned_quantity: i64,
}

#[derive(sqlx::FromRow)]
struct ReturnHeaderRow {
    #[sqlx(flatten)]
    sale_return: SaleReturn,
    processed_by_name: Option<String>,
    customer_name: Option<String>,
}

/// Repository for returns.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    /// Processes a return atomically and returns it with its lines.
    ///
    /// ## Errors
    /// - `Domain(EmptyTicket | TooManyLines | Validation)` for malformed lines
    /// - `Domain(SaleNotFound)` when `sale_id` is not a sale of the tenant
    /// - `Domain(CustomerNotFound)` when `customer_id` is not in the tenant
    /// - `Domain(ProductNotFound)` when a product is not in the tenant
    pub async fn process_return(
        &self,
        tenant_id: &str,
        user_id: &str,
        input: &NewReturn,
    ) -> DbResult<ReturnDetail> {
        check_ticket_shape(input.items.iter().map(|i| i.quantity))?;
        for item in &input.items {
            validate_non_negative_cents("unit_price_cents", item.unit_price_cents)?;
        }

        let sale_id = normalize_optional(input.sale_id.as_deref());
        let mut customer_id = normalize_optional(input.customer_id.as_deref());

        if let Some(sale_id) = &sale_id {
            let sale_customer: Option<Option<String>> = sqlx::query_scalar(
                "SELECT customer_id FROM sales WHERE id = ? AND tenant_id = ?",
            )
            .bind(sale_id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;

            match sale_customer {
                None => return Err(CoreError::SaleNotFound(sale_id.clone()).into()),
                Some(from_sale) => {
                    if customer_id.is_none() {
                        customer_id = from_sale;
                    }
                }
            }
        }

        if let Some(customer_id) = &customer_id {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM customers WHERE id = ? AND tenant_id = ?")
                    .bind(customer_id)
                    .bind(tenant_id)
                    .fetch_optional(&self.pool)
                    .await?;
            if exists.is_none() {
                return Err(CoreError::CustomerNotFound(customer_id.clone()).into());
            }
        }

        let lines: Vec<CheckoutLine> = input
            .items
            .iter()
            .map(|i| CheckoutLine {
                product_id: i.product_id.clone(),
                quantity: i.quantity,
                unit_price: Money::from_cents(i.unit_price_cents),
            })
            .collect();
        let total = ticket_total(&lines)?;
        let now = Utc::now();

        debug!(tenant_id = %tenant_id, lines = lines.len(), total_cents = total.cents(), "Processing return");

        let mut tx = self.pool.begin().await?;

        for line in &lines {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock = stock + ?, updated_at = ?
                WHERE id = ? AND tenant_id = ?
                "#,
            )
            .bind(line.quantity)
            .bind(now)
            .bind(&line.product_id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(CoreError::ProductNotFound(line.product_id.clone()).into());
            }
        }

        let sale_return = SaleReturn {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            sale_id,
            customer_id,
            reason: normalize_optional(input.reason.as_deref())
                .unwrap_or_else(|| DEFAULT_RETURN_REASON.to_string()),
            total_cents: total.cents(),
            processed_by: user_id.to_string(),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO returns (id, tenant_id, sale_id, customer_id, reason, total_cents, processed_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&sale_return.id)
        .bind(&sale_return.tenant_id)
        .bind(&sale_return.sale_id)
        .bind(&sale_return.customer_id)
        .bind(&sale_return.reason)
        .bind(sale_return.total_cents)
        .bind(&sale_return.processed_by)
        .bind(sale_return.created_at)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = ReturnItem {
                id: new_id(),
                return_id: sale_return.id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                subtotal_cents: line.subtotal()?.cents(),
            };

            sqlx::query(
                r#"
                INSERT INTO return_items (id, return_id, product_id, quantity, unit_price_cents, subtotal_cents)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&item.id)
            .bind(&item.return_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.subtotal_cents)
            .execute(&mut *tx)
            .await?;

            let product_name: String =
                sqlx::query_scalar("SELECT name FROM products WHERE id = ?")
                    .bind(&item.product_id)
                    .fetch_one(&mut *tx)
                    .await?;

            items.push(ReturnItemDetail { item, product_name });
        }

        let mut customer_name = None;
        if let Some(customer_id) = &sale_return.customer_id {
            customer_name = sqlx::query_scalar(
                r#"
                UPDATE customers
                SET balance_cents = MAX(0, balance_cents - ?)
                WHERE id = ? AND tenant_id = ?
                RETURNING name
                "#,
            )
            .bind(sale_return.total_cents)
            .bind(customer_id)
            .bind(tenant_id)
            .fetch_optional(&mut *tx)
            .await?;
        }

        let processed_by_name: Option<String> =
            sqlx::query_scalar("SELECT full_name FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;

        tx.commit().await?;

        info!(
            tenant_id = %tenant_id,
            return_id = %sale_return.id,
            total_cents = sale_return.total_cents,
            "Return processed"
        );

        Ok(ReturnDetail {
            sale_return,
            processed_by_name,
            customer_name,
            items,
        })
    }

    /// Lists returns newest first.
    pub async fn list(&self, tenant_id: &str, filter: &ReturnFilter) -> DbResult<Vec<ReturnSummary>> {
        validate_date_range(filter.start_date, filter.end_date)?;
        let limit = clamp_limit(filter.limit, DEFAULT_RETURNS_LIMIT, MAX_RETURNS_LIMIT);

        let sql = format!(
            r#"
            SELECT
                {RETURN_COLUMNS},
                u.full_name AS processed_by_name,
                c.name AS customer_name,
                (SELECT COUNT(*) FROM return_items ri WHERE ri.return_id = r.id) AS items_count
            FROM returns r
            LEFT JOIN users u ON u.id = r.processed_by
            LEFT JOIN customers c ON c.id = r.customer_id
            WHERE r.tenant_id = ?1
              AND (?2 IS NULL OR date(r.created_at) >= ?2)
              AND (?3 IS NULL OR date(r.created_at) <= ?3)
            ORDER BY r.created_at DESC
            LIMIT ?4
            "#
        );

        Ok(sqlx::query_as::<_, ReturnSummary>(&sql)
            .bind(tenant_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<ReturnDetail> {
        let sql = format!(
            r#"
            SELECT
                {RETURN_COLUMNS},
                u.full_name AS processed_by_name,
                c.name AS customer_name
            FROM returns r
            LEFT JOIN users u ON u.id = r.processed_by
            LEFT JOIN customers c ON c.id = r.customer_id
            WHERE r.id = ? AND r.tenant_id = ?
            "#
        );

        let header = sqlx::query_as::<_, ReturnHeaderRow>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Return", id))?;

        let items = sqlx::query_as::<_, ReturnItemDetail>(
            r#"
            SELECT
                ri.id, ri.return_id, ri.product_id, ri.quantity,
                ri.unit_price_cents, ri.subtotal_cents,
                p.name AS product_name
            FROM return_items ri
            INNER JOIN products p ON p.id = ri.product_id
            WHERE ri.return_id = ?
            ORDER BY p.name
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ReturnDetail {
            sale_return: header.sale_return,
            processed_by_name: header.processed_by_name,
            customer_name: header.customer_name,
            items,
        })
    }

    /// Finds sales eligible for a return.
    ///
    /// Without dates the search covers the last [`RETURN_SEARCH_DAYS`] days.
    pub async fn search_sales(
        &self,
        tenant_id: &str,
        filter: &ReturnableSaleFilter,
    ) -> DbResult<Vec<ReturnableSale>> {
        validate_date_range(filter.start_date, filter.end_date)?;

        let start = match (filter.start_date, filter.end_date) {
            (None, None) => Some((Utc::now() - Duration::days(RETURN_SEARCH_DAYS)).date_naive()),
            (start, _) => start,
        };

        Ok(sqlx::query_as::<_, ReturnableSale>(
            r#"
            SELECT
                s.id, s.created_at, s.total_cents, s.payment_type, s.customer_id,
                c.name AS customer_name,
                (SELECT COUNT(*) FROM sale_items si WHERE si.sale_id = s.id) AS items_count
            FROM sales s
            LEFT JOIN customers c ON c.id = s.customer_id
            WHERE s.tenant_id = ?1
              AND (?2 IS NULL OR s.id = ?2)
              AND (?3 IS NULL OR s.customer_id = ?3)
              AND (?4 IS NULL OR date(s.created_at) >= ?4)
              AND (?5 IS NULL OR date(s.created_at) <= ?5)
            ORDER BY s.created_at DESC
            LIMIT ?6
            "#,
        )
        .bind(tenant_id)
        .bind(normalize_optional(filter.sale_id.as_deref()))
        .bind(normalize_optional(filter.customer_id.as_deref()))
        .bind(start)
        .bind(filter.end_date)
        .bind(RETURN_SEARCH_LIMIT)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Lines of a sale with the quantity already returned against it.
    pub async fn sale_items(&self, tenant_id: &str, sale_id: &str) -> DbResult<Vec<ReturnableItem>> {
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM sales WHERE id = ? AND tenant_id = ?")
                .bind(sale_id)
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Sale", sale_id));
        }

        Ok(sqlx::query_as::<_, ReturnableItem>(
            r#"
            SELECT
                si.id, si.product_id, p.name AS product_name,
                si.quantity, si.unit_price_cents, si.subtotal_cents, p.stock,
                COALESCE((
                    SELECT SUM(ri.quantity)
                    FROM return_items ri
                    INNER JOIN returns r ON r.id = ri.return_id
                    WHERE r.sale_id = si.sale_id AND ri.product_id = si.product_id
                ), 0) AS returned_quantity
            FROM sale_items si
            INNER JOIN products p ON p.id = si.product_id
            WHERE si.sale_id = ?
            ORDER BY p.name
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
