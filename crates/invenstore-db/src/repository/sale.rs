//! # Sale Repository
//!
//! The sale processor: turns a ticket into a persisted sale, moving stock
//! and customer credit in the same transaction.
//!
//! ## Sale Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       process_sale                                      │
//! │                                                                         │
//! │  0. Shape checks (no I/O): lines present, quantities in range,         │
//! │     customer present for credit / mixed                                │
//! │  0. Customer exists in tenant (read, before the transaction)           │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │  1. Per line:                                                          │
//! │     UPDATE products SET stock = stock - q                              │
//! │      WHERE id = ? AND tenant_id = ? AND active = 1 AND stock >= q      │
//! │      RETURNING name, sale_price_cents                                  │
//! │        └── no row ──► ProductNotFound / InsufficientStock ──► ROLLBACK │
//! │  2. total = Σ price × q   (prices read inside the transaction)         │
//! │  3. PaymentSplit::resolve(payment_type, total, cash?, credit?)         │
//! │  4. INSERT sales, INSERT sale_items                                    │
//! │  5. credit > 0 ──► customers.balance_cents += credit                   │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The first statement in the transaction is a write, so the transaction
//! holds SQLite's write lock from the start. Two sales racing for the last
//! units serialize on that lock and the second one sees the first one's
//! decrement: with stock 5 and two sales of 3, exactly one succeeds.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use invenstore_core::checkout::{check_ticket_shape, ticket_total};
use invenstore_core::validation::{clamp_limit, validate_date_range};
use invenstore_core::{
    new_id, CheckoutLine, CoreError, Money, PaymentSplit, PaymentType, Sale, SaleItem, SaleStatus,
};

/// Default page size of the sales listing.
pub const DEFAULT_SALES_LIMIT: i64 = 100;
const MAX_SALES_LIMIT: i64 = 1_000;

const SALE_COLUMNS: &str = r#"
    s.id, s.tenant_id, s.user_id, s.customer_id,
    s.subtotal_cents, s.discount_cents, s.total_cents,
    s.payment_type, s.cash_amount_cents, s.credit_amount_cents,
    s.status, s.created_at
"#;

// =============================================================================
// Inputs
// =============================================================================

/// One requested line: which product and how many.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSaleItem {
    pub product_id: String,
    pub quantity: i64,
}

/// A ticket as submitted at the counter.
///
/// Prices are never taken from the caller; they are read from the catalog
/// inside the transaction. `cash_amount_cents` / `credit_amount_cents` are
/// only consulted for mixed payments.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSale {
    pub items: Vec<NewSaleItem>,
    pub payment_type: PaymentType,
    pub customer_id: Option<String>,
    pub cash_amount_cents: Option<i64>,
    pub credit_amount_cents: Option<i64>,
}

/// Filters for the sales listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub customer_id: Option<String>,
    pub limit: Option<i64>,
}

// =============================================================================
// Outputs
// =============================================================================

/// Result of a successful sale.
#[derive(Debug, Clone, Serialize)]
pub struct SaleReceipt {
    pub sale_id: String,
    pub total_cents: i64,
    pub payment_type: PaymentType,
    pub cash_amount_cents: i64,
    pub credit_amount_cents: i64,
    pub items: Vec<SaleItem>,
}

/// A row of the sales listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SaleSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub sale: Sale,
    pub user_name: Option<String>,
    pub customer_name: Option<String>,
    pub items_count: i64,
}

/// A sale line with the product's current name and barcode.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SaleItemDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: SaleItem,
    pub product_name: String,
    pub barcode: Option<String>,
}

/// A sale with its lines, for the detail view and the printable ticket.
#[derive(Debug, Clone, Serialize)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub user_name: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub items: Vec<SaleItemDetail>,
}

#[derive(sqlx::FromRow)]
struct SaleHeaderRow {
    #[sqlx(flatten)]
    sale: Sale,
    user_name: Option<String>,
    customer_name: Option<String>,
    customer_phone: Option<String>,
}

#[derive(sqlx::FromRow)]
struct DecrementedProduct {
    sale_price_cents: i64,
}

#[derive(sqlx::FromRow)]
struct StockCheck {
    name: String,
    stock: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Processes a sale atomically.
    ///
    /// ## Errors
    /// - `Domain(EmptyTicket | TooManyLines | Validation)` for a malformed ticket
    /// - `Domain(CustomerRequired)` for credit/mixed without a customer
    /// - `Domain(CustomerNotFound)` when the customer is not in the tenant
    /// - `Domain(ProductNotFound)` for a missing or inactive product
    /// - `Domain(InsufficientStock)` when a line exceeds current stock
    /// - `Domain(PaymentMismatch)` when a mixed split does not add up
    ///
    /// Every error leaves stock, balances, and sales untouched.
    pub async fn process_sale(
        &self,
        tenant_id: &str,
        user_id: &str,
        input: &NewSale,
    ) -> DbResult<SaleReceipt> {
        check_ticket_shape(input.items.iter().map(|i| i.quantity))?;

        let customer_id = input
            .customer_id
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        if input.payment_type.requires_customer() && customer_id.is_none() {
            return Err(CoreError::CustomerRequired {
                payment_type: input.payment_type,
            }
            .into());
        }

        if let Some(customer_id) = customer_id {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM customers WHERE id = ? AND tenant_id = ?")
                    .bind(customer_id)
                    .bind(tenant_id)
                    .fetch_optional(&self.pool)
                    .await?;
            if exists.is_none() {
                return Err(CoreError::CustomerNotFound(customer_id.to_string()).into());
            }
        }

        debug!(
            tenant_id = %tenant_id,
            lines = input.items.len(),
            payment_type = %input.payment_type,
            "Processing sale"
        );

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut lines = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let decremented = sqlx::query_as::<_, DecrementedProduct>(
                r#"
                UPDATE products
                SET stock = stock - ?1, updated_at = ?2
                WHERE id = ?3 AND tenant_id = ?4 AND active = 1 AND stock >= ?1
                RETURNING sale_price_cents
                "#,
            )
            .bind(item.quantity)
            .bind(now)
            .bind(&item.product_id)
            .bind(tenant_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(product) = decremented else {
                let current = sqlx::query_as::<_, StockCheck>(
                    "SELECT name, stock FROM products WHERE id = ? AND tenant_id = ? AND active = 1",
                )
                .bind(&item.product_id)
                .bind(tenant_id)
                .fetch_optional(&mut *tx)
                .await?;

                return Err(match current {
                    None => CoreError::ProductNotFound(item.product_id.clone()),
                    Some(p) => CoreError::InsufficientStock {
                        product: p.name,
                        available: p.stock,
                        requested: item.quantity,
                    },
                }
                .into());
            };

            lines.push(CheckoutLine {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                unit_price: Money::from_cents(product.sale_price_cents),
            });
        }

        let total = ticket_total(&lines)?;
        let split = PaymentSplit::resolve(
            input.payment_type,
            total,
            input.cash_amount_cents.map(Money::from_cents),
            input.credit_amount_cents.map(Money::from_cents),
        )?;

        let sale = Sale {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            customer_id: customer_id.map(str::to_string),
            subtotal_cents: total.cents(),
            discount_cents: 0,
            total_cents: total.cents(),
            payment_type: input.payment_type,
            cash_amount_cents: split.cash.cents(),
            credit_amount_cents: split.credit.cents(),
            status: SaleStatus::Completed,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, tenant_id, user_id, customer_id,
                subtotal_cents, discount_cents, total_cents,
                payment_type, cash_amount_cents, credit_amount_cents,
                status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.tenant_id)
        .bind(&sale.user_id)
        .bind(&sale.customer_id)
        .bind(sale.subtotal_cents)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(sale.payment_type)
        .bind(sale.cash_amount_cents)
        .bind(sale.credit_amount_cents)
        .bind(sale.status)
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = SaleItem {
                id: new_id(),
                sale_id: sale.id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                subtotal_cents: line.subtotal()?.cents(),
            };

            sqlx::query(
                r#"
                INSERT INTO sale_items (id, sale_id, product_id, quantity, unit_price_cents, subtotal_cents)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.subtotal_cents)
            .execute(&mut *tx)
            .await?;

            items.push(item);
        }

        if let (Some(customer_id), true) = (customer_id, split.credit.is_positive()) {
            sqlx::query(
                "UPDATE customers SET balance_cents = balance_cents + ? WHERE id = ? AND tenant_id = ?",
            )
            .bind(split.credit.cents())
            .bind(customer_id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            tenant_id = %tenant_id,
            sale_id = %sale.id,
            total_cents = sale.total_cents,
            credit_cents = sale.credit_amount_cents,
            "Sale completed"
        );

        Ok(SaleReceipt {
            sale_id: sale.id,
            total_cents: sale.total_cents,
            payment_type: sale.payment_type,
            cash_amount_cents: sale.cash_amount_cents,
            credit_amount_cents: sale.credit_amount_cents,
            items,
        })
    }

    /// Lists sales newest first.
    pub async fn list(&self, tenant_id: &str, filter: &SaleFilter) -> DbResult<Vec<SaleSummary>> {
        validate_date_range(filter.start_date, filter.end_date)?;
        let limit = clamp_limit(filter.limit, DEFAULT_SALES_LIMIT, MAX_SALES_LIMIT);

        let sql = format!(
            r#"
            SELECT
                {SALE_COLUMNS},
                u.full_name AS user_name,
                c.name AS customer_name,
                (SELECT COUNT(*) FROM sale_items si WHERE si.sale_id = s.id) AS items_count
            FROM sales s
            LEFT JOIN users u ON u.id = s.user_id
            LEFT JOIN customers c ON c.id = s.customer_id
            WHERE s.tenant_id = ?1
              AND (?2 IS NULL OR date(s.created_at) >= ?2)
              AND (?3 IS NULL OR date(s.created_at) <= ?3)
              AND (?4 IS NULL OR s.customer_id = ?4)
            ORDER BY s.created_at DESC
            LIMIT ?5
            "#
        );

        Ok(sqlx::query_as::<_, SaleSummary>(&sql)
            .bind(tenant_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(filter.customer_id.as_deref())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Loads a sale header in the tenant.
    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<Sale> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales s WHERE s.id = ? AND s.tenant_id = ?");

        sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))
    }

    /// Loads a sale with its lines.
    pub async fn get_detail(&self, tenant_id: &str, id: &str) -> DbResult<SaleDetail> {
        let sql = format!(
            r#"
            SELECT
                {SALE_COLUMNS},
                u.full_name AS user_name,
                c.name AS customer_name,
                c.phone AS customer_phone
            FROM sales s
            LEFT JOIN users u ON u.id = s.user_id
            LEFT JOIN customers c ON c.id = s.customer_id
            WHERE s.id = ? AND s.tenant_id = ?
            "#
        );

        let header = sqlx::query_as::<_, SaleHeaderRow>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;

        let items = sqlx::query_as::<_, SaleItemDetail>(
            r#"
            SELECT
                si.id, si.sale_id, si.product_id, si.quantity,
                si.unit_price_cents, si.subtotal_cents,
                p.name AS product_name,
                p.barcode
            FROM sale_items si
            INNER JOIN products p ON p.id = si.product_id
            WHERE si.sale_id = ?
            ORDER BY p.name
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(SaleDetail {
            sale: header.sale,
            user_name: header.user_name,
            customer_name: header.customer_name,
            customer_phone: header.customer_phone,
            items,
        })
    }

    /// Cancels a sale: puts its units back on the shelf, takes its credit
    /// off the customer's balance (floored at zero), and deletes it.
    ///
    /// Sales with returns are refused with `Domain(SaleHasReturns)` and
    /// nothing changes.
    pub async fn cancel(&self, tenant_id: &str, id: &str) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await?;

        // Write first so the transaction holds the write lock before reading.
        sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + (
                    SELECT COALESCE(SUM(si.quantity), 0)
                    FROM sale_items si
                    WHERE si.sale_id = ?1 AND si.product_id = products.id
                ),
                updated_at = ?2
            WHERE tenant_id = ?3
              AND id IN (SELECT product_id FROM sale_items WHERE sale_id = ?1)
              AND EXISTS (SELECT 1 FROM sales WHERE id = ?1 AND tenant_id = ?3)
              AND NOT EXISTS (SELECT 1 FROM returns WHERE sale_id = ?1)
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .bind(tenant_id)
        .execute(&mut *tx)
        .await?;

        let sql = format!("SELECT {SALE_COLUMNS} FROM sales s WHERE s.id = ? AND s.tenant_id = ?");
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;

        let has_returns: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM returns WHERE sale_id = ? LIMIT 1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if has_returns.is_some() {
            return Err(CoreError::SaleHasReturns(id.to_string()).into());
        }

        if let (Some(customer_id), true) = (&sale.customer_id, sale.credit_amount_cents > 0) {
            sqlx::query(
                r#"
                UPDATE customers
                SET balance_cents = MAX(0, balance_cents - ?)
                WHERE id = ? AND tenant_id = ?
                "#,
            )
            .bind(sale.credit_amount_cents)
            .bind(customer_id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM sale_items WHERE sale_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM sales WHERE id = ? AND tenant_id = ?")
            .bind(id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(tenant_id = %tenant_id, sale_id = %id, total_cents = sale.total_cents, "Sale cancelled");
        Ok(sale)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{NewReturn, NewReturnItem};
    use crate::test_support::*;
    use crate::Database;

    fn ticket(lines: &[(&str, i64)], payment_type: PaymentType, customer: Option<&str>) -> NewSale {
        NewSale {
            items: lines
                .iter()
                .map(|(id, q)| NewSaleItem {
                    product_id: id.to_string(),
                    quantity: *q,
                })
                .collect(),
            payment_type,
            customer_id: customer.map(str::to_string),
            cash_amount_cents: None,
            credit_amount_cents: None,
        }
    }

    async fn stock_of(db: &Database, tenant_id: &str, product_id: &str) -> i64 {
        db.products().get(tenant_id, product_id).await.unwrap().stock
    }

    #[tokio::test]
    async fn test_cash_sale_totals_and_stock() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;
        let refresco = seed_product(&db, &tenant.id, "Refresco", 1800, 10).await;
        let pan = seed_product(&db, &tenant.id, "Pan", 550, 20).await;

        let receipt = db
            .sales()
            .process_sale(
                &tenant.id,
                &user.id,
                &ticket(&[(&refresco.id, 2), (&pan.id, 3)], PaymentType::Cash, None),
            )
            .await
            .unwrap();

        assert_eq!(receipt.total_cents, 2 * 1800 + 3 * 550);
        assert_eq!(receipt.cash_amount_cents, receipt.total_cents);
        assert_eq!(receipt.credit_amount_cents, 0);
        assert_eq!(stock_of(&db, &tenant.id, &refresco.id).await, 8);
        assert_eq!(stock_of(&db, &tenant.id, &pan.id).await, 17);

        let detail = db.sales().get_detail(&tenant.id, &receipt.sale_id).await.unwrap();
        let sum: i64 = detail.items.iter().map(|i| i.item.subtotal_cents).sum();
        assert_eq!(sum, detail.sale.total_cents);
        assert_eq!(
            detail.sale.total_cents,
            detail.sale.cash_amount_cents + detail.sale.credit_amount_cents
        );
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;
        let ok = seed_product(&db, &tenant.id, "Arroz", 3000, 10).await;
        let scarce = seed_product(&db, &tenant.id, "Aceite", 4500, 5).await;

        let err = db
            .sales()
            .process_sale(
                &tenant.id,
                &user.id,
                &ticket(&[(&ok.id, 2), (&scarce.id, 6)], PaymentType::Cash, None),
            )
            .await
            .unwrap_err();

        match err {
            DbError::Domain(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(stock_of(&db, &tenant.id, &ok.id).await, 10);
        assert_eq!(stock_of(&db, &tenant.id, &scarce.id).await, 5);
        assert!(db
            .sales()
            .list(&tenant.id, &SaleFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_credit_sale_increases_balance() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;
        let customer = seed_customer(&db, &tenant.id, "Don Pepe").await;
        let product = seed_product(&db, &tenant.id, "Galletas", 100, 10).await;

        db.sales()
            .process_sale(
                &tenant.id,
                &user.id,
                &ticket(&[(&product.id, 1)], PaymentType::Credit, Some(&customer.id)),
            )
            .await
            .unwrap();

        let after = db.customers().get(&tenant.id, &customer.id).await.unwrap();
        assert_eq!(after.balance_cents, 100);
    }

    #[tokio::test]
    async fn test_mixed_sale_split() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;
        let customer = seed_customer(&db, &tenant.id, "Lupe").await;
        let product = seed_product(&db, &tenant.id, "Detergente", 5000, 10).await;

        let mut sale = ticket(&[(&product.id, 2)], PaymentType::Mixed, Some(&customer.id));
        sale.cash_amount_cents = Some(6_000);
        let receipt = db.sales().process_sale(&tenant.id, &user.id, &sale).await.unwrap();
        assert_eq!(receipt.cash_amount_cents, 6_000);
        assert_eq!(receipt.credit_amount_cents, 4_000);

        let after = db.customers().get(&tenant.id, &customer.id).await.unwrap();
        assert_eq!(after.balance_cents, 4_000);

        let mut bad = ticket(&[(&product.id, 1)], PaymentType::Mixed, Some(&customer.id));
        bad.cash_amount_cents = Some(3_000);
        bad.credit_amount_cents = Some(3_000);
        let err = db.sales().process_sale(&tenant.id, &user.id, &bad).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::PaymentMismatch { .. })));
        assert_eq!(stock_of(&db, &tenant.id, &product.id).await, 8);
    }

    #[tokio::test]
    async fn test_credit_requires_customer() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;
        let product = seed_product(&db, &tenant.id, "Chicles", 200, 10).await;

        let err = db
            .sales()
            .process_sale(
                &tenant.id,
                &user.id,
                &ticket(&[(&product.id, 1)], PaymentType::Credit, None),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::CustomerRequired { .. })));

        let err = db
            .sales()
            .process_sale(
                &tenant.id,
                &user.id,
                &ticket(&[(&product.id, 1)], PaymentType::Credit, Some("ghost")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::CustomerNotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_ticket_rejected() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;

        let err = db
            .sales()
            .process_sale(&tenant.id, &user.id, &ticket(&[], PaymentType::Cash, None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::EmptyTicket)));
    }

    #[tokio::test]
    async fn test_cannot_sell_other_tenants_product() {
        let db = test_db().await;
        let (a, _) = store(&db, "A").await;
        let (b, seller_b) = store(&db, "B").await;
        let product = seed_product(&db, &a.id, "Tortillas", 2200, 10).await;

        let err = db
            .sales()
            .process_sale(
                &b.id,
                &seller_b.id,
                &ticket(&[(&product.id, 1)], PaymentType::Cash, None),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));
        assert_eq!(stock_of(&db, &a.id, &product.id).await, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_do_not_oversell() {
        let (db, _dir) = file_db(5).await;
        let (tenant, user) = store(&db, "Tienda").await;
        let product = seed_product(&db, &tenant.id, "Huevo", 3500, 5).await;
        let sale = ticket(&[(&product.id, 3)], PaymentType::Cash, None);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let repo = db.sales();
                let tenant_id = tenant.id.clone();
                let user_id = user.id.clone();
                let sale = sale.clone();
                tokio::spawn(async move { repo.process_sale(&tenant_id, &user_id, &sale).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(DbError::Domain(CoreError::InsufficientStock { available, .. })) => {
                    assert_eq!(available, 2);
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(stock_of(&db, &tenant.id, &product.id).await, 2);
    }

    #[tokio::test]
    async fn test_mixed_sale_with_extreme_amounts_is_rejected() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;
        let customer = seed_customer(&db, &tenant.id, "Beto").await;
        let product = seed_product(&db, &tenant.id, "Jabón", 2500, 4).await;

        for (cash, credit) in [
            (Some(i64::MIN), None),
            (None, Some(i64::MIN)),
            (Some(i64::MAX), Some(i64::MAX)),
        ] {
            let mut sale = ticket(&[(&product.id, 1)], PaymentType::Mixed, Some(&customer.id));
            sale.cash_amount_cents = cash;
            sale.credit_amount_cents = credit;

            let err = db.sales().process_sale(&tenant.id, &user.id, &sale).await.unwrap_err();
            assert!(matches!(err, DbError::Domain(CoreError::PaymentMismatch { .. })));
        }

        assert_eq!(stock_of(&db, &tenant.id, &product.id).await, 4);
        let balance = db.customers().get(&tenant.id, &customer.id).await.unwrap().balance_cents;
        assert_eq!(balance, 0);
    }

    #[tokio::test]
    async fn test_cancel_after_return_is_refused() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;
        let customer = seed_customer(&db, &tenant.id, "Lupe").await;
        let product = seed_product(&db, &tenant.id, "Galletas", 1200, 10).await;

        let receipt = db
            .sales()
            .process_sale(
                &tenant.id,
                &user.id,
                &ticket(&[(&product.id, 4)], PaymentType::Credit, Some(&customer.id)),
            )
            .await
            .unwrap();

        db.returns()
            .process_return(
                &tenant.id,
                &user.id,
                &NewReturn {
                    items: vec![NewReturnItem {
                        product_id: product.id.clone(),
                        quantity: 1,
                        unit_price_cents: 1200,
                    }],
                    sale_id: Some(receipt.sale_id.clone()),
                    customer_id: None,
                    reason: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(stock_of(&db, &tenant.id, &product.id).await, 7);

        let err = db.sales().cancel(&tenant.id, &receipt.sale_id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::SaleHasReturns(_))));

        assert_eq!(stock_of(&db, &tenant.id, &product.id).await, 7);
        let balance = db.customers().get(&tenant.id, &customer.id).await.unwrap().balance_cents;
        assert_eq!(balance, 4 * 1200 - 1200);
        assert!(db.sales().get(&tenant.id, &receipt.sale_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;
        let customer = seed_customer(&db, &tenant.id, "Marta").await;
        let product = seed_product(&db, &tenant.id, "Café", 9000, 10).await;

        db.sales()
            .process_sale(&tenant.id, &user.id, &ticket(&[(&product.id, 1)], PaymentType::Cash, None))
            .await
            .unwrap();
        db.sales()
            .process_sale(
                &tenant.id,
                &user.id,
                &ticket(&[(&product.id, 2)], PaymentType::Credit, Some(&customer.id)),
            )
            .await
            .unwrap();

        let all = db.sales().list(&tenant.id, &SaleFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|s| s.items_count == 1));
        assert!(all.iter().all(|s| s.user_name.as_deref() == Some(user.full_name.as_str())));

        let filter = SaleFilter {
            customer_id: Some(customer.id.clone()),
            ..Default::default()
        };
        let theirs = db.sales().list(&tenant.id, &filter).await.unwrap();
        assert_eq!(theirs.len(), 1);
        assert_eq!(theirs[0].customer_name.as_deref(), Some("Marta"));

        let today = Utc::now().date_naive();
        let filter = SaleFilter {
            start_date: Some(today),
            end_date: Some(today),
            ..Default::default()
        };
        assert_eq!(db.sales().list(&tenant.id, &filter).await.unwrap().len(), 2);

        let yesterday = today.pred_opt().unwrap();
        let filter = SaleFilter {
            end_date: Some(yesterday),
            ..Default::default()
        };
        assert!(db.sales().list(&tenant.id, &filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_and_balance() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;
        let customer = seed_customer(&db, &tenant.id, "Beto").await;
        let product = seed_product(&db, &tenant.id, "Cerveza", 2500, 12).await;

        let receipt = db
            .sales()
            .process_sale(
                &tenant.id,
                &user.id,
                &ticket(&[(&product.id, 4)], PaymentType::Credit, Some(&customer.id)),
            )
            .await
            .unwrap();
        assert_eq!(stock_of(&db, &tenant.id, &product.id).await, 8);

        let other = seed_tenant(&db, "Otra").await;
        assert!(matches!(
            db.sales().cancel(&other.id, &receipt.sale_id).await,
            Err(DbError::NotFound { .. })
        ));
        assert_eq!(stock_of(&db, &tenant.id, &product.id).await, 8);

        db.sales().cancel(&tenant.id, &receipt.sale_id).await.unwrap();
        assert_eq!(stock_of(&db, &tenant.id, &product.id).await, 12);
        let after = db.customers().get(&tenant.id, &customer.id).await.unwrap();
        assert_eq!(after.balance_cents, 0);
        assert!(matches!(
            db.sales().get(&tenant.id, &receipt.sale_id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
