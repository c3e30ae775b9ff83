//! # Customer Repository
//!
//! Customers and their credit balance ("fiado").
//!
//! ## Balance Movements
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Customer Balance                                   │
//! │                                                                         │
//! │   credit / mixed sale ──────► + credit amount    (SaleRepository)      │
//! │   sale cancelled      ──────► - credit amount    (floored at 0)        │
//! │   return              ──────► - returned total   (floored at 0)        │
//! │   payment             ──────► - amount           (≤ balance, here)     │
//! │                                                                         │
//! │   balance_cents >= 0 is also a CHECK constraint                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use invenstore_core::validation::{normalize_optional, validate_name, validate_payment_amount};
use invenstore_core::{new_id, CoreError, Customer, CustomerPayment, Money};

const CUSTOMER_COLUMNS: &str = "id, tenant_id, name, phone, address, balance_cents, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A payment row with the name of the user who took it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PaymentWithUser {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub payment: CustomerPayment,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn list(&self, tenant_id: &str) -> DbResult<Vec<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE tenant_id = ? ORDER BY name");

        Ok(sqlx::query_as::<_, Customer>(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Customers who owe money, largest balance first.
    pub async fn with_debt(&self, tenant_id: &str) -> DbResult<Vec<Customer>> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE tenant_id = ? AND balance_cents > 0 \
             ORDER BY balance_cents DESC, name"
        );

        Ok(sqlx::query_as::<_, Customer>(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<Customer> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ? AND tenant_id = ?");

        sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Creates a customer with a zero balance.
    pub async fn create(&self, tenant_id: &str, input: &NewCustomer) -> DbResult<Customer> {
        let customer = Customer {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            name: validate_name("name", &input.name)?,
            phone: normalize_optional(input.phone.as_deref()),
            address: normalize_optional(input.address.as_deref()),
            balance_cents: 0,
            created_at: Utc::now(),
        };

        debug!(tenant_id = %tenant_id, name = %customer.name, "Creating customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, tenant_id, name, phone, address, balance_cents, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.tenant_id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Updates contact details. The balance is only changed by sales,
    /// returns, and payments.
    pub async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        changes: &UpdateCustomer,
    ) -> DbResult<Customer> {
        let name = changes
            .name
            .as_deref()
            .map(|n| validate_name("name", n))
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = COALESCE(?, name),
                phone = COALESCE(?, phone),
                address = COALESCE(?, address)
            WHERE id = ? AND tenant_id = ?
            "#,
        )
        .bind(name)
        .bind(normalize_optional(changes.phone.as_deref()))
        .bind(normalize_optional(changes.address.as_deref()))
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        self.get(tenant_id, id).await
    }

    /// Records a payment against the customer's balance.
    ///
    /// The decrement is conditional on the balance covering the amount, so
    /// two concurrent payments can never drive it below zero.
    ///
    /// ## Errors
    /// - `Domain(Validation)` when `amount_cents <= 0`
    /// - `NotFound` for an unknown customer
    /// - `Domain(PaymentExceedsBalance)` when the amount exceeds the balance
    pub async fn record_payment(
        &self,
        tenant_id: &str,
        customer_id: &str,
        user_id: &str,
        amount_cents: i64,
        notes: Option<&str>,
    ) -> DbResult<(CustomerPayment, Customer)> {
        validate_payment_amount(amount_cents)?;

        let mut tx = self.pool.begin().await?;

        let new_balance: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE customers
            SET balance_cents = balance_cents - ?1
            WHERE id = ?2 AND tenant_id = ?3 AND balance_cents >= ?1
            RETURNING balance_cents
            "#,
        )
        .bind(amount_cents)
        .bind(customer_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?;

        if new_balance.is_none() {
            let balance: Option<i64> = sqlx::query_scalar(
                "SELECT balance_cents FROM customers WHERE id = ? AND tenant_id = ?",
            )
            .bind(customer_id)
            .bind(tenant_id)
            .fetch_optional(&mut *tx)
            .await?;

            return Err(match balance {
                None => DbError::not_found("Customer", customer_id),
                Some(balance) => CoreError::PaymentExceedsBalance {
                    amount: Money::from_cents(amount_cents),
                    balance: Money::from_cents(balance),
                }
                .into(),
            });
        }

        let payment = CustomerPayment {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            customer_id: customer_id.to_string(),
            amount_cents,
            user_id: user_id.to_string(),
            notes: normalize_optional(notes),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO payments (id, tenant_id, customer_id, amount_cents, user_id, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.tenant_id)
        .bind(&payment.customer_id)
        .bind(payment.amount_cents)
        .bind(&payment.user_id)
        .bind(&payment.notes)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ? AND tenant_id = ?");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(customer_id)
            .bind(tenant_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            tenant_id = %tenant_id,
            customer_id = %customer_id,
            amount_cents,
            balance_cents = customer.balance_cents,
            "Customer payment recorded"
        );

        Ok((payment, customer))
    }

    /// Payment history of a customer, newest first.
    pub async fn payments(&self, tenant_id: &str, customer_id: &str) -> DbResult<Vec<PaymentWithUser>> {
        self.get(tenant_id, customer_id).await?;

        let payments = sqlx::query_as::<_, PaymentWithUser>(
            r#"
            SELECT
                p.id, p.tenant_id, p.customer_id, p.amount_cents, p.user_id, p.notes, p.created_at,
                u.full_name AS user_name
            FROM payments p
            LEFT JOIN users u ON u.id = p.user_id
            WHERE p.tenant_id = ? AND p.customer_id = ?
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    async fn with_balance(db: &crate::Database, tenant_id: &str, cents: i64) -> Customer {
        let customer = seed_customer(db, tenant_id, "Doña Rosa").await;
        sqlx::query("UPDATE customers SET balance_cents = ? WHERE id = ?")
            .bind(cents)
            .bind(&customer.id)
            .execute(db.pool())
            .await
            .unwrap();
        customer
    }

    #[tokio::test]
    async fn test_record_payment() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;
        let customer = with_balance(&db, &tenant.id, 10_000).await;

        let (payment, updated) = db
            .customers()
            .record_payment(&tenant.id, &customer.id, &user.id, 4_000, Some("abono"))
            .await
            .unwrap();
        assert_eq!(payment.amount_cents, 4_000);
        assert_eq!(updated.balance_cents, 6_000);

        let history = db.customers().payments(&tenant.id, &customer.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user_name.as_deref(), Some(user.full_name.as_str()));
    }

    #[tokio::test]
    async fn test_payment_cannot_exceed_balance() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;
        let customer = with_balance(&db, &tenant.id, 1_000).await;

        let err = db
            .customers()
            .record_payment(&tenant.id, &customer.id, &user.id, 1_001, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::PaymentExceedsBalance { .. })
        ));

        let unchanged = db.customers().get(&tenant.id, &customer.id).await.unwrap();
        assert_eq!(unchanged.balance_cents, 1_000);
        assert!(db
            .customers()
            .payments(&tenant.id, &customer.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_payment_validation_and_scope() {
        let db = test_db().await;
        let (tenant, user) = store(&db, "Tienda").await;
        let other = seed_tenant(&db, "Otra").await;
        let customer = with_balance(&db, &tenant.id, 1_000).await;

        assert!(matches!(
            db.customers()
                .record_payment(&tenant.id, &customer.id, &user.id, 0, None)
                .await,
            Err(DbError::Domain(_))
        ));
        assert!(matches!(
            db.customers()
                .record_payment(&other.id, &customer.id, &user.id, 100, None)
                .await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_with_debt_ordering() {
        let db = test_db().await;
        let tenant = seed_tenant(&db, "Tienda").await;
        seed_customer(&db, &tenant.id, "Sin deuda").await;
        let small = with_balance(&db, &tenant.id, 500).await;
        let big = with_balance(&db, &tenant.id, 9_000).await;

        let debtors = db.customers().with_debt(&tenant.id).await.unwrap();
        assert_eq!(debtors.len(), 2);
        assert_eq!(debtors[0].id, big.id);
        assert_eq!(debtors[1].id, small.id);
        assert_eq!(db.customers().list(&tenant.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_contact() {
        let db = test_db().await;
        let tenant = seed_tenant(&db, "Tienda").await;
        let customer = seed_customer(&db, &tenant.id, "Juan").await;

        let updated = db
            .customers()
            .update(
                &tenant.id,
                &customer.id,
                &UpdateCustomer {
                    phone: Some("555-1234".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Juan");
        assert_eq!(updated.phone.as_deref(), Some("555-1234"));
    }
}
