//! # Product Repository
//!
//! Catalog operations for products.
//!
//! ## Key Operations
//! - Listing (optionally by category) and barcode lookup for the counter
//! - CRUD with soft delete
//! - Low-stock report
//!
//! Stock is never written here after creation except through an explicit
//! update; sales and returns adjust it inside their own transactions
//! ([`SaleRepository`](super::SaleRepository),
//! [`ReturnRepository`](super::ReturnRepository)).
//!
//! ## Soft Delete
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DELETE /api/products/{id}                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE products SET active = 0                                        │
//! │       │                                                                 │
//! │       ├── listings, barcode lookup, new sales: product is gone         │
//! │       └── past sale items, returns, reports: row still joinable        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use invenstore_core::validation::{
    normalize_optional, validate_barcode, validate_name, validate_non_negative_cents,
    validate_stock,
};
use invenstore_core::{new_id, Product, DEFAULT_MIN_STOCK, DEFAULT_PRESENTATION};

const PRODUCT_COLUMNS: &str = r#"
    id, tenant_id, category_id, name, barcode,
    cost_price_cents, sale_price_cents, stock, min_stock,
    presentation, unit_type, units_per_pack, pack_price_cents,
    wholesale_quantity, wholesale_price_cents,
    active, created_at, updated_at
"#;

/// Input for creating a product.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub barcode: Option<String>,
    pub category_id: Option<String>,
    pub cost_price_cents: i64,
    pub sale_price_cents: i64,
    pub stock: Option<i64>,
    pub min_stock: Option<i64>,
    pub presentation: Option<String>,
    pub unit_type: Option<String>,
    pub units_per_pack: Option<i64>,
    pub pack_price_cents: Option<i64>,
    pub wholesale_quantity: Option<i64>,
    pub wholesale_price_cents: Option<i64>,
}

/// Partial update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub barcode: Option<String>,
    pub category_id: Option<String>,
    pub cost_price_cents: Option<i64>,
    pub sale_price_cents: Option<i64>,
    pub stock: Option<i64>,
    pub min_stock: Option<i64>,
    pub presentation: Option<String>,
    pub unit_type: Option<String>,
    pub units_per_pack: Option<i64>,
    pub pack_price_cents: Option<i64>,
    pub wholesale_quantity: Option<i64>,
    pub wholesale_price_cents: Option<i64>,
}

fn validate_optional_cents(field: &str, cents: Option<i64>) -> DbResult<()> {
    if let Some(cents) = cents {
        validate_non_negative_cents(field, cents)?;
    }
    Ok(())
}

fn validate_optional_count(field: &str, value: Option<i64>) -> DbResult<()> {
    if let Some(value) = value {
        validate_stock(field, value)?;
    }
    Ok(())
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let at_counter = repo.by_barcode(&tenant_id, "7501055300075").await?;
/// let reorder = repo.low_stock(&tenant_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists active products ordered by name, optionally within a category.
    pub async fn list(&self, tenant_id: &str, category_id: Option<&str>) -> DbResult<Vec<Product>> {
        debug!(tenant_id = %tenant_id, category_id = ?category_id, "Listing products");

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE tenant_id = ?1 AND active = 1 AND (?2 IS NULL OR category_id = ?2) \
             ORDER BY name"
        );

        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Gets an active product by id.
    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<Product> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ? AND tenant_id = ? AND active = 1"
        );

        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Gets an active product by barcode (scanner lookup).
    pub async fn by_barcode(&self, tenant_id: &str, barcode: &str) -> DbResult<Product> {
        let barcode = barcode.trim();
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = ? AND tenant_id = ? AND active = 1"
        );

        sqlx::query_as::<_, Product>(&sql)
            .bind(barcode)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product with barcode", barcode))
    }

    /// Active products at or below their minimum stock, emptiest first.
    pub async fn low_stock(&self, tenant_id: &str) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE tenant_id = ? AND active = 1 AND stock <= min_stock \
             ORDER BY stock ASC, name"
        );

        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn ensure_category(&self, tenant_id: &str, category_id: &str) -> DbResult<()> {
        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM categories WHERE id = ? AND tenant_id = ? AND active = 1",
        )
        .bind(category_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        exists
            .map(|_| ())
            .ok_or_else(|| DbError::not_found("Category", category_id))
    }

    /// Creates a product.
    ///
    /// ## Defaults
    /// - `stock`: 0
    /// - `min_stock`: [`DEFAULT_MIN_STOCK`]
    /// - `presentation`: [`DEFAULT_PRESENTATION`]
    ///
    /// ## Errors
    /// - `Domain(Validation)` for an empty name or negative prices/counts
    /// - `NotFound` when `category_id` is not an active category of the tenant
    /// - `UniqueViolation { field: "barcode" }` when the barcode is taken in the tenant
    pub async fn create(&self, tenant_id: &str, input: &NewProduct) -> DbResult<Product> {
        let name = validate_name("name", &input.name)?;
        validate_non_negative_cents("cost_price_cents", input.cost_price_cents)?;
        validate_non_negative_cents("sale_price_cents", input.sale_price_cents)?;
        validate_optional_cents("pack_price_cents", input.pack_price_cents)?;
        validate_optional_cents("wholesale_price_cents", input.wholesale_price_cents)?;
        validate_optional_count("stock", input.stock)?;
        validate_optional_count("min_stock", input.min_stock)?;
        validate_optional_count("units_per_pack", input.units_per_pack)?;
        validate_optional_count("wholesale_quantity", input.wholesale_quantity)?;

        let barcode = match normalize_optional(input.barcode.as_deref()) {
            Some(b) => Some(validate_barcode(&b)?),
            None => None,
        };
        let category_id = normalize_optional(input.category_id.as_deref());
        if let Some(category_id) = &category_id {
            self.ensure_category(tenant_id, category_id).await?;
        }

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            category_id,
            name,
            barcode,
            cost_price_cents: input.cost_price_cents,
            sale_price_cents: input.sale_price_cents,
            stock: input.stock.unwrap_or(0),
            min_stock: input.min_stock.unwrap_or(DEFAULT_MIN_STOCK),
            presentation: normalize_optional(input.presentation.as_deref())
                .unwrap_or_else(|| DEFAULT_PRESENTATION.to_string()),
            unit_type: normalize_optional(input.unit_type.as_deref()),
            units_per_pack: input.units_per_pack,
            pack_price_cents: input.pack_price_cents,
            wholesale_quantity: input.wholesale_quantity,
            wholesale_price_cents: input.wholesale_price_cents,
            active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(tenant_id = %tenant_id, name = %product.name, "Inserting product");

        let sql = format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        sqlx::query(&sql)
            .bind(&product.id)
            .bind(&product.tenant_id)
            .bind(&product.category_id)
            .bind(&product.name)
            .bind(&product.barcode)
            .bind(product.cost_price_cents)
            .bind(product.sale_price_cents)
            .bind(product.stock)
            .bind(product.min_stock)
            .bind(&product.presentation)
            .bind(&product.unit_type)
            .bind(product.units_per_pack)
            .bind(product.pack_price_cents)
            .bind(product.wholesale_quantity)
            .bind(product.wholesale_price_cents)
            .bind(product.active)
            .bind(product.created_at)
            .bind(product.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DbError::from(e)
                    .with_duplicate_context("barcode", product.barcode.as_deref().unwrap_or(""))
            })?;

        Ok(product)
    }

    /// Applies a partial update to an active product.
    pub async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        changes: &UpdateProduct,
    ) -> DbResult<Product> {
        let name = changes
            .name
            .as_deref()
            .map(|n| validate_name("name", n))
            .transpose()?;
        validate_optional_cents("cost_price_cents", changes.cost_price_cents)?;
        validate_optional_cents("sale_price_cents", changes.sale_price_cents)?;
        validate_optional_cents("pack_price_cents", changes.pack_price_cents)?;
        validate_optional_cents("wholesale_price_cents", changes.wholesale_price_cents)?;
        validate_optional_count("stock", changes.stock)?;
        validate_optional_count("min_stock", changes.min_stock)?;
        validate_optional_count("units_per_pack", changes.units_per_pack)?;
        validate_optional_count("wholesale_quantity", changes.wholesale_quantity)?;

        let barcode = match normalize_optional(changes.barcode.as_deref()) {
            Some(b) => Some(validate_barcode(&b)?),
            None => None,
        };
        let category_id = normalize_optional(changes.category_id.as_deref());
        if let Some(category_id) = &category_id {
            self.ensure_category(tenant_id, category_id).await?;
        }

        debug!(tenant_id = %tenant_id, product_id = %id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = COALESCE(?, name),
                barcode = COALESCE(?, barcode),
                category_id = COALESCE(?, category_id),
                cost_price_cents = COALESCE(?, cost_price_cents),
                sale_price_cents = COALESCE(?, sale_price_cents),
                stock = COALESCE(?, stock),
                min_stock = COALESCE(?, min_stock),
                presentation = COALESCE(?, presentation),
                unit_type = COALESCE(?, unit_type),
                units_per_pack = COALESCE(?, units_per_pack),
                pack_price_cents = COALESCE(?, pack_price_cents),
                wholesale_quantity = COALESCE(?, wholesale_quantity),
                wholesale_price_cents = COALESCE(?, wholesale_price_cents),
                updated_at = ?
            WHERE id = ? AND tenant_id = ? AND active = 1
            "#,
        )
        .bind(name)
        .bind(&barcode)
        .bind(category_id)
        .bind(changes.cost_price_cents)
        .bind(changes.sale_price_cents)
        .bind(changes.stock)
        .bind(changes.min_stock)
        .bind(normalize_optional(changes.presentation.as_deref()))
        .bind(normalize_optional(changes.unit_type.as_deref()))
        .bind(changes.units_per_pack)
        .bind(changes.pack_price_cents)
        .bind(changes.wholesale_quantity)
        .bind(changes.wholesale_price_cents)
        .bind(Utc::now())
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DbError::from(e).with_duplicate_context("barcode", barcode.as_deref().unwrap_or(""))
        })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get(tenant_id, id).await
    }

    /// Soft-deletes a product by setting `active = 0`.
    ///
    /// Sale and return history keeps pointing at the row.
    pub async fn soft_delete(&self, tenant_id: &str, id: &str) -> DbResult<()> {
        debug!(tenant_id = %tenant_id, product_id = %id, "Soft-deleting product");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET active = 0, updated_at = ?
            WHERE id = ? AND tenant_id = ? AND active = 1
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products in the tenant.
    pub async fn count(&self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE tenant_id = ? AND active = 1",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
