//! # Category Repository
//!
//! Product categories. Deleting a category only hides it: products keep
//! their `category_id` and simply stop showing the category in listings.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use invenstore_core::validation::{normalize_optional, validate_name};
use invenstore_core::{new_id, Category};

/// A category with the number of active products in it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryWithCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub category: Category,
    pub product_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Active categories ordered by name.
    pub async fn list(&self, tenant_id: &str) -> DbResult<Vec<CategoryWithCount>> {
        let categories = sqlx::query_as::<_, CategoryWithCount>(
            r#"
            SELECT
                c.id, c.tenant_id, c.name, c.description, c.active, c.created_at,
                (SELECT COUNT(*) FROM products p
                    WHERE p.category_id = c.id AND p.tenant_id = c.tenant_id AND p.active = 1
                ) AS product_count
            FROM categories c
            WHERE c.tenant_id = ? AND c.active = 1
            ORDER BY c.name
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Fetches an active category.
    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, tenant_id, name, description, active, created_at
            FROM categories
            WHERE id = ? AND tenant_id = ? AND active = 1
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Category", id))
    }

    pub async fn create(&self, tenant_id: &str, input: &NewCategory) -> DbResult<Category> {
        let category = Category {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            name: validate_name("name", &input.name)?,
            description: normalize_optional(input.description.as_deref()),
            active: true,
            created_at: Utc::now(),
        };

        debug!(tenant_id = %tenant_id, name = %category.name, "Creating category");

        sqlx::query(
            r#"
            INSERT INTO categories (id, tenant_id, name, description, active, created_at)
            VALUES (?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&category.id)
        .bind(&category.tenant_id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.created_at)
        .execute(&self.pool)
        .await?;

        Ok(category)
    }

    pub async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        changes: &UpdateCategory,
    ) -> DbResult<Category> {
        let name = changes
            .name
            .as_deref()
            .map(|n| validate_name("name", n))
            .transpose()?;
        let description = normalize_optional(changes.description.as_deref());

        let result = sqlx::query(
            r#"
            UPDATE categories SET
                name = COALESCE(?, name),
                description = COALESCE(?, description)
            WHERE id = ? AND tenant_id = ? AND active = 1
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        self.get(tenant_id, id).await
    }

    pub async fn soft_delete(&self, tenant_id: &str, id: &str) -> DbResult<()> {
        debug!(tenant_id = %tenant_id, category_id = %id, "Soft-deleting category");

        let result = sqlx::query(
            "UPDATE categories SET active = 0 WHERE id = ? AND tenant_id = ? AND active = 1",
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::UpdateProduct;
    use crate::test_support::*;

    #[tokio::test]
    async fn test_list_counts_products() {
        let db = test_db().await;
        let tenant = seed_tenant(&db, "Tienda").await;
        let bebidas = db
            .categories()
            .create(
                &tenant.id,
                &NewCategory {
                    name: "Bebidas".into(),
                    description: None,
                },
            )
            .await
            .unwrap();
        let product = seed_product(&db, &tenant.id, "Refresco", 1800, 10).await;
        db.products()
            .update(
                &tenant.id,
                &product.id,
                &UpdateProduct {
                    category_id: Some(bebidas.id.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let list = db.categories().list(&tenant.id).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].product_count, 1);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_category() {
        let db = test_db().await;
        let tenant = seed_tenant(&db, "Tienda").await;
        let cat = db
            .categories()
            .create(
                &tenant.id,
                &NewCategory {
                    name: "Dulces".into(),
                    description: Some("  ".into()),
                },
            )
            .await
            .unwrap();
        assert!(cat.description.is_none());

        db.categories().soft_delete(&tenant.id, &cat.id).await.unwrap();
        assert!(db.categories().list(&tenant.id).await.unwrap().is_empty());
        assert!(matches!(
            db.categories().soft_delete(&tenant.id, &cat.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_is_tenant_scoped() {
        let db = test_db().await;
        let a = seed_tenant(&db, "A").await;
        let b = seed_tenant(&db, "B").await;
        let cat = db
            .categories()
            .create(
                &a.id,
                &NewCategory {
                    name: "Snacks".into(),
                    description: None,
                },
            )
            .await
            .unwrap();

        let changes = UpdateCategory {
            name: Some("Botanas".into()),
            description: None,
        };
        assert!(matches!(
            db.categories().update(&b.id, &cat.id, &changes).await,
            Err(DbError::NotFound { .. })
        ));

        let updated = db.categories().update(&a.id, &cat.id, &changes).await.unwrap();
        assert_eq!(updated.name, "Botanas");
    }
}
