//! # Promotion Repository
//!
//! Percentage or fixed discounts with an optional minimum purchase and
//! validity window. Promotions are quoted through the calculator; sales do
//! not apply them on their own.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use invenstore_core::validation::{validate_name, validate_non_negative_cents};
use invenstore_core::{new_id, Promotion, PromotionKind, ValidationError, MAX_PRICE_CENTS};

const PROMOTION_COLUMNS: &str = r#"
    id, tenant_id, name, kind, value, min_purchase_cents,
    starts_at, ends_at, active, created_at
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct NewPromotion {
    pub name: String,
    pub kind: PromotionKind,
    /// Basis points for `percentage` (1000 = 10%), cents for `fixed`.
    pub value: i64,
    #[serde(default)]
    pub min_purchase_cents: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PromotionRepository {
    pool: SqlitePool,
}

impl PromotionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PromotionRepository { pool }
    }

    /// Promotions running at `now`, newest first.
    pub async fn list_running(&self, tenant_id: &str, now: DateTime<Utc>) -> DbResult<Vec<Promotion>> {
        let sql = format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE tenant_id = ? AND active = 1 ORDER BY created_at DESC"
        );

        let promotions = sqlx::query_as::<_, Promotion>(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(promotions.into_iter().filter(|p| p.is_running(now)).collect())
    }

    /// Fetches a promotion only if it is running at `now`.
    pub async fn get_running(
        &self,
        tenant_id: &str,
        id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Promotion> {
        let sql = format!("SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = ? AND tenant_id = ?");

        sqlx::query_as::<_, Promotion>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .filter(|p| p.is_running(now))
            .ok_or_else(|| DbError::not_found("Promotion", id))
    }

    pub async fn create(&self, tenant_id: &str, input: &NewPromotion) -> DbResult<Promotion> {
        let name = validate_name("name", &input.name)?;
        validate_non_negative_cents("min_purchase_cents", input.min_purchase_cents)?;

        let max = match input.kind {
            PromotionKind::Percentage => 10_000,
            PromotionKind::Fixed => MAX_PRICE_CENTS,
        };
        if input.value <= 0 || input.value > max {
            return Err(ValidationError::OutOfRange {
                field: "value".to_string(),
                min: 1,
                max,
            }
            .into());
        }

        if let (Some(start), Some(end)) = (input.starts_at, input.ends_at) {
            if start > end {
                return Err(ValidationError::invalid("starts_at", "must not be after ends_at").into());
            }
        }

        let promotion = Promotion {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            name,
            kind: input.kind,
            value: input.value,
            min_purchase_cents: input.min_purchase_cents,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            active: true,
            created_at: Utc::now(),
        };

        debug!(tenant_id = %tenant_id, name = %promotion.name, "Creating promotion");

        sqlx::query(
            r#"
            INSERT INTO promotions (
                id, tenant_id, name, kind, value, min_purchase_cents,
                starts_at, ends_at, active, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&promotion.id)
        .bind(&promotion.tenant_id)
        .bind(&promotion.name)
        .bind(promotion.kind)
        .bind(promotion.value)
        .bind(promotion.min_purchase_cents)
        .bind(promotion.starts_at)
        .bind(promotion.ends_at)
        .bind(promotion.created_at)
        .execute(&self.pool)
        .await?;

        Ok(promotion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use chrono::Duration;
    use invenstore_core::{CoreError, Money};

    fn ten_percent() -> NewPromotion {
        NewPromotion {
            name: "Buen Fin".into(),
            kind: PromotionKind::Percentage,
            value: 1_000,
            min_purchase_cents: 10_000,
            starts_at: None,
            ends_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_quote() {
        let db = test_db().await;
        let tenant = seed_tenant(&db, "Tienda").await;
        let promo = db.promotions().create(&tenant.id, &ten_percent()).await.unwrap();

        let running = db.promotions().get_running(&tenant.id, &promo.id, Utc::now()).await.unwrap();
        assert_eq!(running.discount_for(Money::from_cents(20_000)).cents(), 2_000);
        assert_eq!(running.discount_for(Money::from_cents(5_000)).cents(), 0);
    }

    #[tokio::test]
    async fn test_expired_promotion_is_hidden() {
        let db = test_db().await;
        let tenant = seed_tenant(&db, "Tienda").await;
        let now = Utc::now();

        let mut input = ten_percent();
        input.starts_at = Some(now - Duration::days(10));
        input.ends_at = Some(now - Duration::days(1));
        let expired = db.promotions().create(&tenant.id, &input).await.unwrap();
        db.promotions().create(&tenant.id, &ten_percent()).await.unwrap();

        let list = db.promotions().list_running(&tenant.id, now).await.unwrap();
        assert_eq!(list.len(), 1);
        assert!(matches!(
            db.promotions().get_running(&tenant.id, &expired.id, now).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_validates_value() {
        let db = test_db().await;
        let tenant = seed_tenant(&db, "Tienda").await;

        let mut input = ten_percent();
        input.value = 10_001;
        let err = db.promotions().create(&tenant.id, &input).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        input.kind = PromotionKind::Fixed;
        input.value = 0;
        assert!(db.promotions().create(&tenant.id, &input).await.is_err());
    }

    #[tokio::test]
    async fn test_other_tenant_cannot_use_promotion() {
        let db = test_db().await;
        let a = seed_tenant(&db, "A").await;
        let b = seed_tenant(&db, "B").await;
        let promo = db.promotions().create(&a.id, &ten_percent()).await.unwrap();

        assert!(matches!(
            db.promotions().get_running(&b.id, &promo.id, Utc::now()).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
