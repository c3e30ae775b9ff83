//! Promotions and discount quotes.
//!
//! `calculate` only quotes; sales are recorded without a discount.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use invenstore_core::validation::validate_non_negative_cents;
use invenstore_core::{Money, Promotion, Role};
use invenstore_db::NewPromotion;

use crate::error::{ApiJson, ApiResult};
use crate::{AppState, Identity};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/calculate", post(calculate))
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub subtotal_cents: i64,
    pub promotion_id: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Quote {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub promotion_id: Option<String>,
    pub promotion_name: Option<String>,
    pub message: String,
}

impl Quote {
    fn without_discount(subtotal: Money, message: impl Into<String>) -> Self {
        Quote {
            subtotal_cents: subtotal.cents(),
            discount_cents: 0,
            total_cents: subtotal.cents(),
            promotion_id: None,
            promotion_name: None,
            message: message.into(),
        }
    }

    /// Applies `promotion`; below its minimum purchase the discount is zero.
    fn with_promotion(subtotal: Money, promotion: &Promotion) -> Self {
        let discount = promotion.discount_for(subtotal);
        let message = if discount.is_zero() {
            format!(
                "Minimum purchase for {} is {}",
                promotion.name,
                Money::from_cents(promotion.min_purchase_cents)
            )
        } else {
            format!("{} applied", promotion.name)
        };

        Quote {
            subtotal_cents: subtotal.cents(),
            discount_cents: discount.cents(),
            total_cents: (subtotal - discount).cents(),
            promotion_id: Some(promotion.id.clone()),
            promotion_name: Some(promotion.name.clone()),
            message,
        }
    }
}

async fn list(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<Vec<Promotion>>> {
    Ok(Json(
        state.db.promotions().list_running(&identity.tenant_id, Utc::now()).await?,
    ))
}

async fn create(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<NewPromotion>,
) -> ApiResult<(StatusCode, Json<Promotion>)> {
    identity.require(Role::Manager)?;
    let promotion = state.db.promotions().create(&identity.tenant_id, &body).await?;
    Ok((StatusCode::CREATED, Json(promotion)))
}

async fn calculate(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<QuoteRequest>,
) -> ApiResult<Json<Quote>> {
    validate_non_negative_cents("subtotal_cents", body.subtotal_cents)?;
    let subtotal = Money::from_cents(body.subtotal_cents);

    let Some(promotion_id) = body.promotion_id.filter(|id| !id.trim().is_empty()) else {
        return Ok(Json(Quote::without_discount(subtotal, "No promotion selected")));
    };

    let promotion = state
        .db
        .promotions()
        .get_running(&identity.tenant_id, &promotion_id, Utc::now())
        .await?;

    Ok(Json(Quote::with_promotion(subtotal, &promotion)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use invenstore_core::PromotionKind;

    fn promotion(kind: PromotionKind, value: i64, min: i64) -> Promotion {
        Promotion {
            id: "p1".into(),
            tenant_id: "t1".into(),
            name: "Promo".into(),
            kind,
            value,
            min_purchase_cents: min,
            starts_at: None,
            ends_at: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_percentage_quote() {
        let quote = Quote::with_promotion(
            Money::from_cents(20_000),
            &promotion(PromotionKind::Percentage, 1_000, 0),
        );
        assert_eq!(quote.discount_cents, 2_000);
        assert_eq!(quote.total_cents, 18_000);
        assert_eq!(quote.promotion_name.as_deref(), Some("Promo"));
    }

    #[test]
    fn test_below_minimum_purchase() {
        let quote = Quote::with_promotion(
            Money::from_cents(5_000),
            &promotion(PromotionKind::Fixed, 1_000, 10_000),
        );
        assert_eq!(quote.discount_cents, 0);
        assert_eq!(quote.total_cents, 5_000);
        assert!(quote.message.contains("Minimum purchase"));
    }
}
