//! # Domain Types
//!
//! Core domain types used throughout InvenStore.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Tenant ──┬── User (role)                                               │
//! │           ├── Category ◄──── Product (stock, prices)                   │
//! │           ├── Customer (balance) ◄── CustomerPayment                   │
//! │           ├── Sale ──► SaleItem (unit price snapshot)                  │
//! │           ├── SaleReturn ──► ReturnItem                                │
//! │           ├── CashRegisterClosing (one per day)                        │
//! │           └── Promotion                                                │
//! │                                                                         │
//! │  InvitationCode ──► creates a Tenant on registration                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conventions
//! - `id`: UUID v4 string, immutable
//! - `tenant_id`: present on every tenant-owned row, every query filters on it
//! - `*_cents`: integer money, see [`Money`]

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

// =============================================================================
// Payment Type
// =============================================================================

/// How a sale was paid.
///
/// The Spanish names used at the counter (`efectivo`, `fiado`, `mixto`) are
/// accepted on input.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    /// Paid in full at the counter.
    #[serde(alias = "efectivo")]
    Cash,
    /// Put on the customer's tab ("fiado").
    #[serde(alias = "fiado")]
    Credit,
    /// Part cash, part credit.
    #[serde(alias = "mixto")]
    Mixed,
}

impl PaymentType {
    /// Whether this payment type adds to a customer's balance.
    #[inline]
    pub const fn requires_customer(&self) -> bool {
        matches!(self, PaymentType::Credit | PaymentType::Mixed)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "cash",
            PaymentType::Credit => "credit",
            PaymentType::Mixed => "mixed",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Role
// =============================================================================

/// User role. Variants are declared from least to most privileged so that
/// `Ord` expresses the hierarchy.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[serde(alias = "empleado")]
    Employee,
    #[serde(alias = "gerente")]
    Manager,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Returns true when this role is `min` or more privileged.
    #[inline]
    pub fn at_least(&self, min: Role) -> bool {
        *self >= min
    }

    /// Whether a user with this role may create or modify a user with `target`.
    ///
    /// ```text
    /// admin / super_admin ──► any store role
    /// manager             ──► employee only
    /// employee            ──► nobody
    /// ```
    pub fn can_manage(&self, target: Role) -> bool {
        match self {
            Role::SuperAdmin | Role::Admin => target != Role::SuperAdmin,
            Role::Manager => target == Role::Employee,
            Role::Employee => false,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Subscription Status
// =============================================================================

/// Billing state of a tenant. Only `Active` tenants may use the API.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Suspended,
}

impl SubscriptionStatus {
    #[inline]
    pub const fn is_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Suspended => "suspended",
        })
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// Status of a persisted sale. Sales are written only once they complete;
/// a cancelled sale is deleted rather than kept with another status.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    #[default]
    Completed,
}

// =============================================================================
// Promotion Kind
// =============================================================================

/// How a promotion's `value` is interpreted.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromotionKind {
    /// `value` is basis points off the subtotal (1000 = 10%).
    Percentage,
    /// `value` is cents off the subtotal.
    Fixed,
}

// =============================================================================
// Tenant
// =============================================================================

/// A store: the unit of data isolation.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub owner_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub subscription_status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// User
// =============================================================================

/// A store user. The password hash never leaves the database crate.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub tenant_id: String,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Category
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this product belongs to.
    pub tenant_id: String,

    /// Optional category; cleared if the category row is removed.
    pub category_id: Option<String>,

    /// Display name shown to the cashier and on tickets.
    pub name: String,

    /// Barcode (EAN-13, UPC-A, or a store-specific code). Unique per tenant.
    pub barcode: Option<String>,

    /// Purchase cost per unit, for profit reports.
    pub cost_price_cents: i64,

    /// Shelf price per unit.
    pub sale_price_cents: i64,

    /// Units on hand. Never negative.
    pub stock: i64,

    /// Low-stock alert threshold.
    pub min_stock: i64,

    /// Packaging label ("unidad", "caja", "paquete", ...).
    pub presentation: String,

    /// Unit of measure ("unit", "kg", "l", ...).
    pub unit_type: Option<String>,

    pub units_per_pack: Option<i64>,
    pub pack_price_cents: Option<i64>,
    pub wholesale_quantity: Option<i64>,
    pub wholesale_price_cents: Option<i64>,

    /// Whether product is active (soft delete).
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the sale price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }

    /// Returns the cost price as Money.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    /// Checks whether `quantity` units can be sold from current stock.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.active && self.stock >= quantity
    }

    /// Whether stock has fallen to the alert threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer who may buy on credit.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Credit owed to the store. Never negative.
    pub balance_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

/// A payment a customer made against their balance.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerPayment {
    pub id: String,
    pub tenant_id: String,
    pub customer_id: String,
    pub amount_cents: i64,
    pub user_id: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// A completed sale header.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub customer_id: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub payment_type: PaymentType,
    pub cash_amount_cents: i64,
    pub credit_amount_cents: i64,
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A sale line. The unit price is a snapshot taken when the sale was made.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

// =============================================================================
// Returns
// =============================================================================

/// A return header: goods coming back into stock.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleReturn {
    pub id: String,
    pub tenant_id: String,
    pub sale_id: Option<String>,
    pub customer_id: Option<String>,
    pub reason: String,
    pub total_cents: i64,
    pub processed_by: String,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnItem {
    pub id: String,
    pub return_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

// =============================================================================
// Cash Register Closing
// =============================================================================

/// End-of-day reconciliation. At most one per tenant per date.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashRegisterClosing {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub closing_date: NaiveDate,
    pub expected_cash_cents: i64,
    pub actual_cash_cents: i64,
    /// `actual - expected`: positive means a surplus in the drawer.
    pub difference_cents: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Invitation Code
// =============================================================================

/// A one-time code that lets a new store register itself.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationCode {
    pub id: String,
    pub code: String,
    pub store_name: String,
    pub owner_name: String,
    pub owner_phone: Option<String>,
    pub owner_address: Option<String>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    /// Tenant created from this code, once used.
    pub tenant_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl InvitationCode {
    /// A code is redeemable when unused and not past its expiry.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expires_at.map_or(true, |exp| exp > now)
    }
}

// =============================================================================
// Promotion
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub kind: PromotionKind,
    /// Basis points for `Percentage`, cents for `Fixed`.
    pub value: i64,
    pub min_purchase_cents: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Promotion {
    /// Whether the promotion applies at `now`.
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.starts_at.map_or(true, |s| s <= now)
            && self.ends_at.map_or(true, |e| e >= now)
    }

    /// Discount this promotion grants on `subtotal`.
    ///
    /// Below the minimum purchase the discount is zero. The discount never
    /// exceeds the subtotal.
    pub fn discount_for(&self, subtotal: Money) -> Money {
        if subtotal.cents() < self.min_purchase_cents {
            return Money::zero();
        }

        let discount = match self.kind {
            PromotionKind::Percentage => {
                subtotal.percentage_of(self.value.clamp(0, 10_000) as u32)
            }
            PromotionKind::Fixed => Money::from_cents(self.value.max(0)),
        };

        discount.min(subtotal)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_payment_type_aliases() {
        let t: PaymentType = serde_json::from_str("\"fiado\"").unwrap();
        assert_eq!(t, PaymentType::Credit);
        let t: PaymentType = serde_json::from_str("\"mixto\"").unwrap();
        assert_eq!(t, PaymentType::Mixed);
        let t: PaymentType = serde_json::from_str("\"cash\"").unwrap();
        assert_eq!(t, PaymentType::Cash);
        assert!(serde_json::from_str::<PaymentType>("\"card\"").is_err());

        assert_eq!(serde_json::to_string(&PaymentType::Credit).unwrap(), "\"credit\"");
    }

    #[test]
    fn test_payment_type_requires_customer() {
        assert!(!PaymentType::Cash.requires_customer());
        assert!(PaymentType::Credit.requires_customer());
        assert!(PaymentType::Mixed.requires_customer());
    }

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::Admin.at_least(Role::Manager));
        assert!(Role::Manager.at_least(Role::Manager));
        assert!(!Role::Employee.at_least(Role::Manager));
        assert!(Role::SuperAdmin.at_least(Role::Admin));

        let r: Role = serde_json::from_str("\"gerente\"").unwrap();
        assert_eq!(r, Role::Manager);
    }

    #[test]
    fn test_role_can_manage() {
        assert!(Role::Admin.can_manage(Role::Manager));
        assert!(Role::Admin.can_manage(Role::Admin));
        assert!(Role::Manager.can_manage(Role::Employee));
        assert!(!Role::Manager.can_manage(Role::Manager));
        assert!(!Role::Manager.can_manage(Role::Admin));
        assert!(!Role::Employee.can_manage(Role::Employee));
        assert!(!Role::Admin.can_manage(Role::SuperAdmin));
    }

    fn promotion(kind: PromotionKind, value: i64, min: i64) -> Promotion {
        Promotion {
            id: "p".into(),
            tenant_id: "t".into(),
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
    fn test_promotion_discount() {
        let pct = promotion(PromotionKind::Percentage, 1000, 0);
        assert_eq!(pct.discount_for(Money::from_cents(5000)).cents(), 500);

        let fixed = promotion(PromotionKind::Fixed, 2000, 10000);
        assert!(fixed.discount_for(Money::from_cents(9999)).is_zero());
        assert_eq!(fixed.discount_for(Money::from_cents(10000)).cents(), 2000);

        let too_big = promotion(PromotionKind::Fixed, 9000, 0);
        assert_eq!(too_big.discount_for(Money::from_cents(5000)).cents(), 5000);
    }

    #[test]
    fn test_promotion_window() {
        let now = Utc::now();
        let mut p = promotion(PromotionKind::Fixed, 100, 0);
        assert!(p.is_running(now));

        p.ends_at = Some(now - Duration::days(1));
        assert!(!p.is_running(now));

        p.ends_at = None;
        p.starts_at = Some(now + Duration::days(1));
        assert!(!p.is_running(now));
    }

    #[test]
    fn test_invitation_redeemable() {
        let now = Utc::now();
        let mut code = InvitationCode {
            id: "i".into(),
            code: "ABCD1234".into(),
            store_name: "Tienda".into(),
            owner_name: "Ana".into(),
            owner_phone: None,
            owner_address: None,
            used: false,
            used_at: None,
            tenant_id: None,
            expires_at: Some(now + Duration::days(30)),
            created_at: now,
        };
        assert!(code.is_redeemable(now));

        code.expires_at = Some(now - Duration::seconds(1));
        assert!(!code.is_redeemable(now));

        code.expires_at = None;
        code.used = true;
        assert!(!code.is_redeemable(now));
    }
}
