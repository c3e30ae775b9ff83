//! # invenstore-core: Pure Business Logic for InvenStore
//!
//! Domain types, money arithmetic, checkout rules, and input validation.
//! Nothing in this crate touches a database, the network, or the clock of a
//! request; callers pass those values in.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        InvenStore Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Browser frontend (out of tree)                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 apps/server (axum routes)                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ invenstore-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ checkout  │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │ Payment   │  │   rules   │  │   │
//! │  │   │   Sale    │  │ discounts │  │  Split    │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                invenstore-db (SQLite + sqlx)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Money Handling
//! Every amount is an integer number of cents. Floats never touch a price.
//!
//! ```rust
//! use invenstore_core::{Money, PaymentSplit, PaymentType};
//!
//! let total = Money::from_cents(2500).checked_mul_quantity(2).unwrap(); // $50.00
//! let split = PaymentSplit::resolve(PaymentType::Credit, total, None, None).unwrap();
//! assert_eq!(split.credit.cents(), 5000);
//! assert!(split.cash.is_zero());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use checkout::{CheckoutLine, PaymentSplit};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines accepted in a single sale or return.
pub const MAX_LINES_PER_TICKET: usize = 200;

/// Maximum quantity of a single line.
///
/// Catches typos such as 1000 instead of 10 at the counter.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Largest price or amount accepted from a client, in cents.
///
/// At this cap a full ticket (lines × quantity × price) still fits in `i64`.
pub const MAX_PRICE_CENTS: i64 = 100_000_000_000;

/// Stock threshold assigned to products created without one.
pub const DEFAULT_MIN_STOCK: i64 = 5;

/// Presentation assigned to products created without one.
pub const DEFAULT_PRESENTATION: &str = "unidad";

/// Reason recorded on returns submitted without one.
pub const DEFAULT_RETURN_REASON: &str = "Unspecified";

/// Maximum length of free-text notes on a cash-register closing.
pub const MAX_CLOSING_NOTES_LEN: usize = 500;

/// Minimum password length for store users.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Minimum password length for platform super admins.
pub const MIN_ADMIN_PASSWORD_LEN: usize = 8;

/// Length of a store invitation code.
pub const INVITATION_CODE_LEN: usize = 8;

/// Alphabet invitation codes are drawn from.
pub const INVITATION_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Categories every newly registered store starts with.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Bebidas",
    "Snacks",
    "Dulces",
    "Productos de Limpieza",
    "Cuidado Personal",
];

/// Generates a new entity identifier (UUID v4, hyphenated).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
