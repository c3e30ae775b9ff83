//! # Error Types
//!
//! Domain errors for InvenStore business logic.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Hierarchy                                 │
//! │                                                                         │
//! │  CoreError (business rule violated)                                    │
//! │  ├── ProductNotFound / CustomerNotFound / SaleNotFound                  │
//! │  ├── InsufficientStock { product, available, requested }               │
//! │  ├── EmptyTicket / TooManyLines                                        │
//! │  ├── CustomerRequired { payment_type }                                 │
//! │  ├── PaymentMismatch { total, cash, credit }                           │
//! │  ├── PaymentExceedsBalance { amount, balance }                         │
//! │  └── Validation(ValidationError)                                       │
//! │                                                                         │
//! │  ValidationError (bad input shape)                                     │
//! │  ├── Required / TooShort / TooLong                                     │
//! │  ├── OutOfRange / MustBePositive                                       │
//! │  └── InvalidFormat / NotAllowed                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;
use crate::types::PaymentType;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// All of these are client errors: the request can be corrected and resent.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product does not exist in the tenant, or was soft-deleted.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Customer does not exist in the tenant.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Sale does not exist in the tenant.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Requested quantity exceeds current stock.
    ///
    /// ## User Workflow
    /// ```text
    /// Ticket line (qty: 6)
    ///      │
    ///      ▼
    /// Conditional decrement fails: available=5
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Coca-Cola 500ml", available: 5, requested: 6 }
    ///      │
    ///      ▼
    /// Whole sale rolls back, stock stays 5
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// A sale or return was submitted without lines.
    #[error("At least one item is required")]
    EmptyTicket,

    /// A sale or return carries more lines than allowed.
    #[error("A ticket cannot have more than {max} lines")]
    TooManyLines { max: usize },

    /// Credit and mixed payments must name a customer.
    #[error("A customer is required for {payment_type} payments")]
    CustomerRequired { payment_type: PaymentType },

    /// Mixed payment amounts do not add up to the sale total.
    #[error("Cash ({cash}) plus credit ({credit}) must equal the total ({total})")]
    PaymentMismatch {
        total: Money,
        cash: Money,
        credit: Money,
    },

    /// A sale with returns against it cannot be cancelled; the returned
    /// units and credit were already reversed.
    #[error("Sale {0} has returns and cannot be cancelled")]
    SaleHasReturns(String),

    /// A customer payment larger than what the customer owes.
    #[error("Payment of {amount} exceeds outstanding balance of {balance}")]
    PaymentExceedsBalance { amount: Money, balance: Money },

    /// Validation error (wraps ValidationError).
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised at the request boundary before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::InvalidFormat`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Coca-Cola 500ml".to_string(),
            available: 5,
            requested: 6,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Coca-Cola 500ml: available 5, requested 6"
        );

        let err = CoreError::CustomerRequired {
            payment_type: PaymentType::Credit,
        };
        assert_eq!(err.to_string(), "A customer is required for credit payments");
    }

    #[test]
    fn test_mismatch_message_uses_money_display() {
        let err = CoreError::PaymentMismatch {
            total: Money::from_cents(10000),
            cash: Money::from_cents(4000),
            credit: Money::from_cents(5000),
        };
        assert_eq!(
            err.to_string(),
            "Cash ($40.00) plus credit ($50.00) must equal the total ($100.00)"
        );
    }

    #[test]
    fn test_validation_error_conversion() {
        let validation_err = ValidationError::required("name");
        let core_err: CoreError = validation_err.into();
        assert_eq!(core_err.to_string(), "name is required");
    }
}
