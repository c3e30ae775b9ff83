//! # Validation Module
//!
//! Input validation utilities for InvenStore.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request deserialization (serde)                              │
//! │  ├── Types, enums, required JSON fields                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Empty strings, lengths, ranges, formats                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE constraints (barcode, username, closing date)              │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use invenstore_core::validation::{validate_name, validate_quantity};
//!
//! assert!(validate_name("name", "Coca-Cola 500ml").is_ok());
//! assert!(validate_quantity(0).is_err());
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::{
    INVITATION_CODE_ALPHABET, INVITATION_CODE_LEN, MAX_CLOSING_NOTES_LEN, MAX_ITEM_QUANTITY,
    MAX_PRICE_CENTS, MIN_ADMIN_PASSWORD_LEN, MIN_PASSWORD_LEN,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (product, category, customer, store, person).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
///
/// ## Returns
/// The trimmed name.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(name.to_string())
}

/// Trims an optional free-text field; blank becomes `None`.
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Validates a login name.
///
/// ## Rules
/// - 3 to 50 characters
/// - Letters, digits, `.`, `_`, `-` only
pub fn validate_username(username: &str) -> ValidationResult<String> {
    let username = username.trim();

    if username.is_empty() {
        return Err(ValidationError::required("username"));
    }

    if username.chars().count() < 3 {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: 3,
        });
    }

    if username.chars().count() > 50 {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: 50,
        });
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ValidationError::invalid(
            "username",
            "must contain only letters, numbers, dots, hyphens, and underscores",
        ));
    }

    Ok(username.to_string())
}

/// Validates a new password. Only the length is enforced.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    check_password_len(password, MIN_PASSWORD_LEN)
}

/// Validates a new super admin password (at least [`MIN_ADMIN_PASSWORD_LEN`]).
pub fn validate_admin_password(password: &str) -> ValidationResult<()> {
    check_password_len(password, MIN_ADMIN_PASSWORD_LEN)
}

fn check_password_len(password: &str, min: usize) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::required("password"));
    }

    if password.chars().count() < min {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min,
        });
    }

    Ok(())
}

/// Validates a barcode.
///
/// ## Rules
/// - 1 to 64 characters, no whitespace
pub fn validate_barcode(barcode: &str) -> ValidationResult<String> {
    let barcode = barcode.trim();

    if barcode.is_empty() {
        return Err(ValidationError::required("barcode"));
    }

    if barcode.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "barcode".to_string(),
            max: 64,
        });
    }

    if barcode.chars().any(char::is_whitespace) {
        return Err(ValidationError::invalid("barcode", "must not contain spaces"));
    }

    Ok(barcode.to_string())
}

/// Validates closing notes (at most 500 characters).
pub fn validate_closing_notes(notes: &str) -> ValidationResult<()> {
    if notes.chars().count() > MAX_CLOSING_NOTES_LEN {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_CLOSING_NOTES_LEN,
        });
    }

    Ok(())
}

/// Normalizes and validates an invitation code.
///
/// Codes are case-insensitive on input and stored uppercase.
///
/// ```rust
/// use invenstore_core::validation::normalize_invitation_code;
///
/// assert_eq!(normalize_invitation_code(" ab12cd34 ").unwrap(), "AB12CD34");
/// assert!(normalize_invitation_code("short").is_err());
/// ```
pub fn normalize_invitation_code(code: &str) -> ValidationResult<String> {
    let code = code.trim().to_uppercase();

    if code.is_empty() {
        return Err(ValidationError::required("code"));
    }

    if code.len() != INVITATION_CODE_LEN
        || !code.bytes().all(|b| INVITATION_CODE_ALPHABET.contains(&b))
    {
        return Err(ValidationError::invalid(
            "code",
            format!("must be {} letters or digits", INVITATION_CODE_LEN),
        ));
    }

    Ok(code)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price or amount in cents that may be zero.
///
/// Accepts `0..=MAX_PRICE_CENTS`.
///
/// ```rust
/// use invenstore_core::validation::validate_non_negative_cents;
///
/// assert!(validate_non_negative_cents("sale_price", 1099).is_ok());
/// assert!(validate_non_negative_cents("sale_price", 0).is_ok());
/// assert!(validate_non_negative_cents("sale_price", -100).is_err());
/// assert!(validate_non_negative_cents("sale_price", i64::MAX).is_err());
/// ```
pub fn validate_non_negative_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a payment amount in cents (must be > 0).
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 1,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a stock level or threshold (must be >= 0).
pub fn validate_stock(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Clamps a caller-supplied page size into `1..=max`, using `default` when absent.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}

// =============================================================================
// Date Validators
// =============================================================================

/// Validates that an optional date range is ordered.
pub fn validate_date_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> ValidationResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(ValidationError::invalid(
                "start_date",
                "must not be after end_date",
            ));
        }
    }

    Ok(())
}

/// Requires both ends of a date range, for reports that need one.
pub fn require_date_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> ValidationResult<(NaiveDate, NaiveDate)> {
    let start = start.ok_or_else(|| ValidationError::required("start_date"))?;
    let end = end.ok_or_else(|| ValidationError::required("end_date"))?;
    validate_date_range(Some(start), Some(end))?;
    Ok((start, end))
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ```rust
/// use invenstore_core::validation::validate_uuid;
///
/// assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }

    uuid::Uuid::parse_str(id)
        .map_err(|_| ValidationError::invalid(field, "must be a valid UUID"))?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
