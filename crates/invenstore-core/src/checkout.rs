//! # Checkout Rules
//!
//! Pure arithmetic and rules behind the sale and return processors:
//! ticket shape checks, line subtotals, and the cash/credit split.
//!
//! ## Payment Split
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  payment_type   cash                    credit                          │
//! │  ────────────   ─────────────────────   ──────────────────────────      │
//! │  cash           total                   0                               │
//! │  credit         0                       total                           │
//! │  mixed          given (or total-credit) given (or total-cash)           │
//! │                                                                         │
//! │  mixed invariant: cash >= 0, credit >= 0, cash + credit == total        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::PaymentType;
use crate::validation::validate_quantity;
use crate::MAX_LINES_PER_TICKET;

// =============================================================================
// Checkout Line
// =============================================================================

/// A priced line of a sale or return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl CheckoutLine {
    /// Line subtotal = unit price × quantity.
    ///
    /// ## Errors
    /// [`ValidationError::OutOfRange`] when the product does not fit in `i64`.
    pub fn subtotal(&self) -> CoreResult<Money> {
        self.unit_price
            .checked_mul_quantity(self.quantity)
            .ok_or_else(|| amount_overflow("subtotal"))
    }
}

/// Sums line subtotals into a ticket total.
pub fn ticket_total(lines: &[CheckoutLine]) -> CoreResult<Money> {
    lines.iter().try_fold(Money::zero(), |total, line| {
        total
            .checked_add(line.subtotal()?)
            .ok_or_else(|| amount_overflow("total"))
    })
}

fn amount_overflow(field: &str) -> CoreError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
    .into()
}

/// Checks the shape of a ticket before any product is loaded.
///
/// ## Rules
/// - At least one line
/// - At most [`MAX_LINES_PER_TICKET`] lines
/// - Every quantity passes [`validate_quantity`]
pub fn check_ticket_shape<I>(quantities: I) -> CoreResult<()>
where
    I: IntoIterator<Item = i64>,
{
    let mut count = 0usize;
    for qty in quantities {
        validate_quantity(qty)?;
        count += 1;
    }

    if count == 0 {
        return Err(CoreError::EmptyTicket);
    }

    if count > MAX_LINES_PER_TICKET {
        return Err(CoreError::TooManyLines {
            max: MAX_LINES_PER_TICKET,
        });
    }

    Ok(())
}

// =============================================================================
// Payment Split
// =============================================================================

/// How a sale total divides between cash received and credit extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSplit {
    pub cash: Money,
    pub credit: Money,
}

impl PaymentSplit {
    /// Derives the split for a sale of `total`.
    ///
    /// `cash` and `credit` are the amounts the caller supplied; they are
    /// only consulted for [`PaymentType::Mixed`]. When only one side of a
    /// mixed payment is given, the other side is the remainder.
    ///
    /// ## Errors
    /// - [`CoreError::PaymentMismatch`] when a mixed split does not add up
    ///   to the total or a side is negative
    /// - [`ValidationError::Required`] when a mixed payment gives neither side
    pub fn resolve(
        payment_type: PaymentType,
        total: Money,
        cash: Option<Money>,
        credit: Option<Money>,
    ) -> CoreResult<Self> {
        let mismatch = |cash: Money, credit: Money| CoreError::PaymentMismatch {
            total,
            cash,
            credit,
        };

        if payment_type == PaymentType::Mixed {
            let given_cash = cash.unwrap_or_default();
            let given_credit = credit.unwrap_or_default();
            if given_cash.is_negative() || given_credit.is_negative() {
                return Err(mismatch(given_cash, given_credit));
            }
        }

        let split = match payment_type {
            PaymentType::Cash => PaymentSplit {
                cash: total,
                credit: Money::zero(),
            },
            PaymentType::Credit => PaymentSplit {
                cash: Money::zero(),
                credit: total,
            },
            PaymentType::Mixed => match (cash, credit) {
                (Some(cash), Some(credit)) => PaymentSplit { cash, credit },
                (Some(cash), None) => PaymentSplit {
                    cash,
                    credit: total
                        .checked_sub(cash)
                        .ok_or_else(|| mismatch(cash, Money::zero()))?,
                },
                (None, Some(credit)) => PaymentSplit {
                    cash: total
                        .checked_sub(credit)
                        .ok_or_else(|| mismatch(Money::zero(), credit))?,
                    credit,
                },
                (None, None) => {
                    return Err(ValidationError::required("cash_amount").into());
                }
            },
        };

        let reconciles = split.cash.checked_add(split.credit) == Some(total);
        if split.cash.is_negative() || split.credit.is_negative() || !reconciles {
            return Err(mismatch(split.cash, split.credit));
        }

        Ok(split)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
