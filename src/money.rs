//! Conversions between decimal amounts of money and the integer cents stored in the database.
//!
//! Amounts are exact decimals with at most two fractional digits. Storing them as integer
//! cents keeps sums exact in SQL as well as in Rust.

use rust_decimal::{Decimal, prelude::ToPrimitive};

use crate::Error;

const CENTS_PER_UNIT: Decimal = Decimal::ONE_HUNDRED;

/// Convert `amount` to whole cents.
///
/// # Errors
///
/// Returns [Error::Validation] if `amount` has more than two decimal places or does not fit
/// in an `i64` once converted to cents.
pub fn to_cents(amount: Decimal) -> Result<i64, Error> {
    if amount.normalize().scale() > 2 {
        return Err(Error::Validation(format!(
            "{amount} has more than two decimal places"
        )));
    }

    amount
        .checked_mul(CENTS_PER_UNIT)
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| Error::Validation(format!("{amount} is too large")))
}

/// Convert whole cents read from the database into an amount with two decimal places.
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Read the cents stored in column `index` of `row` as an amount.
pub fn get_amount(row: &rusqlite::Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    row.get::<_, i64>(index).map(from_cents)
}

/// Check that `amount` is strictly positive.
///
/// `field` names the request field in the error message.
pub fn require_positive(amount: Decimal, field: &str) -> Result<(), Error> {
    if amount <= Decimal::ZERO {
        return Err(Error::Validation(format!("{field} must be greater than zero")));
    }

    Ok(())
}

/// Check that `amount` is zero or more.
pub fn require_non_negative(amount: Decimal, field: &str) -> Result<(), Error> {
    if amount < Decimal::ZERO {
        return Err(Error::Validation(format!("{field} cannot be negative")));
    }

    Ok(())
}
