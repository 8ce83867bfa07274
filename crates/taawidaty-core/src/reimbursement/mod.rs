//! Reimbursement calculation.
//!
//! Splits a public price into the part paid back by an insurance scheme and
//! the part left to the patient:
//!
//! ```text
//! reimbursed   = round2(price * rate / 100)
//! patient_pays = price - reimbursed
//! ```
//!
//! Rounding is half-up (midpoint away from zero) to 2 decimal places. The
//! patient share is derived by subtraction so both parts always add back up
//! to the rounded price.

mod alternatives;

pub use alternatives::*;

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::models::{InsuranceScheme, MedicationRecord, ReimbursementRule};

/// Reimbursement errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReimbursementError {
    #[error("{medication} has no reimbursement data for {scheme}")]
    NotCovered {
        medication: String,
        scheme: InsuranceScheme,
    },

    #[error("Invalid price: {0}")]
    InvalidPrice(Decimal),
}

pub type ReimbursementResult<T> = Result<T, ReimbursementError>;

/// Highest valid reimbursement rate.
pub const MAX_RATE: u8 = 100;

/// Round a monetary amount to 2 decimal places, half-up.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute a reimbursement rule for a price and a rate.
///
/// Negative prices are clamped to zero and rates above 100 to 100. Fails with
/// [`ReimbursementError::InvalidPrice`] when the price is too large to be
/// multiplied by the rate.
pub fn compute_rule(price: Decimal, rate: u8) -> ReimbursementResult<ReimbursementRule> {
    let rate = rate.min(MAX_RATE);
    let price = round_money(price.max(Decimal::ZERO));

    if rate == 0 {
        return Ok(ReimbursementRule {
            rate,
            reimbursed_amount: Decimal::ZERO,
            patient_pays: price,
        });
    }

    let reimbursed = price
        .checked_mul(Decimal::from(rate))
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .map(round_money)
        .ok_or(ReimbursementError::InvalidPrice(price))?
        .min(price);
    Ok(ReimbursementRule {
        rate,
        reimbursed_amount: reimbursed,
        patient_pays: price - reimbursed,
    })
}

/// Reimbursement for a record under a scheme, as stored in the catalog.
pub fn calculate(
    record: &MedicationRecord,
    scheme: InsuranceScheme,
) -> ReimbursementResult<ReimbursementRule> {
    record
        .coverage(scheme)
        .cloned()
        .ok_or_else(|| not_covered(record, scheme))
}

/// Reimbursement for a record under a scheme at a custom price.
///
/// The scheme's stored rate is applied to `override_price`.
pub fn calculate_with_price(
    record: &MedicationRecord,
    scheme: InsuranceScheme,
    override_price: Decimal,
) -> ReimbursementResult<ReimbursementRule> {
    if override_price.is_sign_negative() && !override_price.is_zero() {
        return Err(ReimbursementError::InvalidPrice(override_price));
    }
    let stored = record
        .coverage(scheme)
        .ok_or_else(|| not_covered(record, scheme))?;
    compute_rule(override_price, stored.rate)
}

fn not_covered(record: &MedicationRecord, scheme: InsuranceScheme) -> ReimbursementError {
    ReimbursementError::NotCovered {
        medication: record.name.clone(),
        scheme,
    }
}
