//! Balance credit and validity extension for a settlement.

use chrono::{Days, Months, NaiveDateTime, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::{RatePlan, Units};

/// What a settlement adds to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    /// Units to add to the balance.
    pub units: Units,
    /// New balance validity.
    pub valid_until: NaiveDateTime,
}

/// Parse a customer-supplied amount.
///
/// Accepts plain positive decimals only (`"3"`, `"2.50"`): no sign, no
/// exponent, no thousands separators, not zero.
pub fn parse_amount(raw: &str) -> Result<Decimal, CoreError> {
    let trimmed = raw.trim();
    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (trimmed, None),
    };
    let digits_ok = !int_part.is_empty()
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && frac_part.map_or(true, |f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()));
    if !digits_ok {
        return Err(CoreError::InvalidAmount(format!("not a positive number: {raw:?}")));
    }
    let amount = Decimal::from_str(trimmed)
        .map_err(|e| CoreError::InvalidAmount(format!("{raw:?}: {e}")))?;
    if amount.is_zero() {
        return Err(CoreError::InvalidAmount("amount must be greater than zero".into()));
    }
    Ok(amount)
}

/// Units credited for a plan.
///
/// Fixed plans credit exactly `plan.quantity` and ignore the amount.
/// Variable plans credit `amount * quantity`, truncated toward zero.
pub fn credited_units(plan: &RatePlan, supplied_amount: Option<&str>) -> Result<Units, CoreError> {
    if plan.fixed_amount {
        return Ok(plan.quantity);
    }
    let raw = supplied_amount
        .ok_or_else(|| CoreError::InvalidAmount("variable plan requires an amount".into()))?;
    let amount = parse_amount(raw)?;
    amount
        .checked_mul(Decimal::from(plan.quantity))
        .map(|product| product.trunc())
        .and_then(|units| units.to_u64())
        .ok_or_else(|| CoreError::InvalidAmount(format!("{raw:?} credits more units than an account can hold")))
}

/// Extend a validity window from `now`.
///
/// Months are added first, then days. When the target month is shorter
/// than the current day of month, the day is clamped to the month's last
/// day (Jan 31 + 1 month = Feb 28/29). Hour and minute are kept, seconds
/// and below are zeroed.
pub fn extend_validity(
    now: NaiveDateTime,
    valid_months: u32,
    valid_days: u32,
) -> Result<NaiveDateTime, CoreError> {
    now.checked_add_months(Months::new(valid_months))
        .and_then(|t| t.checked_add_days(Days::new(u64::from(valid_days))))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .ok_or(CoreError::ExpiryOverflow)
}

/// Compute the credit a settlement under `plan` grants at `now`.
pub fn compute_credit(
    plan: &RatePlan,
    supplied_amount: Option<&str>,
    now: NaiveDateTime,
) -> Result<Credit, CoreError> {
    let units = credited_units(plan, supplied_amount)?;
    let valid_until = extend_validity(now, plan.valid_months, plan.valid_days)?;
    tracing::debug!(plan = %plan.id, units, %valid_until, "computed credit");
    Ok(Credit { units, valid_until })
}
