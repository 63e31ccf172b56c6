//! Voucher validity decision.
//!
//! Pure: callers load the voucher and its account and pass the current
//! time. The answer may change between a check and a later settlement, so
//! settlement re-runs this check and relies on the ledger's conditional
//! commit for the final word.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Account, TransferVoucher};

/// Outcome of a voucher check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The voucher may be settled.
    Valid,
    /// No voucher with this code exists.
    NotFound,
    /// The voucher has already been settled.
    AlreadyUsed,
    /// The owning account changed since the voucher was issued.
    AccountMismatch,
    /// The voucher's expiry has passed.
    Expired,
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Stable numeric code shown to customers next to a rejection.
    pub fn code(&self) -> u8 {
        match self {
            Self::Valid => 0,
            Self::NotFound => 1,
            Self::AlreadyUsed => 2,
            Self::AccountMismatch => 3,
            Self::Expired => 4,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::NotFound => write!(f, "not found"),
            Self::AlreadyUsed => write!(f, "already used"),
            Self::AccountMismatch => write!(f, "account mismatch"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Decide whether a voucher may be settled at `now`.
///
/// Checks run in priority order and the first failure wins. A voucher whose
/// account record is gone counts as an account mismatch.
pub fn validate(
    voucher: Option<&TransferVoucher>,
    account: Option<&Account>,
    now: NaiveDateTime,
) -> Verdict {
    let Some(voucher) = voucher else {
        return Verdict::NotFound;
    };
    if voucher.used {
        return Verdict::AlreadyUsed;
    }
    match account {
        Some(account) if account.number == voucher.account => {
            if account.balance != voucher.balance_snapshot {
                return Verdict::AccountMismatch;
            }
        }
        _ => return Verdict::AccountMismatch,
    }
    if voucher.expires_at < now {
        return Verdict::Expired;
    }
    Verdict::Valid
}
