use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use voucherpay_core::{AccountNumber, ManualTerms, PaymentChannel, PlanId, Units, VoucherCode};

/// Unique identifier for a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SettlementId(pub Uuid);

impl SettlementId {
    /// Create a new settlement ID (UUID v7, time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SettlementId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SettlementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a voucher is settled against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementTerms {
    /// A stored rate plan.
    Plan(PlanId),
    /// Operator-supplied terms, no rate plan involved.
    Manual(ManualTerms),
}

/// A request to settle one voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub voucher: VoucherCode,
    pub terms: SettlementTerms,
    /// Amount paid, required by variable-amount terms.
    #[serde(default)]
    pub supplied_amount: Option<String>,
    pub channel: PaymentChannel,
}

/// The single atomic write that settles a voucher.
///
/// Applied only if the voucher is still unused and the account balance is
/// still `expected_balance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleCommit {
    pub voucher: VoucherCode,
    pub account: AccountNumber,
    pub expected_balance: Units,
    pub new_balance: Units,
    pub new_max_balance: Units,
    pub new_valid_until: NaiveDateTime,
}

/// Result of a conditional commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Voucher flipped to used and account updated.
    Committed,
    /// Voucher was already used; nothing written.
    VoucherUsed,
    /// Voucher or account record is gone; nothing written.
    Missing,
    /// Account balance moved since the credit was computed; nothing written.
    AccountChanged,
}

/// Proof that a settlement completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub settlement_id: SettlementId,
    pub voucher: VoucherCode,
    pub account: AccountNumber,
    pub channel: PaymentChannel,
    /// Plan the voucher was settled against (`manual` for ad-hoc terms).
    pub plan: PlanId,
    pub credited_units: Units,
    pub new_balance: Units,
    pub new_max_balance: Units,
    pub valid_until: NaiveDateTime,
    pub settled_at: DateTime<Utc>,
}
