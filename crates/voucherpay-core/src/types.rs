use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Credited quantity in the ledger's abstract unit.
pub type Units = u64;

/// Shortest accepted voucher code.
pub const VOUCHER_CODE_MIN_LEN: usize = 10;
/// Longest accepted voucher code.
pub const VOUCHER_CODE_MAX_LEN: usize = 20;
/// Longest accepted plan identifier.
pub const PLAN_ID_MAX_LEN: usize = 64;

/// A one-time transfer voucher code: 10 to 20 ASCII digits.
///
/// Construction through [`VoucherCode::parse`] is the syntactic check every
/// caller performs before a code reaches the validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VoucherCode(String);

impl VoucherCode {
    /// Validate and wrap a voucher code.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let len = raw.len();
        if !(VOUCHER_CODE_MIN_LEN..=VOUCHER_CODE_MAX_LEN).contains(&len)
            || !raw.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(CoreError::MalformedVoucherCode(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// The code as entered.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The code in blocks of four digits joined by `-`, as printed on
    /// bank transfer forms.
    pub fn grouped(&self) -> String {
        self.0
            .as_bytes()
            .chunks(4)
            .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl TryFrom<String> for VoucherCode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VoucherCode> for String {
    fn from(code: VoucherCode) -> Self {
        code.0
    }
}

impl FromStr for VoucherCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VoucherCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Externally assigned account number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountNumber(pub u64);

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rate plan identifier: 1 to 64 ASCII alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlanId(String);

impl PlanId {
    /// Validate and wrap a plan identifier.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        if raw.is_empty()
            || raw.len() > PLAN_ID_MAX_LEN
            || !raw.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(CoreError::MalformedPlanId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PlanId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PlanId> for String {
    fn from(id: PlanId) -> Self {
        id.0
    }
}

impl FromStr for PlanId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A prepaid account credited by settlements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account number.
    pub number: AccountNumber,
    /// Current balance.
    pub balance: Units,
    /// Highest balance the account has ever held.
    pub max_balance: Units,
    /// Balance validity; `None` until the first settlement.
    pub valid_until: Option<NaiveDateTime>,
}

impl Account {
    /// A fresh account with an empty balance.
    pub fn new(number: AccountNumber) -> Self {
        Self {
            number,
            balance: 0,
            max_balance: 0,
            valid_until: None,
        }
    }
}

/// A one-time transfer voucher issued for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferVoucher {
    /// Voucher code.
    pub code: VoucherCode,
    /// Owning account.
    pub account: AccountNumber,
    /// Account balance at the time the voucher was issued.
    pub balance_snapshot: Units,
    /// Instant after which the voucher can no longer be settled.
    pub expires_at: NaiveDateTime,
    /// Set once, by the settlement that consumes the voucher.
    pub used: bool,
}

impl TransferVoucher {
    /// Issue an unused voucher against the account's current balance.
    pub fn issue(code: VoucherCode, account: &Account, expires_at: NaiveDateTime) -> Self {
        Self {
            code,
            account: account.number,
            balance_snapshot: account.balance,
            expires_at,
            used: false,
        }
    }
}

/// A priced offering defining credited quantity and validity extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePlan {
    pub id: PlanId,
    /// Display name. Free text, never interpreted.
    pub name: String,
    /// Price of the plan, or the price per quantity for variable plans.
    pub amount: Decimal,
    /// Whether the credited quantity is fixed regardless of the amount paid.
    pub fixed_amount: bool,
    /// Units credited per purchase (fixed) or per unit of amount (variable).
    pub quantity: Units,
    #[serde(default)]
    pub valid_days: u32,
    #[serde(default)]
    pub valid_months: u32,
}

/// Ad-hoc settlement terms used by operators confirming a payment by hand
/// without a stored rate plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualTerms {
    pub quantity: Units,
    pub fixed_amount: bool,
    #[serde(default)]
    pub valid_days: u32,
    #[serde(default)]
    pub valid_months: u32,
}

impl ManualTerms {
    /// Identifier used for the synthetic plan built from manual terms.
    pub const PLAN_ID: &'static str = "manual";

    /// View these terms as a plan so the calculator treats both alike.
    pub fn to_plan(&self) -> RatePlan {
        RatePlan {
            id: PlanId(Self::PLAN_ID.to_string()),
            name: Self::PLAN_ID.to_string(),
            amount: Decimal::ZERO,
            fixed_amount: self.fixed_amount,
            quantity: self.quantity,
            valid_days: self.valid_days,
            valid_months: self.valid_months,
        }
    }
}

/// The channel through which a payment was confirmed.
///
/// Every channel ends in the same settlement call; the channel is carried
/// along for logging and the receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    /// Operator or test confirmation.
    Manual,
    /// Operator confirming an incoming bank transfer.
    BankTransferManual,
    /// Verified notification from the external payment provider.
    ProviderNotified,
}

impl fmt::Display for PaymentChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::BankTransferManual => write!(f, "bank_transfer_manual"),
            Self::ProviderNotified => write!(f, "provider_notified"),
        }
    }
}

/// Purpose line a customer writes on a bank transfer for this voucher and plan.
pub fn bank_transfer_reference(code: &VoucherCode, plan: &PlanId) -> String {
    format!("{}-{}", code.grouped(), plan)
}
