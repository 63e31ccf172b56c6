//! Voucherpay core: vouchers, accounts, rate plans, and the pure decisions
//! made about them (validity verdicts and settlement credit).

pub mod calculator;
pub mod clock;
pub mod error;
pub mod types;
pub mod validator;

pub use calculator::{compute_credit, credited_units, extend_validity, parse_amount, Credit};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::CoreError;
pub use types::{
    bank_transfer_reference, Account, AccountNumber, ManualTerms, PaymentChannel, PlanId,
    RatePlan, TransferVoucher, Units, VoucherCode,
};
pub use validator::{validate, Verdict};
