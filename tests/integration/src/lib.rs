//! Shared fixtures for the cross-crate tests.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::sync::Arc;

use voucherpay_core::{
    Account, AccountNumber, FixedClock, PlanId, RatePlan, TransferVoucher, VoucherCode,
};
use voucherpay_settlement::{InMemoryLedger, SettlementEngine};

/// Customer account used by the fixture.
pub const ACCOUNT: AccountNumber = AccountNumber(1001);
/// An unused voucher for [`ACCOUNT`], expiring a day after [`now`].
pub const VOUCHER: &str = "20240131000001";
/// A second unused voucher for the same account.
pub const SECOND_VOUCHER: &str = "20240131000002";
/// A voucher that expired an hour before [`now`].
pub const EXPIRED_VOUCHER: &str = "20240131000003";

/// The fixed instant every fixture clock reports.
pub fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 31)
        .and_then(|d| d.and_hms_opt(10, 0, 0))
        .unwrap_or_default()
}

pub fn code(raw: &str) -> VoucherCode {
    VoucherCode::parse(raw).unwrap_or_else(|e| panic!("fixture code {raw}: {e}"))
}

pub fn plan(id: &str) -> PlanId {
    PlanId::parse(id).unwrap_or_else(|e| panic!("fixture plan {id}: {e}"))
}

/// A ledger, clock and engine wired together.
pub struct Fixture {
    pub ledger: Arc<InMemoryLedger>,
    pub clock: Arc<FixedClock>,
    pub engine: Arc<SettlementEngine>,
}

impl Fixture {
    pub fn new() -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let account = Account::new(ACCOUNT);
        for (raw, expires) in [
            (VOUCHER, now() + chrono::Duration::days(1)),
            (SECOND_VOUCHER, now() + chrono::Duration::days(1)),
            (EXPIRED_VOUCHER, now() - chrono::Duration::hours(1)),
        ] {
            ledger.put_voucher(TransferVoucher::issue(code(raw), &account, expires));
        }
        ledger.put_account(account);

        ledger.put_plan(RatePlan {
            id: plan("month"),
            name: "Flat month".into(),
            amount: Decimal::new(999, 2),
            fixed_amount: true,
            quantity: 500,
            valid_days: 0,
            valid_months: 1,
        });
        ledger.put_plan(RatePlan {
            id: plan("volume"),
            name: "Per megabyte".into(),
            amount: Decimal::ONE,
            fixed_amount: false,
            quantity: 1024,
            valid_days: 30,
            valid_months: 0,
        });

        let clock = Arc::new(FixedClock::new(now()));
        let engine = Arc::new(SettlementEngine::new(ledger.clone(), clock.clone()));
        Self {
            ledger,
            clock,
            engine,
        }
    }

    pub fn balance(&self) -> u64 {
        self.ledger.account(ACCOUNT).map(|a| a.balance).unwrap_or_default()
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}
