//! Loading accounts, vouchers and rate plans created outside the node.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::path::Path;

use voucherpay_core::{Account, AccountNumber, RatePlan, TransferVoucher, Units, VoucherCode};

use crate::storage::RocksLedger;

/// A seed file.
///
/// ```toml
/// [[plans]]
/// id = "basic"
/// name = "Basic"
/// amount = "5.00"
/// fixed_amount = true
/// quantity = 500
/// valid_months = 1
///
/// [[accounts]]
/// number = 42
///
/// [[vouchers]]
/// code = "1234567890"
/// account = 42
/// expires_at = "2030-01-01T00:00:00"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub plans: Vec<RatePlan>,
    #[serde(default)]
    pub accounts: Vec<AccountSeed>,
    #[serde(default)]
    pub vouchers: Vec<VoucherSeed>,
}

#[derive(Debug, Deserialize)]
pub struct AccountSeed {
    pub number: AccountNumber,
    #[serde(default)]
    pub balance: Units,
    #[serde(default)]
    pub max_balance: Units,
    #[serde(default)]
    pub valid_until: Option<NaiveDateTime>,
}

/// A voucher is issued against the account's balance at seeding time.
#[derive(Debug, Deserialize)]
pub struct VoucherSeed {
    pub code: VoucherCode,
    pub account: AccountNumber,
    pub expires_at: NaiveDateTime,
}

/// Records written by [`SeedFile::apply`]. Accounts and vouchers already
/// in the ledger are counted as skipped.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub plans: usize,
    pub accounts: usize,
    pub vouchers: usize,
    pub skipped: usize,
}

impl SeedFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed file {}", path.display()))?;
        let seed = toml::from_str(&contents)
            .with_context(|| format!("parsing seed file {}", path.display()))?;
        Ok(seed)
    }

    /// Write the seed into the ledger. Plans are replaced. Accounts and
    /// vouchers are only inserted, so applying the same file on every start
    /// never resets a balance or a settled voucher.
    pub fn apply(&self, ledger: &RocksLedger) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();

        for plan in &self.plans {
            ledger.put_plan(plan)?;
            summary.plans += 1;
        }

        for seed in &self.accounts {
            let account = Account {
                number: seed.number,
                balance: seed.balance,
                max_balance: seed.max_balance.max(seed.balance),
                valid_until: seed.valid_until,
            };
            if ledger.insert_account(&account)? {
                summary.accounts += 1;
            } else {
                tracing::debug!(account = %seed.number, "account exists, not seeded");
                summary.skipped += 1;
            }
        }

        for seed in &self.vouchers {
            let account = ledger.account(seed.account)?.with_context(|| {
                format!("voucher {} names unknown account {}", seed.code, seed.account)
            })?;
            let voucher = TransferVoucher::issue(seed.code.clone(), &account, seed.expires_at);
            if ledger.insert_voucher(&voucher)? {
                summary.vouchers += 1;
            } else {
                tracing::debug!(voucher = %seed.code, "voucher exists, not seeded");
                summary.skipped += 1;
            }
        }

        tracing::info!(
            plans = summary.plans,
            accounts = summary.accounts,
            vouchers = summary.vouchers,
            skipped = summary.skipped,
            "seed data loaded"
        );
        Ok(summary)
    }
}
