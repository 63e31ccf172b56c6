use async_trait::async_trait;
use dashmap::DashMap;
use voucherpay_core::{Account, AccountNumber, PlanId, RatePlan, TransferVoucher, VoucherCode};

use crate::error::StoreError;
use crate::traits::LedgerStore;
use crate::types::{CommitOutcome, SettleCommit};

/// In-memory ledger.
///
/// Used by tests and by nodes running without persistent storage.
/// The conditional commit holds the account entry and then the voucher
/// entry for the duration of the check and write, so concurrent commits
/// on the same voucher or account serialize on those entries.
pub struct InMemoryLedger {
    accounts: DashMap<AccountNumber, Account>,
    vouchers: DashMap<VoucherCode, TransferVoucher>,
    plans: DashMap<PlanId, RatePlan>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            vouchers: DashMap::new(),
            plans: DashMap::new(),
        }
    }

    /// Insert or replace an account.
    pub fn put_account(&self, account: Account) {
        self.accounts.insert(account.number, account);
    }

    /// Insert or replace a voucher.
    pub fn put_voucher(&self, voucher: TransferVoucher) {
        self.vouchers.insert(voucher.code.clone(), voucher);
    }

    /// Insert or replace a rate plan.
    pub fn put_plan(&self, plan: RatePlan) {
        self.plans.insert(plan.id.clone(), plan);
    }

    /// Snapshot of an account, for inspection.
    pub fn account(&self, number: AccountNumber) -> Option<Account> {
        self.accounts.get(&number).map(|a| a.clone())
    }

    /// Snapshot of a voucher, for inspection.
    pub fn voucher(&self, code: &VoucherCode) -> Option<TransferVoucher> {
        self.vouchers.get(code).map(|v| v.clone())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn find_voucher(&self, code: &VoucherCode) -> Result<Option<TransferVoucher>, StoreError> {
        Ok(self.voucher(code))
    }

    async fn find_account(&self, number: AccountNumber) -> Result<Option<Account>, StoreError> {
        Ok(self.account(number))
    }

    async fn find_plan(&self, id: &PlanId) -> Result<Option<RatePlan>, StoreError> {
        Ok(self.plans.get(id).map(|p| p.clone()))
    }

    async fn list_plans(&self) -> Result<Vec<RatePlan>, StoreError> {
        let mut plans: Vec<RatePlan> = self.plans.iter().map(|p| p.value().clone()).collect();
        plans.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(plans)
    }

    async fn conditional_settle(&self, commit: &SettleCommit) -> Result<CommitOutcome, StoreError> {
        // Lock order: account, then voucher.
        let Some(mut account) = self.accounts.get_mut(&commit.account) else {
            return Ok(CommitOutcome::Missing);
        };
        let Some(mut voucher) = self.vouchers.get_mut(&commit.voucher) else {
            return Ok(CommitOutcome::Missing);
        };

        if voucher.used {
            return Ok(CommitOutcome::VoucherUsed);
        }
        if voucher.account != commit.account || account.balance != commit.expected_balance {
            return Ok(CommitOutcome::AccountChanged);
        }

        voucher.used = true;
        account.balance = commit.new_balance;
        account.max_balance = commit.new_max_balance;
        account.valid_until = Some(commit.new_valid_until);

        tracing::debug!(
            voucher = %commit.voucher,
            account = %commit.account,
            balance = commit.new_balance,
            "in-memory ledger committed settlement"
        );
        Ok(CommitOutcome::Committed)
    }

    fn store_id(&self) -> &str {
        "ledger-memory"
    }
}
