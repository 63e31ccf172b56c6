use async_trait::async_trait;
use voucherpay_core::{Account, AccountNumber, PlanId, RatePlan, TransferVoucher, VoucherCode};

use crate::error::StoreError;
use crate::types::{CommitOutcome, SettleCommit};

/// Persistent ledger of accounts, vouchers and rate plans.
///
/// Implementations must apply [`LedgerStore::conditional_settle`] as one
/// atomic step: the "voucher unused" and "balance unchanged" checks and
/// the voucher + account writes either all happen or none do, and no two
/// commits for the same voucher can both observe it unused.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_voucher(&self, code: &VoucherCode) -> Result<Option<TransferVoucher>, StoreError>;

    async fn find_account(&self, number: AccountNumber) -> Result<Option<Account>, StoreError>;

    async fn find_plan(&self, id: &PlanId) -> Result<Option<RatePlan>, StoreError>;

    /// All rate plans, ordered by id.
    async fn list_plans(&self) -> Result<Vec<RatePlan>, StoreError>;

    /// Mark the voucher used and write the account's new balance and
    /// validity, if and only if the commit's preconditions still hold.
    async fn conditional_settle(&self, commit: &SettleCommit) -> Result<CommitOutcome, StoreError>;

    /// Short identifier for logs (e.g. "ledger-memory").
    fn store_id(&self) -> &str;
}
