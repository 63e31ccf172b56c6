use chrono::Utc;
use std::sync::Arc;
use voucherpay_core::{
    calculator, validator, Account, Clock, CoreError, RatePlan, TransferVoucher, Verdict,
    VoucherCode,
};

use crate::error::SettlementError;
use crate::traits::LedgerStore;
use crate::types::{
    CommitOutcome, SettleCommit, SettlementId, SettlementReceipt, SettlementRequest,
    SettlementTerms,
};

/// Validates vouchers and settles them exactly once.
pub struct SettlementEngine {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        tracing::info!(store = store.store_id(), "settlement engine ready");
        Self { store, clock }
    }

    /// The ledger this engine settles against.
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Current verdict for a voucher code. Read-only.
    pub async fn validate(&self, code: &VoucherCode) -> Result<Verdict, SettlementError> {
        let (voucher, account) = self.load(code).await?;
        Ok(validator::validate(
            voucher.as_ref(),
            account.as_ref(),
            self.clock.now(),
        ))
    }

    /// Settle a voucher.
    ///
    /// The verdict computed here only short-circuits requests that are
    /// already known to be bad (a voucher seen as used yields
    /// `VoucherInvalid(AlreadyUsed)`). The store's conditional commit
    /// decides the race between concurrent settlements of the same voucher,
    /// and a loser that passed the pre-check gets
    /// [`SettlementError::AlreadySettled`].
    pub async fn settle(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        let code = &request.voucher;
        let now = self.clock.now();

        let (voucher, account) = self.load(code).await?;
        let verdict = validator::validate(voucher.as_ref(), account.as_ref(), now);
        let (Verdict::Valid, Some(voucher), Some(account)) = (verdict, voucher, account) else {
            tracing::info!(voucher = %code, %verdict, channel = %request.channel, "voucher rejected");
            return Err(SettlementError::VoucherInvalid(verdict));
        };

        let plan = self.resolve_plan(&request.terms).await?;
        let credit = calculator::compute_credit(&plan, request.supplied_amount.as_deref(), now)?;

        let new_balance = account
            .balance
            .checked_add(credit.units)
            .ok_or_else(|| CoreError::InvalidAmount("credit overflows account balance".into()))?;
        let commit = SettleCommit {
            voucher: voucher.code.clone(),
            account: account.number,
            expected_balance: account.balance,
            new_balance,
            new_max_balance: account.max_balance.max(new_balance),
            new_valid_until: credit.valid_until,
        };

        let outcome = self.store.conditional_settle(&commit).await?;
        match outcome {
            CommitOutcome::Committed => {
                let receipt = SettlementReceipt {
                    settlement_id: SettlementId::new(),
                    voucher: commit.voucher,
                    account: commit.account,
                    channel: request.channel,
                    plan: plan.id,
                    credited_units: credit.units,
                    new_balance: commit.new_balance,
                    new_max_balance: commit.new_max_balance,
                    valid_until: commit.new_valid_until,
                    settled_at: Utc::now(),
                };
                tracing::info!(
                    settlement_id = %receipt.settlement_id,
                    voucher = %receipt.voucher,
                    account = %receipt.account,
                    channel = %receipt.channel,
                    plan = %receipt.plan,
                    units = receipt.credited_units,
                    balance = receipt.new_balance,
                    valid_until = %receipt.valid_until,
                    "voucher settled"
                );
                Ok(receipt)
            }
            CommitOutcome::VoucherUsed => {
                tracing::warn!(voucher = %code, channel = %request.channel, "lost settlement race: voucher already used");
                Err(SettlementError::AlreadySettled(code.clone()))
            }
            CommitOutcome::Missing => Err(SettlementError::VoucherInvalid(Verdict::NotFound)),
            CommitOutcome::AccountChanged => {
                tracing::warn!(voucher = %code, account = %account.number, "account balance moved during settlement");
                Err(SettlementError::VoucherInvalid(Verdict::AccountMismatch))
            }
        }
    }

    async fn load(
        &self,
        code: &VoucherCode,
    ) -> Result<(Option<TransferVoucher>, Option<Account>), SettlementError> {
        let voucher = self.store.find_voucher(code).await?;
        let account = match &voucher {
            Some(v) => self.store.find_account(v.account).await?,
            None => None,
        };
        Ok((voucher, account))
    }

    async fn resolve_plan(&self, terms: &SettlementTerms) -> Result<RatePlan, SettlementError> {
        match terms {
            SettlementTerms::Plan(id) => self
                .store
                .find_plan(id)
                .await?
                .ok_or_else(|| SettlementError::PlanNotFound(id.clone())),
            SettlementTerms::Manual(terms) => Ok(terms.to_plan()),
        }
    }
}
