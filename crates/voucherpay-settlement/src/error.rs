use voucherpay_core::{CoreError, PlanId, Verdict, VoucherCode};

/// Ledger store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt ledger record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Settlement errors.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("voucher cannot be settled: {0}")]
    VoucherInvalid(Verdict),

    #[error("rate plan not found: {0}")]
    PlanNotFound(PlanId),

    #[error("voucher already settled: {0}")]
    AlreadySettled(VoucherCode),

    #[error(transparent)]
    InvalidInput(#[from] CoreError),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for SettlementError {
    fn from(err: StoreError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl SettlementError {
    /// Whether the voucher had already been settled, either caught by the
    /// pre-check or by the conditional commit.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            Self::AlreadySettled(_) | Self::VoucherInvalid(Verdict::AlreadyUsed)
        )
    }

    /// Short machine-readable name for API responses and audit entries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::VoucherInvalid(_) => "voucher_invalid",
            Self::PlanNotFound(_) => "plan_not_found",
            Self::AlreadySettled(_) => "already_settled",
            Self::InvalidInput(_) => "invalid_input",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }
}
