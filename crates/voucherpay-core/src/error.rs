/// Core domain errors.
///
/// These are input errors: they are raised before any ledger state is
/// touched and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("malformed voucher code: expected 10 to 20 digits, got {0:?}")]
    MalformedVoucherCode(String),

    #[error("malformed plan id: expected 1 to 64 alphanumeric characters, got {0:?}")]
    MalformedPlanId(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("expiry computation overflowed the calendar")]
    ExpiryOverflow,
}
