/// Notification verifier errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid notifier configuration: {0}")]
    Config(String),

    #[error("verification request timed out")]
    Timeout,

    #[error("verification transport error: {0}")]
    Transport(String),

    #[error("audit sink error: {0}")]
    Audit(String),
}
