//! Voucherpay Notifier
//!
//! Authenticates asynchronous payment notifications pushed by the payment
//! provider (origin allow-list, recipient check, echo-back verification),
//! interprets their status, and settles the voucher they pay for through
//! the settlement engine. Every notification leaves an audit entry.

pub mod audit;
pub mod config;
pub mod echo;
pub mod error;
pub mod notification;
pub mod verifier;

pub use audit::{AuditCategory, AuditEntry, AuditSink, MemoryAuditLog};
pub use config::{NotifierConfig, OriginAllowList, OriginRule};
pub use echo::{EchoResponse, EchoVerifier, HttpEchoVerifier};
pub use error::NotifyError;
pub use notification::Notification;
pub use verifier::{FraudKind, NotificationOutcome, NotifierVerifier, RefusalReason};
