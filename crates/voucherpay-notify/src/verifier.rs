use std::net::IpAddr;
use std::sync::Arc;

use voucherpay_core::{PaymentChannel, PlanId, VoucherCode};
use voucherpay_settlement::{
    SettlementEngine, SettlementError, SettlementReceipt, SettlementRequest, SettlementTerms,
};

use crate::audit::{AuditCategory, AuditEntry, AuditSink};
use crate::config::{NotifierConfig, OriginAllowList};
use crate::echo::{EchoResponse, EchoVerifier};
use crate::error::NotifyError;
use crate::notification::Notification;

/// Which trust check a forged-looking notification failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FraudKind {
    OriginMismatch,
    RecipientMismatch,
}

impl std::fmt::Display for FraudKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OriginMismatch => f.write_str("origin not in allow-list"),
            Self::RecipientMismatch => f.write_str("payment recipient mismatch"),
        }
    }
}

/// Why an authentic-looking notification was not credited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefusalReason {
    /// The provider answered `INVALID`.
    ProviderRejected,
    /// The echo-back round trip failed or timed out.
    VerificationUnavailable(String),
    /// Payment status other than `Completed`.
    NotCompleted(String),
    UnverifiedPayer,
    UnconfirmedAddress,
    /// Voucher code, plan id or amount missing or malformed.
    Malformed(String),
    /// The settlement engine declined the voucher.
    SettlementRejected(String),
}

impl std::fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProviderRejected => f.write_str("provider answered INVALID"),
            Self::VerificationUnavailable(e) => write!(f, "verification unavailable: {e}"),
            Self::NotCompleted(status) => write!(f, "payment status {status:?} is not Completed"),
            Self::UnverifiedPayer => f.write_str("payer is unverified"),
            Self::UnconfirmedAddress => f.write_str("payer address is unconfirmed"),
            Self::Malformed(e) => write!(f, "malformed notification: {e}"),
            Self::SettlementRejected(e) => write!(f, "settlement rejected: {e}"),
        }
    }
}

/// Final disposition of one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Credited(SettlementReceipt),
    /// The voucher had already been settled; nothing credited.
    Duplicate(VoucherCode),
    Refused(RefusalReason),
    Fraud(FraudKind),
    /// The provider's answer was neither `VERIFIED` nor `INVALID`.
    Undetermined(String),
    /// Store failure while settling.
    Failed(String),
}

impl NotificationOutcome {
    pub fn category(&self) -> AuditCategory {
        match self {
            Self::Credited(_) | Self::Duplicate(_) => AuditCategory::Accepted,
            Self::Refused(_) => AuditCategory::Refused,
            Self::Fraud(_) => AuditCategory::Fraud,
            Self::Undetermined(_) => AuditCategory::Undetermined,
            Self::Failed(_) => AuditCategory::Error,
        }
    }

    pub fn is_credited(&self) -> bool {
        matches!(self, Self::Credited(_))
    }

    fn detail(&self) -> String {
        match self {
            Self::Credited(r) => format!(
                "credited {} units to account {} (settlement {})",
                r.credited_units, r.account, r.settlement_id
            ),
            Self::Duplicate(code) => format!("voucher {code} already settled"),
            Self::Refused(reason) => reason.to_string(),
            Self::Fraud(kind) => kind.to_string(),
            Self::Undetermined(line) => format!("provider answered {line:?}"),
            Self::Failed(e) => e.clone(),
        }
    }
}

/// Authenticates provider notifications and settles the vouchers they pay for.
pub struct NotifierVerifier {
    config: NotifierConfig,
    origins: OriginAllowList,
    engine: Arc<SettlementEngine>,
    echo: Arc<dyn EchoVerifier>,
    audit: Arc<dyn AuditSink>,
}

impl NotifierVerifier {
    pub fn new(
        config: NotifierConfig,
        engine: Arc<SettlementEngine>,
        echo: Arc<dyn EchoVerifier>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, NotifyError> {
        config.validate()?;
        let origins = OriginAllowList::parse(&config.allowed_origins)?;
        Ok(Self {
            config,
            origins,
            engine,
            echo,
            audit,
        })
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn audit(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    /// Run one notification through the checks, settle it if eligible, and
    /// record the outcome.
    pub async fn process(&self, origin: IpAddr, notification: &Notification) -> NotificationOutcome {
        let outcome = self.evaluate(origin, notification).await;
        self.record(origin, notification, &outcome);
        outcome
    }

    async fn evaluate(&self, origin: IpAddr, notification: &Notification) -> NotificationOutcome {
        if !self.origins.allows(origin) {
            return NotificationOutcome::Fraud(FraudKind::OriginMismatch);
        }
        if notification.receiver() != Some(self.config.receiver_identity.as_str()) {
            return NotificationOutcome::Fraud(FraudKind::RecipientMismatch);
        }

        match self.echo.verify(notification).await {
            Ok(EchoResponse::Verified) => {}
            Ok(EchoResponse::Invalid) => {
                return NotificationOutcome::Refused(RefusalReason::ProviderRejected)
            }
            Ok(EchoResponse::Undetermined(line)) => return NotificationOutcome::Undetermined(line),
            Err(e) => {
                return NotificationOutcome::Refused(RefusalReason::VerificationUnavailable(
                    e.to_string(),
                ))
            }
        }

        if !notification.is_completed() {
            let status = notification.payment_status().unwrap_or_default().to_string();
            return NotificationOutcome::Refused(RefusalReason::NotCompleted(status));
        }
        if notification.payer_unverified() && !self.config.accept_unverified_payer {
            return NotificationOutcome::Refused(RefusalReason::UnverifiedPayer);
        }
        if notification.address_unconfirmed() && !self.config.accept_unconfirmed_address {
            return NotificationOutcome::Refused(RefusalReason::UnconfirmedAddress);
        }

        let request = match settlement_request(notification) {
            Ok(request) => request,
            Err(reason) => return NotificationOutcome::Refused(reason),
        };

        match self.engine.settle(&request).await {
            Ok(receipt) => NotificationOutcome::Credited(receipt),
            Err(e) if e.is_duplicate() => NotificationOutcome::Duplicate(request.voucher),
            Err(SettlementError::StoreUnavailable(e)) => NotificationOutcome::Failed(e),
            Err(e) => NotificationOutcome::Refused(RefusalReason::SettlementRejected(e.to_string())),
        }
    }

    fn record(&self, origin: IpAddr, notification: &Notification, outcome: &NotificationOutcome) {
        let category = outcome.category();
        let detail = outcome.detail();
        let voucher = notification.voucher();
        let txn_id = notification.txn_id();

        match category {
            AuditCategory::Accepted | AuditCategory::Refused => {
                tracing::info!(%origin, ?voucher, ?txn_id, %category, "{detail}")
            }
            AuditCategory::Fraud | AuditCategory::Undetermined => {
                tracing::warn!(%origin, ?voucher, ?txn_id, %category, "{detail}")
            }
            AuditCategory::Error => {
                tracing::error!(%origin, ?voucher, ?txn_id, %category, "{detail}")
            }
        }

        let entry = AuditEntry::new(origin, voucher, txn_id, category, detail);
        if let Err(e) = self.audit.record(&entry) {
            tracing::error!(error = %e, "failed to record notification audit entry");
        }
    }
}

fn settlement_request(notification: &Notification) -> Result<SettlementRequest, RefusalReason> {
    let voucher = notification
        .voucher()
        .ok_or_else(|| RefusalReason::Malformed("missing voucher code".into()))?;
    let voucher =
        VoucherCode::parse(voucher).map_err(|e| RefusalReason::Malformed(e.to_string()))?;
    let plan = notification
        .plan()
        .ok_or_else(|| RefusalReason::Malformed("missing plan id".into()))?;
    let plan = PlanId::parse(plan).map_err(|e| RefusalReason::Malformed(e.to_string()))?;

    Ok(SettlementRequest {
        voucher,
        terms: SettlementTerms::Plan(plan),
        supplied_amount: notification.gross().map(str::to_string),
        channel: PaymentChannel::ProviderNotified,
    })
}
