//! HTTP API server for the Voucherpay node.
//!
//! Two routers share one handler set. The public router serves voucher
//! lookups and the provider notification callback. The operator router
//! serves voucher lookups, manual settlement and the audit trail.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use voucherpay_core::{
    bank_transfer_reference, ManualTerms, PaymentChannel, PlanId, RatePlan, Verdict, VoucherCode,
};
use voucherpay_notify::{AuditEntry, Notification};
use voucherpay_settlement::{SettlementError, SettlementReceipt, SettlementRequest, SettlementTerms};

use crate::state::NodeState;

const DEFAULT_AUDIT_LIMIT: usize = 50;
const MAX_AUDIT_LIMIT: usize = 1000;

// --- Request / response types ---

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
    pub uptime_secs: u64,
}

#[derive(Serialize, Deserialize)]
pub struct VoucherStatusResponse {
    pub voucher: String,
    pub verdict: Verdict,
    /// Numeric verdict, 0 when valid.
    pub verdict_code: u8,
    pub valid: bool,
}

#[derive(Serialize, Deserialize)]
pub struct SettleBody {
    pub voucher: String,
    /// Stored rate plan to settle against.
    #[serde(default)]
    pub plan: Option<String>,
    /// Ad-hoc terms, used instead of `plan`.
    #[serde(default)]
    pub manual: Option<ManualTerms>,
    /// Amount paid; required for variable-amount terms.
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default = "default_channel")]
    pub channel: PaymentChannel,
}

fn default_channel() -> PaymentChannel {
    PaymentChannel::Manual
}

#[derive(Serialize, Deserialize)]
pub struct SettleResponse {
    #[serde(flatten)]
    pub receipt: SettlementReceipt,
    /// Transfer purpose line, for bank-transfer settlements against a plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_reference: Option<String>,
}

#[derive(Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable error kind.
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(error: impl ToString) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
            code: "invalid_input".into(),
            verdict: None,
        }),
    )
}

fn settlement_error(err: SettlementError) -> ApiError {
    let status = match &err {
        e if e.is_duplicate() => StatusCode::CONFLICT,
        SettlementError::VoucherInvalid(Verdict::NotFound) | SettlementError::PlanNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        SettlementError::VoucherInvalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SettlementError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        SettlementError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        SettlementError::AlreadySettled(_) => StatusCode::CONFLICT,
    };
    let verdict = match &err {
        SettlementError::VoucherInvalid(v) => Some(*v),
        _ => None,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: err.kind().into(),
            verdict,
        }),
    )
}

fn audit_error(err: impl ToString) -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: err.to_string(),
            code: "audit_unavailable".into(),
            verdict: None,
        }),
    )
}

// --- Handlers ---

async fn handle_health(State(state): State<Arc<NodeState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.engine.store().store_id().to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

async fn handle_plans(
    State(state): State<Arc<NodeState>>,
) -> Result<Json<Vec<RatePlan>>, ApiError> {
    let plans = state
        .engine
        .store()
        .list_plans()
        .await
        .map_err(|e| settlement_error(e.into()))?;
    Ok(Json(plans))
}

async fn handle_validate(
    State(state): State<Arc<NodeState>>,
    Path(code): Path<String>,
) -> Result<Json<VoucherStatusResponse>, ApiError> {
    let code = VoucherCode::parse(&code).map_err(bad_request)?;
    let verdict = state.engine.validate(&code).await.map_err(settlement_error)?;
    Ok(Json(VoucherStatusResponse {
        voucher: code.to_string(),
        verdict,
        verdict_code: verdict.code(),
        valid: verdict.is_valid(),
    }))
}

async fn handle_settle(
    State(state): State<Arc<NodeState>>,
    Json(body): Json<SettleBody>,
) -> Result<Json<SettleResponse>, ApiError> {
    if body.channel == PaymentChannel::ProviderNotified {
        return Err(bad_request(
            "provider_notified settlements arrive through the notification endpoint",
        ));
    }
    let voucher = VoucherCode::parse(&body.voucher).map_err(bad_request)?;
    let terms = match (body.plan, body.manual) {
        (Some(plan), None) => SettlementTerms::Plan(PlanId::parse(&plan).map_err(bad_request)?),
        (None, Some(manual)) => SettlementTerms::Manual(manual),
        _ => return Err(bad_request("exactly one of plan or manual must be given")),
    };

    let bank_reference = match (&terms, body.channel) {
        (SettlementTerms::Plan(plan), PaymentChannel::BankTransferManual) => {
            Some(bank_transfer_reference(&voucher, plan))
        }
        _ => None,
    };

    let request = SettlementRequest {
        voucher,
        terms,
        supplied_amount: body.amount,
        channel: body.channel,
    };
    let receipt = state.engine.settle(&request).await.map_err(settlement_error)?;
    Ok(Json(SettleResponse {
        receipt,
        bank_reference,
    }))
}

/// Provider callback. The provider ignores the response, so the outcome is
/// only logged and audited.
async fn handle_notification(
    State(state): State<Arc<NodeState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> StatusCode {
    let notification = Notification::from_form_body(&body);
    let outcome = state.notifier.process(peer.ip(), &notification).await;
    tracing::debug!(%peer, category = %outcome.category(), "notification handled");
    StatusCode::OK
}

async fn handle_audit(
    State(state): State<Arc<NodeState>>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .min(MAX_AUDIT_LIMIT);
    let entries = state.audit().recent(limit).map_err(audit_error)?;
    Ok(Json(entries))
}

// --- Server ---

fn lookup_routes() -> Router<Arc<NodeState>> {
    Router::new()
        .route("/api/v1/health", get(handle_health))
        .route("/api/v1/plans", get(handle_plans))
        .route("/api/v1/vouchers/{code}", get(handle_validate))
}

/// Routes reachable by customers and the payment provider.
pub fn public_router(state: Arc<NodeState>) -> Router {
    lookup_routes()
        .route("/api/v1/notifications/ipn", post(handle_notification))
        .with_state(state)
}

/// Operator routes. Anything that credits a voucher without provider
/// verification lives here, never on the public listener.
pub fn admin_router(state: Arc<NodeState>) -> Router {
    lookup_routes()
        .route("/api/v1/settlements", post(handle_settle))
        .route("/api/v1/audit", get(handle_audit))
        .with_state(state)
}

pub async fn start_api_server(
    name: &'static str,
    listen_addr: SocketAddr,
    app: Router,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(api = name, %listen_addr, "HTTP API server started");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{header, Request};
    use chrono::{NaiveDate, NaiveDateTime};
    use rust_decimal::Decimal;
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;
    use voucherpay_core::{Account, AccountNumber, FixedClock, TransferVoucher};
    use voucherpay_notify::{
        AuditCategory, EchoResponse, EchoVerifier, MemoryAuditLog, NotifierConfig,
        NotifierVerifier, NotifyError,
    };
    use voucherpay_settlement::{InMemoryLedger, SettlementEngine};

    const CODE: &str = "4000123412341234";

    struct AlwaysVerified;

    #[async_trait]
    impl EchoVerifier for AlwaysVerified {
        async fn verify(&self, _n: &Notification) -> Result<EchoResponse, NotifyError> {
            Ok(EchoResponse::Verified)
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    struct TestApp {
        admin: Router,
        public: Router,
        ledger: Arc<InMemoryLedger>,
    }

    fn app(peer: &str) -> TestApp {
        let ledger = Arc::new(InMemoryLedger::new());
        let account = Account::new(AccountNumber(1));
        ledger.put_voucher(TransferVoucher::issue(
            VoucherCode::parse(CODE).unwrap(),
            &account,
            now() + chrono::Duration::hours(1),
        ));
        ledger.put_account(account);
        ledger.put_plan(RatePlan {
            id: PlanId::parse("basic").unwrap(),
            name: "Basic".into(),
            amount: Decimal::new(500, 2),
            fixed_amount: true,
            quantity: 500,
            valid_days: 0,
            valid_months: 1,
        });

        let engine = Arc::new(SettlementEngine::new(
            ledger.clone(),
            Arc::new(FixedClock::new(now())),
        ));
        let config = NotifierConfig {
            receiver_identity: "merchant@example.org".into(),
            ..NotifierConfig::default()
        };
        let notifier = NotifierVerifier::new(
            config,
            engine.clone(),
            Arc::new(AlwaysVerified),
            Arc::new(MemoryAuditLog::new()),
        )
        .unwrap();
        let state = Arc::new(NodeState::new(engine, Arc::new(notifier)));
        let peer: SocketAddr = peer.parse().unwrap();
        TestApp {
            admin: admin_router(state.clone()).layer(MockConnectInfo(peer)),
            public: public_router(state).layer(MockConnectInfo(peer)),
            ledger,
        }
    }

    async fn read_json<T: DeserializeOwned>(res: axum::http::Response<Body>) -> T {
        let bytes = axum::body::to_bytes(res.into_body(), 1024 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json")
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn ipn(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/notifications/ipn")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app("127.0.0.1:5000").public;
        let res = app.oneshot(get("/api/v1/health")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let health: HealthResponse = read_json(res).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.store, "ledger-memory");
    }

    #[tokio::test]
    async fn test_list_plans() {
        let app = app("127.0.0.1:5000").public;
        let res = app.oneshot(get("/api/v1/plans")).await.unwrap();
        let plans: Vec<RatePlan> = read_json(res).await;
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].quantity, 500);
    }

    #[tokio::test]
    async fn test_validate_voucher() {
        let app = app("127.0.0.1:5000").public;
        let res = app
            .oneshot(get(&format!("/api/v1/vouchers/{CODE}")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let status: VoucherStatusResponse = read_json(res).await;
        assert!(status.valid);
        assert_eq!(status.verdict, Verdict::Valid);
        assert_eq!(status.verdict_code, 0);
    }

    #[tokio::test]
    async fn test_validate_unknown_and_malformed() {
        let app = app("127.0.0.1:5000").public;
        let res = app
            .clone()
            .oneshot(get("/api/v1/vouchers/99999999999"))
            .await
            .unwrap();
        let status: VoucherStatusResponse = read_json(res).await;
        assert_eq!(status.verdict, Verdict::NotFound);
        assert_ne!(status.verdict_code, 0);

        let res = app.oneshot(get("/api/v1/vouchers/12x")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let err: ErrorResponse = read_json(res).await;
        assert_eq!(err.code, "invalid_input");
    }

    #[tokio::test]
    async fn test_settle_then_conflict() {
        let TestApp { admin: app, ledger, .. } = app("127.0.0.1:5000");
        let body = serde_json::json!({
            "voucher": CODE,
            "plan": "basic",
            "channel": "bank_transfer_manual",
        });

        let res = app
            .clone()
            .oneshot(post_json("/api/v1/settlements", body.clone()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let settled: SettleResponse = read_json(res).await;
        assert_eq!(settled.receipt.credited_units, 500);
        assert_eq!(
            settled.bank_reference.as_deref(),
            Some("4000-1234-1234-1234-basic")
        );
        assert_eq!(ledger.account(AccountNumber(1)).unwrap().balance, 500);

        let res = app
            .oneshot(post_json("/api/v1/settlements", body))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let err: ErrorResponse = read_json(res).await;
        assert_eq!(err.verdict, Some(Verdict::AlreadyUsed));
        assert_eq!(ledger.account(AccountNumber(1)).unwrap().balance, 500);
    }

    #[tokio::test]
    async fn test_settle_manual_terms() {
        let app = app("127.0.0.1:5000").admin;
        let body = serde_json::json!({
            "voucher": CODE,
            "manual": { "quantity": 100, "fixed_amount": false, "valid_days": 2 },
            "amount": "1.5",
        });
        let res = app
            .oneshot(post_json("/api/v1/settlements", body))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let settled: SettleResponse = read_json(res).await;
        assert_eq!(settled.receipt.credited_units, 150);
        assert_eq!(settled.receipt.channel, PaymentChannel::Manual);
        assert!(settled.bank_reference.is_none());
    }

    #[tokio::test]
    async fn test_settle_rejects_bad_requests() {
        let app = app("127.0.0.1:5000").admin;

        let both = serde_json::json!({
            "voucher": CODE,
            "plan": "basic",
            "manual": { "quantity": 1, "fixed_amount": true },
        });
        let res = app
            .clone()
            .oneshot(post_json("/api/v1/settlements", both))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let provider = serde_json::json!({
            "voucher": CODE,
            "plan": "basic",
            "channel": "provider_notified",
        });
        let res = app
            .clone()
            .oneshot(post_json("/api/v1/settlements", provider))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let unknown_plan = serde_json::json!({ "voucher": CODE, "plan": "gold" });
        let res = app
            .oneshot(post_json("/api/v1/settlements", unknown_plan))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let err: ErrorResponse = read_json(res).await;
        assert_eq!(err.code, "plan_not_found");
    }

    #[tokio::test]
    async fn test_notification_from_provider_credits() {
        let TestApp {
            admin,
            public,
            ledger,
        } = app("65.206.40.2:443");
        let body = format!(
            "receiver_email=merchant%40example.org&payment_status=Completed&item_number={CODE}&item_name=basic&mc_gross=5.00"
        );
        let res = public.oneshot(ipn(&body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(ledger.account(AccountNumber(1)).unwrap().balance, 500);

        let res = admin.oneshot(get("/api/v1/audit?limit=5")).await.unwrap();
        let entries: Vec<AuditEntry> = read_json(res).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, AuditCategory::Accepted);
    }

    #[tokio::test]
    async fn test_notification_from_foreign_origin_still_200() {
        let TestApp {
            admin,
            public,
            ledger,
        } = app("198.51.100.7:443");
        let body = format!(
            "receiver_email=merchant%40example.org&payment_status=Completed&item_number={CODE}&item_name=basic"
        );
        let res = public.oneshot(ipn(&body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(ledger.account(AccountNumber(1)).unwrap().balance, 0);

        let res = admin.oneshot(get("/api/v1/audit")).await.unwrap();
        let entries: Vec<AuditEntry> = read_json(res).await;
        assert_eq!(entries[0].category, AuditCategory::Fraud);
    }

    #[tokio::test]
    async fn test_public_listener_has_no_operator_routes() {
        let TestApp { public, ledger, .. } = app("198.51.100.7:443");
        let body = serde_json::json!({
            "voucher": CODE,
            "manual": { "quantity": 1000000, "fixed_amount": true },
        });
        let res = public
            .clone()
            .oneshot(post_json("/api/v1/settlements", body))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(ledger.account(AccountNumber(1)).unwrap().balance, 0);
        assert!(!ledger.voucher(&VoucherCode::parse(CODE).unwrap()).unwrap().used);

        let res = public.oneshot(get("/api/v1/audit")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_operator_listener_has_no_provider_callback() {
        let TestApp { admin, ledger, .. } = app("65.206.40.2:443");
        let body = format!(
            "receiver_email=merchant%40example.org&payment_status=Completed&item_number={CODE}&item_name=basic"
        );
        let res = admin.oneshot(ipn(&body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(ledger.account(AccountNumber(1)).unwrap().balance, 0);
    }
}
