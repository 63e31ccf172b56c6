//! Integration test: provider notification -> echo-back -> settlement.
//!
//! The provider's verification endpoint is played by a wiremock server.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use voucherpay_core::{PaymentChannel, Verdict};
use voucherpay_integration_tests::{code, Fixture, SECOND_VOUCHER, VOUCHER};
use voucherpay_notify::{
    AuditCategory, AuditSink, FraudKind, HttpEchoVerifier, MemoryAuditLog, Notification,
    NotificationOutcome, NotifierConfig, NotifierVerifier, RefusalReason,
};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MERCHANT: &str = "payments@example.org";

fn provider_ip() -> IpAddr {
    "65.206.229.140".parse().unwrap()
}

async fn provider(answer: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/webscr"))
        .and(body_string_contains("cmd=_notify-validate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(answer))
        .mount(&server)
        .await;
    server
}

fn build_verifier(
    fx: &Fixture,
    server: &MockServer,
    tweak: impl FnOnce(&mut NotifierConfig),
) -> (NotifierVerifier, Arc<MemoryAuditLog>) {
    let mut config = NotifierConfig {
        receiver_identity: MERCHANT.into(),
        verify_url: format!("{}/cgi-bin/webscr", server.uri()),
        timeout_secs: 5,
        ..NotifierConfig::default()
    };
    tweak(&mut config);

    let echo = HttpEchoVerifier::new(&config.verify_url, config.timeout()).unwrap();
    let audit = Arc::new(MemoryAuditLog::new());
    let verifier =
        NotifierVerifier::new(config, fx.engine.clone(), Arc::new(echo), audit.clone()).unwrap();
    (verifier, audit)
}

fn form(voucher: &str, extra: &str) -> Notification {
    let body = format!(
        "mc_gross=9.99&receiver_email=payments%40example.org&payment_status=Completed\
         &item_number={voucher}&item_name=month&txn_id=8AB12345CD{extra}"
    );
    Notification::from_form_body(body.as_bytes())
}

#[tokio::test]
async fn test_verified_notification_credits_once() {
    let fx = Fixture::new();
    let server = provider("VERIFIED").await;
    let (verifier, audit) = build_verifier(&fx, &server, |_| {});

    let first = verifier.process(provider_ip(), &form(VOUCHER, "")).await;
    let NotificationOutcome::Credited(receipt) = first else {
        panic!("expected a credit, got {first:?}");
    };
    assert_eq!(receipt.channel, PaymentChannel::ProviderNotified);
    assert_eq!(fx.balance(), 500);

    // Providers resend notifications.
    let resent = verifier.process(provider_ip(), &form(VOUCHER, "")).await;
    assert_eq!(resent, NotificationOutcome::Duplicate(code(VOUCHER)));
    assert_eq!(fx.balance(), 500);

    let entries = audit.recent(10).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.category == AuditCategory::Accepted));
    assert_eq!(entries[0].voucher.as_deref(), Some(VOUCHER));
}

#[tokio::test]
async fn test_echo_carries_original_payload() {
    let fx = Fixture::new();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains(
            "cmd=_notify-validate&mc_gross=9.99&receiver_email=payments%40example.org",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string("VERIFIED"))
        .expect(1)
        .mount(&server)
        .await;
    let (verifier, _audit) = build_verifier(&fx, &server, |c| c.verify_url = server.uri());

    let outcome = verifier.process(provider_ip(), &form(VOUCHER, "")).await;
    assert!(outcome.is_credited());
}

#[tokio::test]
async fn test_forged_origin_with_valid_fields() {
    let fx = Fixture::new();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("VERIFIED"))
        .expect(0)
        .mount(&server)
        .await;
    let (verifier, audit) = build_verifier(&fx, &server, |_| {});

    let outcome = verifier
        .process("192.0.2.10".parse().unwrap(), &form(VOUCHER, ""))
        .await;
    assert_eq!(outcome, NotificationOutcome::Fraud(FraudKind::OriginMismatch));
    assert_eq!(fx.balance(), 0);
    assert_eq!(fx.engine.validate(&code(VOUCHER)).await.unwrap(), Verdict::Valid);
    assert_eq!(audit.recent(1).unwrap()[0].category, AuditCategory::Fraud);
}

#[tokio::test]
async fn test_invalid_and_undetermined_answers_do_not_credit() {
    for (answer, expect_undetermined) in [("INVALID", false), ("Service Unavailable", true)] {
        let fx = Fixture::new();
        let server = provider(answer).await;
        let (verifier, audit) = build_verifier(&fx, &server, |_| {});

        let outcome = verifier.process(provider_ip(), &form(VOUCHER, "")).await;
        if expect_undetermined {
            assert_eq!(
                outcome,
                NotificationOutcome::Undetermined("Service Unavailable".into())
            );
            assert_eq!(audit.recent(1).unwrap()[0].category, AuditCategory::Undetermined);
        } else {
            assert_eq!(
                outcome,
                NotificationOutcome::Refused(RefusalReason::ProviderRejected)
            );
        }
        assert_eq!(fx.balance(), 0);
    }
}

#[tokio::test]
async fn test_slow_provider_is_refused_not_retried() {
    let fx = Fixture::new();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("VERIFIED")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let (verifier, audit) = build_verifier(&fx, &server, |c| c.timeout_secs = 1);

    let outcome = verifier.process(provider_ip(), &form(VOUCHER, "")).await;
    assert!(matches!(
        outcome,
        NotificationOutcome::Refused(RefusalReason::VerificationUnavailable(_))
    ));
    assert_eq!(fx.balance(), 0);
    assert_eq!(audit.recent(1).unwrap()[0].category, AuditCategory::Refused);
}

#[tokio::test]
async fn test_unverified_payer_policy() {
    let strict = Fixture::new();
    let server = provider("VERIFIED").await;
    let (verifier, _audit) = build_verifier(&strict, &server, |c| c.accept_unverified_payer = false);
    let outcome = verifier
        .process(provider_ip(), &form(VOUCHER, "&payer_status=unverified"))
        .await;
    assert_eq!(outcome, NotificationOutcome::Refused(RefusalReason::UnverifiedPayer));
    assert_eq!(strict.balance(), 0);

    let lenient = Fixture::new();
    let (verifier, _audit) = build_verifier(&lenient, &server, |_| {});
    let outcome = verifier
        .process(provider_ip(), &form(VOUCHER, "&payer_status=unverified"))
        .await;
    assert!(outcome.is_credited());
    assert_eq!(lenient.balance(), 500);
}

#[tokio::test]
async fn test_notification_after_manual_settlement_is_duplicate() {
    let fx = Fixture::new();
    let server = provider("VERIFIED").await;
    let (verifier, _audit) = build_verifier(&fx, &server, |_| {});

    let manual = voucherpay_settlement::SettlementRequest {
        voucher: code(SECOND_VOUCHER),
        terms: voucherpay_settlement::SettlementTerms::Plan(voucherpay_integration_tests::plan(
            "month",
        )),
        supplied_amount: None,
        channel: PaymentChannel::Manual,
    };
    fx.engine.settle(&manual).await.unwrap();

    let outcome = verifier
        .process(provider_ip(), &form(SECOND_VOUCHER, ""))
        .await;
    assert_eq!(outcome, NotificationOutcome::Duplicate(code(SECOND_VOUCHER)));
    assert_eq!(fx.balance(), 500);
}
