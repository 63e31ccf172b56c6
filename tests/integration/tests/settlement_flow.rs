//! Integration test: validate and settle vouchers through the engine.

use std::sync::Arc;

use chrono::{NaiveDate, Timelike};
use voucherpay_core::{ManualTerms, PaymentChannel, Verdict};
use voucherpay_integration_tests::{
    code, now, plan, Fixture, ACCOUNT, EXPIRED_VOUCHER, SECOND_VOUCHER, VOUCHER,
};
use voucherpay_settlement::{SettlementError, SettlementRequest, SettlementTerms};

fn plan_request(voucher: &str, plan_id: &str, amount: Option<&str>) -> SettlementRequest {
    SettlementRequest {
        voucher: code(voucher),
        terms: SettlementTerms::Plan(plan(plan_id)),
        supplied_amount: amount.map(str::to_string),
        channel: PaymentChannel::Manual,
    }
}

// =========================================================================
// Round trip: Valid -> settle -> AlreadyUsed
// =========================================================================

#[tokio::test]
async fn test_validate_settle_validate() {
    let fx = Fixture::new();

    assert_eq!(fx.engine.validate(&code(VOUCHER)).await.unwrap(), Verdict::Valid);

    let receipt = fx
        .engine
        .settle(&plan_request(VOUCHER, "month", None))
        .await
        .expect("settlement should succeed");
    assert_eq!(receipt.account, ACCOUNT);
    assert_eq!(receipt.credited_units, 500);
    assert_eq!(receipt.new_balance, 500);
    assert_eq!(fx.balance(), 500);

    assert_eq!(
        fx.engine.validate(&code(VOUCHER)).await.unwrap(),
        Verdict::AlreadyUsed
    );
}

#[tokio::test]
async fn test_month_extension_clamps_to_end_of_february() {
    let fx = Fixture::new();
    let receipt = fx
        .engine
        .settle(&plan_request(VOUCHER, "month", None))
        .await
        .unwrap();

    let expected = NaiveDate::from_ymd_opt(2024, 2, 29)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    assert_eq!(receipt.valid_until, expected);
    assert_eq!(receipt.valid_until.second(), 0);
    assert_eq!(fx.ledger.account(ACCOUNT).unwrap().valid_until, Some(expected));
}

#[tokio::test]
async fn test_variable_plan_truncates() {
    let fx = Fixture::new();
    let receipt = fx
        .engine
        .settle(&plan_request(VOUCHER, "volume", Some("2.5")))
        .await
        .unwrap();
    assert_eq!(receipt.credited_units, 2560);
    assert_eq!(receipt.valid_until, now() + chrono::Duration::days(30));
}

// =========================================================================
// Exactly-once under repetition and concurrency
// =========================================================================

#[tokio::test]
async fn test_sequential_repeat_credits_once() {
    let fx = Fixture::new();
    fx.engine
        .settle(&plan_request(VOUCHER, "month", None))
        .await
        .unwrap();

    let err = fx
        .engine
        .settle(&plan_request(VOUCHER, "month", None))
        .await
        .unwrap_err();
    assert!(err.is_duplicate());
    assert_eq!(fx.balance(), 500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_manual_and_provider_settlements() {
    let fx = Fixture::new();
    let engine = Arc::clone(&fx.engine);

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let mut request = plan_request(VOUCHER, "month", None);
                if i % 2 == 0 {
                    request.channel = PaymentChannel::ProviderNotified;
                }
                engine.settle(&request).await
            })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.expect("task panicked"))
        .collect();

    let credited = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(credited, 1, "exactly one settlement may succeed");
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(SettlementError::is_duplicate));
    assert_eq!(fx.balance(), 500);
}

// =========================================================================
// Validity failures
// =========================================================================

#[tokio::test]
async fn test_settling_one_voucher_invalidates_sibling() {
    let fx = Fixture::new();
    fx.engine
        .settle(&plan_request(VOUCHER, "month", None))
        .await
        .unwrap();

    assert_eq!(
        fx.engine.validate(&code(SECOND_VOUCHER)).await.unwrap(),
        Verdict::AccountMismatch
    );
    let err = fx
        .engine
        .settle(&plan_request(SECOND_VOUCHER, "month", None))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SettlementError::VoucherInvalid(Verdict::AccountMismatch)
    ));
    assert_eq!(fx.balance(), 500);
}

#[tokio::test]
async fn test_expired_voucher() {
    let fx = Fixture::new();
    assert_eq!(
        fx.engine.validate(&code(EXPIRED_VOUCHER)).await.unwrap(),
        Verdict::Expired
    );
    let err = fx
        .engine
        .settle(&plan_request(EXPIRED_VOUCHER, "month", None))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::VoucherInvalid(Verdict::Expired)));
}

#[tokio::test]
async fn test_voucher_expires_as_clock_advances() {
    let fx = Fixture::new();
    fx.clock.set(now() + chrono::Duration::days(2));
    assert_eq!(
        fx.engine.validate(&code(VOUCHER)).await.unwrap(),
        Verdict::Expired
    );
}

#[tokio::test]
async fn test_unknown_voucher() {
    let fx = Fixture::new();
    assert_eq!(
        fx.engine.validate(&code("99999999999999")).await.unwrap(),
        Verdict::NotFound
    );
}

// =========================================================================
// Manual terms and bank transfer channel
// =========================================================================

#[tokio::test]
async fn test_bank_transfer_with_manual_terms() {
    let fx = Fixture::new();
    let request = SettlementRequest {
        voucher: code(VOUCHER),
        terms: SettlementTerms::Manual(ManualTerms {
            quantity: 250,
            fixed_amount: true,
            valid_days: 7,
            valid_months: 0,
        }),
        supplied_amount: None,
        channel: PaymentChannel::BankTransferManual,
    };

    let receipt = fx.engine.settle(&request).await.unwrap();
    assert_eq!(receipt.credited_units, 250);
    assert_eq!(receipt.channel, PaymentChannel::BankTransferManual);
    assert_eq!(receipt.plan.as_str(), ManualTerms::PLAN_ID);
    assert_eq!(receipt.valid_until, now() + chrono::Duration::days(7));
}

#[tokio::test]
async fn test_invalid_amount_leaves_voucher_unused() {
    let fx = Fixture::new();
    for amount in [None, Some("-1"), Some("abc"), Some("0")] {
        let err = fx
            .engine
            .settle(&plan_request(VOUCHER, "volume", amount))
            .await
            .unwrap_err();
        assert!(
            matches!(err, SettlementError::InvalidInput(_)),
            "amount {amount:?} gave {err:?}"
        );
    }
    assert_eq!(fx.engine.validate(&code(VOUCHER)).await.unwrap(), Verdict::Valid);
}
