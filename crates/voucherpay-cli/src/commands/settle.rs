//! `voucherpay settle`: confirm a payment by hand and credit the voucher.

use chrono::NaiveDateTime;
use clap::Args;
use serde::{Deserialize, Serialize};
use voucherpay_core::{ManualTerms, PaymentChannel, PlanId, Units, VoucherCode};

use super::{connect_error, read_response, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct SettleArgs {
    /// Voucher code (10 to 20 digits).
    pub code: String,

    /// Rate plan to settle against.
    #[arg(short, long, conflicts_with = "quantity")]
    pub plan: Option<String>,

    /// Ad-hoc quantity instead of a rate plan.
    #[arg(short, long, required_unless_present = "plan")]
    pub quantity: Option<Units>,

    /// Credit the ad-hoc quantity as is, ignoring the amount.
    #[arg(long)]
    pub fixed: bool,

    /// Ad-hoc validity extension in days.
    #[arg(long, default_value_t = 0)]
    pub valid_days: u32,

    /// Ad-hoc validity extension in months.
    #[arg(long, default_value_t = 0)]
    pub valid_months: u32,

    /// Amount paid (required for per-unit plans).
    #[arg(short, long)]
    pub amount: Option<String>,

    /// The payment arrived by bank transfer.
    #[arg(long)]
    pub bank_transfer: bool,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
struct SettleBody {
    voucher: VoucherCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<PlanId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    manual: Option<ManualTerms>,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<String>,
    channel: PaymentChannel,
}

#[derive(Deserialize)]
struct SettleResponse {
    settlement_id: String,
    credited_units: Units,
    new_balance: Units,
    valid_until: NaiveDateTime,
    #[serde(default)]
    bank_reference: Option<String>,
}

fn build_body(args: &SettleArgs) -> anyhow::Result<SettleBody> {
    let voucher = VoucherCode::parse(&args.code)?;
    let (plan, manual) = match (&args.plan, args.quantity) {
        (Some(plan), None) => (Some(PlanId::parse(plan)?), None),
        (None, Some(quantity)) => (
            None,
            Some(ManualTerms {
                quantity,
                fixed_amount: args.fixed,
                valid_days: args.valid_days,
                valid_months: args.valid_months,
            }),
        ),
        _ => anyhow::bail!("give either --plan or --quantity"),
    };
    let channel = if args.bank_transfer {
        PaymentChannel::BankTransferManual
    } else {
        PaymentChannel::Manual
    };
    Ok(SettleBody {
        voucher,
        plan,
        manual,
        amount: args.amount.clone(),
        channel,
    })
}

pub async fn run(args: &SettleArgs) -> anyhow::Result<()> {
    let body = build_body(args)?;
    let url = format!("{}/api/v1/settlements", args.endpoint);

    println!("Settling voucher {} via {}...", body.voucher, body.channel);
    let resp = reqwest::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|e| connect_error(&args.endpoint, e))?;
    let receipt: SettleResponse = read_response("settlement", resp).await?;

    println!("Voucher settled!");
    println!("  Settlement:  {}", receipt.settlement_id);
    println!("  Credited:    {}", receipt.credited_units);
    println!("  Balance:     {}", receipt.new_balance);
    println!("  Valid until: {}", receipt.valid_until.format("%Y-%m-%d %H:%M"));
    if let Some(reference) = receipt.bank_reference {
        println!("  Reference:   {reference}");
    }
    Ok(())
}
