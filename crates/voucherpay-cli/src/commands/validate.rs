//! `voucherpay validate`: check whether a voucher can be settled.

use clap::Args;
use serde::Deserialize;
use voucherpay_core::{Verdict, VoucherCode};

use super::{connect_error, read_response, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Voucher code (10 to 20 digits).
    pub code: String,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VoucherStatus {
    pub voucher: String,
    pub verdict: Verdict,
    pub verdict_code: u8,
}

pub(crate) async fn fetch(endpoint: &str, code: &str) -> anyhow::Result<VoucherStatus> {
    let code = VoucherCode::parse(code)?;
    let url = format!("{endpoint}/api/v1/vouchers/{code}");
    let resp = reqwest::get(&url)
        .await
        .map_err(|e| connect_error(endpoint, e))?;
    read_response("voucher check", resp).await
}

pub async fn run(args: &ValidateArgs) -> anyhow::Result<()> {
    let status = fetch(&args.endpoint, &args.code).await?;
    println!("Voucher {}: {} (code {})", status.voucher, status.verdict, status.verdict_code);
    if !status.verdict.is_valid() {
        anyhow::bail!("voucher {} cannot be settled", status.voucher);
    }
    Ok(())
}
