//! `voucherpay plans`: list the rate plans a voucher can be settled against.

use clap::Args;
use voucherpay_core::RatePlan;

use super::{connect_error, read_response, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct PlansArgs {
    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

pub async fn run(args: &PlansArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/plans", args.endpoint);
    let resp = reqwest::get(&url)
        .await
        .map_err(|e| connect_error(&args.endpoint, e))?;
    let plans: Vec<RatePlan> = read_response("listing plans", resp).await?;

    if plans.is_empty() {
        println!("No rate plans configured.");
        return Ok(());
    }
    println!("{:<16} {:>10} {:>10} {:<8} {}", "ID", "PRICE", "QUANTITY", "KIND", "VALIDITY");
    for plan in plans {
        let kind = if plan.fixed_amount { "fixed" } else { "per-unit" };
        println!(
            "{:<16} {:>10} {:>10} {:<8} {}m {}d  {}",
            plan.id, plan.amount, plan.quantity, kind, plan.valid_months, plan.valid_days, plan.name
        );
    }
    Ok(())
}
