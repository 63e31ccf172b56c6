//! `voucherpay audit`: show recent provider notification outcomes.

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Deserialize;

use super::{connect_error, read_response, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Number of entries to show, newest first.
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Deserialize)]
struct AuditEntry {
    received_at: DateTime<Utc>,
    origin: String,
    voucher: Option<String>,
    category: String,
    detail: String,
}

pub async fn run(args: &AuditArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/audit?limit={}", args.endpoint, args.limit);
    let resp = reqwest::get(&url)
        .await
        .map_err(|e| connect_error(&args.endpoint, e))?;
    let entries: Vec<AuditEntry> = read_response("audit query", resp).await?;

    if entries.is_empty() {
        println!("No notifications recorded.");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {:<12} {:<15} {:<20} {}",
            entry.received_at.format("%Y-%m-%d %H:%M:%S"),
            entry.category,
            entry.origin,
            entry.voucher.as_deref().unwrap_or("-"),
            entry.detail
        );
    }
    Ok(())
}
