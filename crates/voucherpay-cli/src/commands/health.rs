//! `voucherpay health`: query a running node.

use clap::Args;
use serde::Deserialize;

use super::{connect_error, read_response, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    store: String,
    uptime_secs: u64,
}

pub async fn run(args: &HealthArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/health", args.endpoint);
    let resp = reqwest::get(&url)
        .await
        .map_err(|e| connect_error(&args.endpoint, e))?;
    let health: HealthResponse = read_response("health check", resp).await?;

    println!("Node Status:");
    println!("  Endpoint: {}", args.endpoint);
    println!("  Status:   {}", health.status);
    println!("  Version:  {}", health.version);
    println!("  Store:    {}", health.store);
    println!("  Uptime:   {}s", health.uptime_secs);
    Ok(())
}
