//! Voucherpay CLI: operator commands against a running settlement node.
//!
//! Subcommands: init, health, plans, validate, settle, audit.

mod commands;

use clap::{Parser, Subcommand};

/// Voucherpay operator CLI.
#[derive(Parser, Debug)]
#[command(name = "voucherpay", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize a new node configuration and seed file.
    Init(commands::init::InitArgs),
    /// Query the health of a running node.
    Health(commands::health::HealthArgs),
    /// List rate plans.
    Plans(commands::plans::PlansArgs),
    /// Check whether a voucher can be settled.
    Validate(commands::validate::ValidateArgs),
    /// Confirm a payment by hand and credit a voucher.
    Settle(commands::settle::SettleArgs),
    /// Show recent provider notification outcomes.
    Audit(commands::audit::AuditArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Init(args) => commands::init::run(args),
        Commands::Health(args) => commands::health::run(args).await,
        Commands::Plans(args) => commands::plans::run(args).await,
        Commands::Validate(args) => commands::validate::run(args).await,
        Commands::Settle(args) => commands::settle::run(args).await,
        Commands::Audit(args) => commands::audit::run(args).await,
    }
}
