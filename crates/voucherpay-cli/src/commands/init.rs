//! `voucherpay init`: write a starter node configuration and seed file.

use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (defaults to current directory).
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Address the payment provider must name as the payment recipient.
    #[arg(long, default_value = "")]
    pub receiver: String,
}

const SEED_TEMPLATE: &str = r#"# Records loaded with `voucherpay-node --seed seed.toml`.
# Accounts and vouchers already in the ledger are left untouched.

[[plans]]
id = "basic"
name = "Basic"
amount = "5.00"
fixed_amount = true
quantity = 500
valid_months = 1

# [[accounts]]
# number = 1
#
# [[vouchers]]
# code = "1234567890"
# account = 1
# expires_at = "2030-01-01T00:00:00"
"#;

fn config_template(receiver: &str) -> String {
    format!(
        r#"# Voucherpay Node Configuration

# Operator API (manual settlement, audit). Keep it private.
[api]
listen_addr = "127.0.0.1"
port = 8640
# Public API for the payment provider's notifications.
public_listen_addr = "0.0.0.0"
public_port = 8641

[storage]
data_dir = "./data"

[logging]
level = "info"
format = "text"

[notifier]
allowed_origins = ["65.206.0.0/16"]
receiver_identity = "{receiver}"
verify_url = "https://www.paypal.com/cgi-bin/webscr"
timeout_secs = 30
accept_unverified_payer = true
accept_unconfirmed_address = true
"#
    )
}

pub fn run(args: &InitArgs) -> anyhow::Result<()> {
    let config_path = write_files(&args.dir, &args.receiver)?;

    println!("Initialized Voucherpay node at {}", config_path.display());
    if args.receiver.is_empty() {
        println!("Set [notifier] receiver_identity in voucherpay.toml before starting.");
    }
    println!("Run 'voucherpay-node --seed seed.toml' to start the node.");
    Ok(())
}

fn write_files(dir: &Path, receiver: &str) -> anyhow::Result<PathBuf> {
    let config_path = dir.join("voucherpay.toml");
    if config_path.exists() {
        anyhow::bail!("configuration file already exists at {}", config_path.display());
    }

    std::fs::create_dir_all(dir)?;
    std::fs::write(&config_path, config_template(receiver))?;

    let seed_path = dir.join("seed.toml");
    if !seed_path.exists() {
        std::fs::write(&seed_path, SEED_TEMPLATE)?;
    }

    std::fs::create_dir_all(dir.join("data"))?;
    Ok(config_path)
}
