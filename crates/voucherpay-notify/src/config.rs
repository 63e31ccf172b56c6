//! Notifier configuration and the origin allow-list.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::NotifyError;

/// Configuration for the provider notification verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Addresses or CIDR ranges allowed to post notifications.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Payment recipient identity the provider must name (the merchant's
    /// primary account address).
    #[serde(default)]
    pub receiver_identity: String,
    /// Provider endpoint the notification is echoed back to.
    #[serde(default = "default_verify_url")]
    pub verify_url: String,
    /// Timeout for the echo-back round trip, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Credit payments from payers the provider has not verified.
    #[serde(default = "default_true")]
    pub accept_unverified_payer: bool,
    /// Credit payments with an unconfirmed payer address.
    #[serde(default = "default_true")]
    pub accept_unconfirmed_address: bool,
}

fn default_allowed_origins() -> Vec<String> {
    vec!["65.206.0.0/16".into()]
}
fn default_verify_url() -> String {
    "https://www.paypal.com/cgi-bin/webscr".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            receiver_identity: String::new(),
            verify_url: default_verify_url(),
            timeout_secs: default_timeout_secs(),
            accept_unverified_payer: true,
            accept_unconfirmed_address: true,
        }
    }
}

impl NotifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check the settings a verifier cannot run without.
    pub fn validate(&self) -> Result<(), NotifyError> {
        if self.receiver_identity.trim().is_empty() {
            return Err(NotifyError::Config("receiver_identity must be set".into()));
        }
        if self.timeout_secs == 0 {
            return Err(NotifyError::Config("timeout_secs must be positive".into()));
        }
        url::Url::parse(&self.verify_url)
            .map_err(|e| NotifyError::Config(format!("verify_url {:?}: {e}", self.verify_url)))?;
        OriginAllowList::parse(&self.allowed_origins)?;
        Ok(())
    }
}

/// One allow-list entry: an address and the number of leading bits that
/// must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginRule {
    network: IpAddr,
    prefix_len: u8,
}

impl OriginRule {
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.network, addr.to_canonical()) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = prefix_mask_u32(self.prefix_len);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = prefix_mask_u128(self.prefix_len);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

fn prefix_mask_u32(len: u8) -> u32 {
    match len {
        0 => 0,
        n => u32::MAX << (32 - u32::from(n)),
    }
}

fn prefix_mask_u128(len: u8) -> u128 {
    match len {
        0 => 0,
        n => u128::MAX << (128 - u32::from(n)),
    }
}

impl FromStr for OriginRule {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr, len) = match s.split_once('/') {
            Some((addr, len)) => (addr, Some(len)),
            None => (s, None),
        };
        let network = IpAddr::from_str(addr)
            .map_err(|e| NotifyError::Config(format!("allowed origin {s:?}: {e}")))?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        let prefix_len = match len {
            Some(len) => len
                .parse::<u8>()
                .ok()
                .filter(|n| *n <= max)
                .ok_or_else(|| NotifyError::Config(format!("allowed origin {s:?}: bad prefix length")))?,
            None => max,
        };
        Ok(Self {
            network,
            prefix_len,
        })
    }
}

/// Set of network origins a notification may come from.
#[derive(Debug, Clone, Default)]
pub struct OriginAllowList {
    rules: Vec<OriginRule>,
}

impl OriginAllowList {
    pub fn parse(entries: &[String]) -> Result<Self, NotifyError> {
        let rules = entries
            .iter()
            .map(|e| e.parse())
            .collect::<Result<Vec<OriginRule>, _>>()?;
        Ok(Self { rules })
    }

    /// An empty list admits nothing.
    pub fn allows(&self, addr: IpAddr) -> bool {
        self.rules.iter().any(|rule| rule.contains(addr))
    }
}
