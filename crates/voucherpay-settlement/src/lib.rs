//! Voucherpay Settlement Layer
//!
//! Turns a valid transfer voucher into exactly one credit on its account.
//! The engine validates, computes the credit, and hands a single
//! conditional commit to a [`LedgerStore`]; the store's atomicity is what
//! makes duplicate or concurrent settlements of one voucher harmless.

pub mod adapters;
pub mod engine;
pub mod error;
pub mod traits;
pub mod types;

pub use adapters::InMemoryLedger;
pub use engine::SettlementEngine;
pub use error::{SettlementError, StoreError};
pub use traits::LedgerStore;
pub use types::{
    CommitOutcome, SettleCommit, SettlementId, SettlementReceipt, SettlementRequest,
    SettlementTerms,
};
