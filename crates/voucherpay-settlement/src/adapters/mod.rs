//! Ledger store implementations shipped with the settlement crate.

pub mod memory;

pub use memory::InMemoryLedger;
