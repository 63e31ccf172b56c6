//! Audit trail of processed notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::NotifyError;

/// How a notification was disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    /// Voucher credited, or the notification was a duplicate of one that was.
    Accepted,
    /// Authentic but not creditable.
    Refused,
    /// Wrong origin or wrong recipient.
    Fraud,
    /// The provider gave an unrecognised answer.
    Undetermined,
    /// Infrastructure failure while processing.
    Error,
}

impl std::fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Accepted => "accepted",
            Self::Refused => "refused",
            Self::Fraud => "fraud",
            Self::Undetermined => "undetermined",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    pub origin: IpAddr,
    pub voucher: Option<String>,
    pub txn_id: Option<String>,
    pub category: AuditCategory,
    pub detail: String,
}

impl AuditEntry {
    pub fn new(
        origin: IpAddr,
        voucher: Option<&str>,
        txn_id: Option<&str>,
        category: AuditCategory,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            received_at: Utc::now(),
            origin,
            voucher: voucher.map(str::to_string),
            txn_id: txn_id.map(str::to_string),
            category,
            detail: detail.into(),
        }
    }
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry) -> Result<(), NotifyError>;

    /// Most recent entries, newest first.
    fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, NotifyError>;
}

/// Bounded in-memory audit log.
pub struct MemoryAuditLog {
    entries: RwLock<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl MemoryAuditLog {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, entry: &AuditEntry) -> Result<(), NotifyError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| NotifyError::Audit("audit log lock poisoned".into()))?;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, NotifyError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| NotifyError::Audit("audit log lock poisoned".into()))?;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}
