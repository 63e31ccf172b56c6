//! Shared node state handed to HTTP handlers.

use std::sync::Arc;
use std::time::Instant;

use voucherpay_notify::{AuditSink, NotifierVerifier};
use voucherpay_settlement::SettlementEngine;

pub struct NodeState {
    /// When the node started.
    pub start_time: Instant,
    pub engine: Arc<SettlementEngine>,
    pub notifier: Arc<NotifierVerifier>,
}

impl NodeState {
    pub fn new(engine: Arc<SettlementEngine>, notifier: Arc<NotifierVerifier>) -> Self {
        Self {
            start_time: Instant::now(),
            engine,
            notifier,
        }
    }

    pub fn audit(&self) -> &Arc<dyn AuditSink> {
        self.notifier.audit()
    }
}
