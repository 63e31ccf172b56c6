//! The Voucherpay node orchestrator.
//!
//! Opens the ledger, wires the settlement engine and notification verifier
//! together, and runs the public and operator HTTP APIs in background tasks.

use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

use voucherpay_core::SystemClock;
use voucherpay_notify::{HttpEchoVerifier, NotifierVerifier};
use voucherpay_settlement::SettlementEngine;

use crate::config::VoucherpayConfig;
use crate::seed::SeedFile;
use crate::state::NodeState;
use crate::storage::RocksLedger;

pub struct VoucherpayNode {
    /// Node configuration.
    config: VoucherpayConfig,
    /// Seed file applied once the ledger is open.
    seed: Option<PathBuf>,
    /// Persistent ledger, shared with the engine and the audit trail.
    ledger: Option<Arc<RocksLedger>>,
    /// Shared state accessible from HTTP handlers.
    node_state: Option<Arc<NodeState>>,
    /// Operator API server task.
    admin_task: Option<JoinHandle<Result<()>>>,
    /// Public API server task.
    public_task: Option<JoinHandle<Result<()>>>,
}

impl VoucherpayNode {
    /// Create a node. Fails early if the settings are unusable.
    pub fn new(config: VoucherpayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            seed: None,
            ledger: None,
            node_state: None,
            admin_task: None,
            public_task: None,
        })
    }

    pub fn with_seed(mut self, path: Option<PathBuf>) -> Self {
        self.seed = path;
        self
    }

    /// Open storage, apply the seed file, and start the HTTP API.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("starting Voucherpay node");

        let ledger = Arc::new(RocksLedger::open(&self.config.storage.data_dir)?);
        tracing::info!(path = %self.config.storage.data_dir.display(), "storage initialized");

        if let Some(path) = &self.seed {
            SeedFile::load(path)?.apply(&ledger)?;
        }

        let engine = Arc::new(SettlementEngine::new(ledger.clone(), Arc::new(SystemClock)));
        let notifier_config = self.config.notifier.clone();
        let echo = Arc::new(HttpEchoVerifier::new(
            &notifier_config.verify_url,
            notifier_config.timeout(),
        )?);
        tracing::info!(
            verify_url = %notifier_config.verify_url,
            origins = ?notifier_config.allowed_origins,
            "notification verifier configured"
        );
        let notifier = Arc::new(NotifierVerifier::new(
            notifier_config,
            engine.clone(),
            echo,
            ledger.clone(),
        )?);
        let node_state = Arc::new(NodeState::new(engine, notifier));

        let admin_addr: SocketAddr = self.config.api_addr().parse()?;
        let public_addr: SocketAddr = self.config.public_addr().parse()?;
        let admin = crate::api::admin_router(node_state.clone());
        let public = crate::api::public_router(node_state.clone());

        self.ledger = Some(ledger);
        self.node_state = Some(node_state);
        self.admin_task = Some(spawn_server("operator", admin_addr, admin));
        self.public_task = Some(spawn_server("public", public_addr, public));
        Ok(())
    }

    /// Wait until either API server exits.
    pub async fn run(&mut self) -> Result<()> {
        let (Some(admin), Some(public)) = (self.admin_task.as_mut(), self.public_task.as_mut())
        else {
            anyhow::bail!("node not started");
        };
        tokio::select! {
            result = admin => result?,
            result = public => result?,
        }
    }

    /// Stop serving and flush the ledger.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down Voucherpay node");

        for task in [self.admin_task.take(), self.public_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
        self.node_state = None;

        if let Some(ledger) = self.ledger.take() {
            ledger.flush()?;
            tracing::info!("storage closed");
        }

        tracing::info!("Voucherpay node shut down");
        Ok(())
    }

    #[cfg(test)]
    pub fn state(&self) -> Option<&Arc<NodeState>> {
        self.node_state.as_ref()
    }
}

fn spawn_server(
    name: &'static str,
    addr: SocketAddr,
    router: axum::Router,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let result = crate::api::start_api_server(name, addr, router).await;
        if let Err(e) = &result {
            tracing::error!(api = name, error = %e, "HTTP API server error");
        }
        result
    })
}
