//! # Wiring
//!
//! Builds the channels between the workers and spawns them.
//!
//! ```text
//!            ┌──────────── requeue ─────────────┐
//!            ↓                                   │
//! inbound → Dispatcher ──delivery──→ Resolver ───┴──outbound──→ Broadcaster → Transport
//!            │   ↑                      │                          ↑
//!            │   └──── status (watch) ──┘                          │
//!            └─transactions─→ BlockClock ──────────────────────────┘
//! ```

pub mod envelope;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use shared_types::NodeName;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::adapters::{router, ApiState, Transport};
use crate::container::NodeContainer;
use crate::handlers::{BlockClock, Broadcaster, Dispatcher, Resolver};

pub use envelope::{Envelope, Outbound, PbftMessage};
pub use status::NodeStatus;

/// Capacity of every worker channel.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Running worker set of one node.
pub struct NodeRuntime {
    node_name: NodeName,
    inbound: mpsc::Sender<Envelope>,
    status: watch::Receiver<NodeStatus>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl NodeRuntime {
    /// Spawn the dispatcher, resolver, broadcaster and block clock.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(container: &NodeContainer, transport: Arc<dyn Transport>) -> Self {
        let config = &container.config;
        let node_name = config.node_name;

        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (delivery_tx, delivery_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (transactions_tx, transactions_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (status_tx, status_rx) = watch::channel(NodeStatus::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let dispatcher = Dispatcher::new(
            node_name,
            inbound_rx,
            delivery_tx,
            transactions_tx,
            status_rx.clone(),
            config.alarm_interval(),
        );
        let resolver = Resolver::new(
            Arc::clone(&container.auth),
            config.pbft(),
            delivery_rx,
            inbound_tx.clone(),
            outbound_tx.clone(),
            status_tx,
        );
        let broadcaster = Broadcaster::new(
            node_name,
            config.other_replicas(),
            transport,
            outbound_rx,
        );
        let block_clock = BlockClock::new(
            Arc::clone(&container.auth),
            config.consensus.primary,
            config.block_interval(),
            config.consensus.block_min_transactions,
            transactions_rx,
            inbound_tx.clone(),
            outbound_tx,
            status_rx.clone(),
        );

        let tasks = vec![
            spawn_worker("dispatcher", dispatcher.run(), shutdown_rx.clone()),
            spawn_worker("resolver", resolver.run(), shutdown_rx.clone()),
            spawn_worker("broadcaster", broadcaster.run(), shutdown_rx.clone()),
            spawn_worker("block-clock", block_clock.run(), shutdown_rx),
        ];
        info!(node = %node_name, "Node runtime started");

        Self {
            node_name,
            inbound: inbound_tx,
            status: status_rx,
            shutdown_tx,
            tasks,
        }
    }

    pub fn node_name(&self) -> NodeName {
        self.node_name
    }

    /// Entry point for envelopes addressed to this node.
    pub fn inbox(&self) -> mpsc::Sender<Envelope> {
        self.inbound.clone()
    }

    pub fn status(&self) -> watch::Receiver<NodeStatus> {
        self.status.clone()
    }

    /// HTTP routes feeding this node's inbox.
    pub fn router(&self) -> Router {
        router(ApiState {
            node_name: self.node_name,
            inbound: self.inbox(),
            status: self.status(),
        })
    }

    /// Signal every worker and wait for them to stop.
    pub async fn shutdown(self) {
        info!(node = %self.node_name, "Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        for task in self.tasks {
            let _ = tokio::time::timeout(Duration::from_secs(2), task).await;
        }
        info!("Shutdown complete");
    }
}

fn spawn_worker<F>(
    name: &'static str,
    worker: F,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = worker => {}
            _ = shutdown.changed() => {
                info!(worker = name, "Shutdown signal received");
            }
        }
    })
}
