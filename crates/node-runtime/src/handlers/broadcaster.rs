//! # Broadcaster
//!
//! Drains the outbound channel and fans messages out through the transport.
//! Each send runs in its own task; failures are logged and forgotten.

use std::sync::Arc;

use shared_types::NodeName;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::adapters::Transport;
use crate::wiring::{Envelope, Outbound};

pub struct Broadcaster {
    node: NodeName,
    /// Every replica except this node.
    peers: Vec<NodeName>,
    transport: Arc<dyn Transport>,
    outbound: mpsc::Receiver<Outbound>,
}

impl Broadcaster {
    pub fn new(
        node: NodeName,
        peers: Vec<NodeName>,
        transport: Arc<dyn Transport>,
        outbound: mpsc::Receiver<Outbound>,
    ) -> Self {
        Self {
            node,
            peers,
            transport,
            outbound,
        }
    }

    pub async fn run(mut self) {
        info!(node = %self.node, peers = self.peers.len(), "Broadcaster started");
        while let Some(outbound) = self.outbound.recv().await {
            match outbound {
                Outbound::Broadcast(envelope) => {
                    debug!(kind = envelope.kind(), peers = self.peers.len(), "Broadcasting");
                    for peer in &self.peers {
                        self.dispatch(*peer, envelope.clone());
                    }
                }
                Outbound::Direct { to, envelope } => {
                    debug!(kind = envelope.kind(), to = %to, "Sending");
                    self.dispatch(to, envelope);
                }
            }
        }
        info!("Outbound channel closed, broadcaster exiting");
    }

    fn dispatch(&self, to: NodeName, envelope: Envelope) {
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            let kind = envelope.kind();
            if let Err(err) = transport.send(to, envelope).await {
                warn!(kind, peer = %to, error = %err, "Send failed");
            }
        });
    }
}
