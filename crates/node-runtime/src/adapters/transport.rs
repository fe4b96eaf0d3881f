//! # Transport Adapters
//!
//! Outbound delivery of envelopes to other participants.
//!
//! - `HttpTransport`: JSON over HTTP POST, one route per message kind
//! - `InMemoryTransport`: hands envelopes straight to in-process inboxes
//!
//! Sends are fire-and-forget: a failure is reported to the caller, which
//! logs it. Nothing is retried.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use shared_types::NodeName;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::container::NodeConfig;
use crate::wiring::{Envelope, PbftMessage};

/// Errors raised while handing an envelope to a peer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No address known for {0}")]
    UnknownPeer(NodeName),

    #[error("Request to {peer} failed: {source}")]
    Http {
        peer: NodeName,
        #[source]
        source: reqwest::Error,
    },

    #[error("{peer} refused the message with status {status}")]
    Refused { peer: NodeName, status: u16 },

    #[error("Inbox of {0} is closed or full")]
    InboxUnavailable(NodeName),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Delivery of envelopes to named participants.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, to: NodeName, envelope: Envelope) -> Result<(), TransportError>;
}

// =============================================================================
// HTTP
// =============================================================================

/// Posts envelopes as JSON to `<peer url><route>`.
pub struct HttpTransport {
    client: Client,
    peers: HashMap<NodeName, String>,
}

impl HttpTransport {
    pub fn new(peers: HashMap<NodeName, String>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(2))
            .build()
            .map_err(TransportError::Client)?;
        let peers = peers
            .into_iter()
            .map(|(name, url)| (name, url.trim_end_matches('/').to_string()))
            .collect();
        Ok(Self { client, peers })
    }

    /// Address book of every replica and client in `config`.
    pub fn from_config(config: &NodeConfig) -> Result<Self, TransportError> {
        let peers = config
            .replicas
            .iter()
            .chain(config.clients.iter())
            .map(|(name, peer)| (*name, peer.url.clone()))
            .collect();
        Self::new(peers)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, to: NodeName, envelope: Envelope) -> Result<(), TransportError> {
        let base = self.peers.get(&to).ok_or(TransportError::UnknownPeer(to))?;
        let url = format!("{base}{}", envelope.route());
        let request = self.client.post(url);
        let request = match &envelope {
            Envelope::Transaction(tx) => request.json(tx),
            Envelope::Pbft(PbftMessage::Request(block)) => request.json(block),
            Envelope::Pbft(PbftMessage::PrePrepare(msg)) => request.json(msg),
            Envelope::Pbft(PbftMessage::Prepare(msg)) => request.json(msg),
            Envelope::Pbft(PbftMessage::Commit(msg)) => request.json(msg),
            Envelope::Pbft(PbftMessage::Reply(msg)) => request.json(msg),
        };

        let response = request
            .send()
            .await
            .map_err(|source| TransportError::Http { peer: to, source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Refused {
                peer: to,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Routes envelopes to inbound channels registered in the same process.
#[derive(Default)]
pub struct InMemoryTransport {
    inboxes: RwLock<HashMap<NodeName, mpsc::Sender<Envelope>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: NodeName, inbox: mpsc::Sender<Envelope>) {
        self.inboxes.write().insert(name, inbox);
    }

    pub fn unregister(&self, name: NodeName) {
        self.inboxes.write().remove(&name);
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, to: NodeName, envelope: Envelope) -> Result<(), TransportError> {
        let inbox = self
            .inboxes
            .read()
            .get(&to)
            .cloned()
            .ok_or(TransportError::UnknownPeer(to))?;
        inbox
            .try_send(envelope)
            .map_err(|_| TransportError::InboxUnavailable(to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qb_03_block::Transaction;

    fn reserve() -> Envelope {
        Envelope::Transaction(Transaction::new_reserve(&["alice".into()], None).unwrap())
    }

    #[tokio::test]
    async fn test_in_memory_delivery() {
        let transport = InMemoryTransport::new();
        let (tx, mut rx) = mpsc::channel(4);
        transport.register(NodeName::replica(2), tx);

        transport
            .send(NodeName::replica(2), reserve())
            .await
            .unwrap();
        assert_eq!(rx.recv().await.map(|e| e.kind()), Some("transaction"));
    }

    #[tokio::test]
    async fn test_in_memory_unknown_peer() {
        let transport = InMemoryTransport::new();
        let err = transport
            .send(NodeName::replica(3), reserve())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownPeer(_)));

        let (tx, rx) = mpsc::channel(1);
        transport.register(NodeName::replica(3), tx);
        drop(rx);
        let err = transport
            .send(NodeName::replica(3), reserve())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InboxUnavailable(_)));
    }

    #[tokio::test]
    async fn test_http_unknown_peer() {
        let transport = HttpTransport::new(HashMap::new()).unwrap();
        let err = transport
            .send(NodeName::client(1), reserve())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownPeer(_)));
    }
}
