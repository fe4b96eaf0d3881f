//! # Block Clock
//!
//! Queues client transactions and, on every tick, packs them into a block
//! that enters the dispatcher as a Request. Only the primary packs; any
//! other node forwards transactions to it.

use std::sync::Arc;
use std::time::Duration;

use qb_02_uss::UssAuthenticator;
use qb_03_block::{Block, Transaction};
use shared_types::NodeName;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::wiring::{Envelope, NodeStatus, Outbound};

pub struct BlockClock {
    auth: Arc<UssAuthenticator>,
    primary: NodeName,
    interval: Duration,
    min_transactions: usize,
    queue: Vec<Transaction>,
    transactions: mpsc::Receiver<Transaction>,
    inbound: mpsc::Sender<Envelope>,
    outbound: mpsc::Sender<Outbound>,
    status: watch::Receiver<NodeStatus>,
}

impl BlockClock {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        auth: Arc<UssAuthenticator>,
        primary: NodeName,
        interval: Duration,
        min_transactions: usize,
        transactions: mpsc::Receiver<Transaction>,
        inbound: mpsc::Sender<Envelope>,
        outbound: mpsc::Sender<Outbound>,
        status: watch::Receiver<NodeStatus>,
    ) -> Self {
        Self {
            auth,
            primary,
            interval,
            min_transactions: min_transactions.max(1),
            queue: Vec::new(),
            transactions,
            inbound,
            outbound,
            status,
        }
    }

    fn is_primary(&self) -> bool {
        self.auth.node_name() == self.primary
    }

    pub async fn run(mut self) {
        info!(
            node = %self.auth.node_name(),
            primary = self.is_primary(),
            interval_ms = self.interval.as_millis() as u64,
            "Block clock started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                tx = self.transactions.recv() => match tx {
                    Some(tx) => self.accept(tx).await,
                    None => break,
                },
                _ = ticker.tick() => self.pack().await,
            }
        }
        info!("Transaction channel closed, block clock exiting");
    }

    async fn accept(&mut self, tx: Transaction) {
        if !self.is_primary() {
            debug!(tx = %tx.id_hex(), primary = %self.primary, "Forwarding transaction");
            let forward = Outbound::Direct {
                to: self.primary,
                envelope: tx.into(),
            };
            if self.outbound.send(forward).await.is_err() {
                warn!("Broadcaster gone, transaction dropped");
            }
            return;
        }
        if let Err(err) = tx.verify_signatures(&self.auth) {
            warn!(
                tx = %tx.id_hex(),
                reason = "invalid_transaction",
                error = %err,
                "Transaction rejected"
            );
            return;
        }
        debug!(tx = %tx.id_hex(), queued = self.queue.len() + 1, "Transaction queued");
        self.queue.push(tx);
    }

    /// Pack the queue once enough transactions wait and no round is active.
    async fn pack(&mut self) {
        if self.queue.len() < self.min_transactions {
            return;
        }
        let status = *self.status.borrow();
        if !status.is_idle() {
            debug!(
                stage = %status.stage,
                queued = self.queue.len(),
                "Round active, packing deferred"
            );
            return;
        }

        let transactions = std::mem::take(&mut self.queue);
        let count = transactions.len();
        let block = match Block::new(
            transactions,
            status.tip_hash,
            status.tip_height + 1,
            self.auth.node_name(),
        ) {
            Ok(block) => block,
            Err(err) => {
                error!(error = %err, dropped = count, "Failed to pack block");
                return;
            }
        };
        info!(height = block.height, transactions = count, "Block packed");
        if self.inbound.send(block.into()).await.is_err() {
            warn!("Dispatcher gone, block dropped");
        }
    }
}
