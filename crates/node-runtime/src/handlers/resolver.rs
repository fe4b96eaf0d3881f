//! # Resolver
//!
//! Owns the round state and drives it with the messages the dispatcher
//! releases. Outgoing messages go to the broadcaster; the current stage is
//! published after every message so the dispatcher can gate the next ones.
//!
//! ## Round Lifecycle
//!
//! 1. A Request (primary) or PrePrepare (backup) opens a round.
//! 2. Prepares and Commits advance it.
//! 3. Once this node's Reply is out, the round's Commit becomes the last
//!    committed one and the state is dropped. The next round starts after
//!    its sequence.
//!
//! A round that never reaches quorum stays open: there is no round timeout
//! and no view change.

use std::sync::Arc;

use qb_02_uss::UssAuthenticator;
use qb_03_block::Block;
use qb_04_pbft::{
    CommitMsg, ConsensusState, PbftConfig, PbftError, PbftResult, PrePrepareMsg, PrepareMsg,
    Progress, ReplyCollector, ReplyMsg, ReplyStatus, Stage,
};
use shared_types::{Hash, NodeName};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::wiring::{Envelope, NodeStatus, Outbound, PbftMessage};

/// Resolver task state.
pub struct Resolver {
    auth: Arc<UssAuthenticator>,
    config: PbftConfig,
    state: Option<ConsensusState>,
    /// Own Commit of the most recent round completed at this node.
    last_commit: Option<CommitMsg>,
    committed_rounds: u64,
    replies: ReplyCollector,
    tip_height: u64,
    tip_hash: Hash,
    delivery: mpsc::Receiver<PbftMessage>,
    /// Back to the dispatcher, for round openers that arrived mid-round.
    requeue: mpsc::Sender<Envelope>,
    outbound: mpsc::Sender<Outbound>,
    status: watch::Sender<NodeStatus>,
}

impl Resolver {
    pub fn new(
        auth: Arc<UssAuthenticator>,
        config: PbftConfig,
        delivery: mpsc::Receiver<PbftMessage>,
        requeue: mpsc::Sender<Envelope>,
        outbound: mpsc::Sender<Outbound>,
        status: watch::Sender<NodeStatus>,
    ) -> Self {
        Self {
            auth,
            config,
            state: None,
            last_commit: None,
            committed_rounds: 0,
            replies: ReplyCollector::new(config.reply_quorum()),
            tip_height: 0,
            tip_hash: [0u8; 32],
            delivery,
            requeue,
            outbound,
            status,
        }
    }

    pub fn node_name(&self) -> NodeName {
        self.auth.node_name()
    }

    pub async fn run(mut self) {
        info!(node = %self.node_name(), primary = %self.config.primary, "Resolver started");
        while let Some(msg) = self.delivery.recv().await {
            let kind = msg.kind();
            if let Err(err) = self.resolve(msg).await {
                warn!(kind, reason = err.reason(), error = %err, "Message rejected");
            }
            self.publish();
        }
        info!("Delivery channel closed, resolver exiting");
    }

    /// Apply one delivered message to the round.
    pub async fn resolve(&mut self, msg: PbftMessage) -> PbftResult<()> {
        match msg {
            PbftMessage::Request(block) => self.on_request(block).await,
            PbftMessage::PrePrepare(msg) => self.on_preprepare(msg).await,
            PbftMessage::Prepare(msg) => self.on_prepare(msg).await,
            PbftMessage::Commit(msg) => self.on_commit(msg).await,
            PbftMessage::Reply(msg) => self.on_reply(&msg),
        }
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            stage: self.state.as_ref().map_or(Stage::Idle, |s| s.stage()),
            last_sequence: self.last_sequence(),
            committed_rounds: self.committed_rounds,
            finalized_requests: self.replies.finalized_count(),
            tip_height: self.tip_height,
            tip_hash: self.tip_hash,
        }
    }

    pub fn last_commit(&self) -> Option<&CommitMsg> {
        self.last_commit.as_ref()
    }

    fn last_sequence(&self) -> Option<u64> {
        self.last_commit.as_ref().map(|commit| commit.sequence)
    }

    fn publish(&self) {
        self.status.send_replace(self.status());
    }

    // =========================================================================
    // Round openers
    // =========================================================================

    async fn on_request(&mut self, block: Block) -> PbftResult<()> {
        if self.node_name() != self.config.primary {
            debug!(primary = %self.config.primary, "Forwarding request to the primary");
            self.send(Outbound::Direct {
                to: self.config.primary,
                envelope: block.into(),
            })
            .await;
            return Ok(());
        }
        if self.state.is_some() {
            self.requeue(block.into());
            return Ok(());
        }

        let mut state = ConsensusState::new(self.config, self.last_sequence());
        let preprepare = state.pre_prepare(&self.auth, block)?;
        self.state = Some(state);
        self.send(Outbound::Broadcast(preprepare.into())).await;
        Ok(())
    }

    async fn on_preprepare(&mut self, msg: PrePrepareMsg) -> PbftResult<()> {
        if self.state.is_some() {
            self.requeue(msg.into());
            return Ok(());
        }

        let mut state = ConsensusState::new(self.config, self.last_sequence());
        let prepare = state.prepare(&self.auth, msg)?;
        self.state = Some(state);
        self.send(Outbound::Broadcast(prepare.into())).await;
        Ok(())
    }

    // =========================================================================
    // Votes
    // =========================================================================

    async fn on_prepare(&mut self, msg: PrepareMsg) -> PbftResult<()> {
        let state = self.state.as_mut().ok_or(PbftError::NoActiveRequest)?;
        match state.commit(&self.auth, msg)? {
            Progress::Emit(commit) => self.send(Outbound::Broadcast(commit.into())).await,
            Progress::AwaitingQuorum | Progress::AlreadyEmitted => {}
        }
        Ok(())
    }

    async fn on_commit(&mut self, msg: CommitMsg) -> PbftResult<()> {
        let state = self.state.as_mut().ok_or(PbftError::NoActiveRequest)?;
        match state.reply(&self.auth, msg)? {
            Progress::Emit(reply) => self.finish_round(reply).await,
            Progress::AwaitingQuorum | Progress::AlreadyEmitted => {}
        }
        Ok(())
    }

    async fn finish_round(&mut self, reply: ReplyMsg) {
        if let Some(state) = self.state.take() {
            if let Some(commit) = state.committed_message() {
                self.last_commit = Some(commit.clone());
                self.committed_rounds += 1;
            }
            if let Some(block) = &state.logs().request {
                self.tip_height = block.height;
                self.tip_hash = block.hash;
            }
            info!(
                sequence = ?state.sequence(),
                height = self.tip_height,
                committed_rounds = self.committed_rounds,
                "Round committed"
            );
        }

        if reply.client_name == self.node_name() {
            if let Err(err) = self.on_reply(&reply) {
                warn!(reason = err.reason(), error = %err, "Own reply rejected");
            }
        } else {
            self.send(Outbound::Direct {
                to: reply.client_name,
                envelope: reply.into(),
            })
            .await;
        }
    }

    // =========================================================================
    // Replies
    // =========================================================================

    fn on_reply(&mut self, msg: &ReplyMsg) -> PbftResult<()> {
        match self.replies.record(&self.auth, msg)? {
            ReplyStatus::Pending { count } => {
                debug!(timestamp = msg.timestamp, from = msg.node_id, count, "Reply recorded");
            }
            ReplyStatus::Finalized { count } => {
                info!(timestamp = msg.timestamp, replies = count, "Request finalized");
            }
            ReplyStatus::AlreadyFinal => {
                debug!(timestamp = msg.timestamp, from = msg.node_id, "Late reply ignored");
            }
        }
        Ok(())
    }

    // =========================================================================
    // Channels
    // =========================================================================

    async fn send(&self, outbound: Outbound) {
        if self.outbound.send(outbound).await.is_err() {
            warn!("Broadcaster gone, outbound message dropped");
        }
    }

    /// Return a round opener to the dispatcher, which buffers it until idle.
    fn requeue(&self, envelope: Envelope) {
        debug!(kind = envelope.kind(), "Round in progress, message requeued");
        if self.requeue.try_send(envelope).is_err() {
            warn!("Inbound channel unavailable, requeued message dropped");
        }
    }
}
