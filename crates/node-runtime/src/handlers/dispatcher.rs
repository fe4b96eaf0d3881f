//! # Dispatcher
//!
//! Drains the inbound channel and decides, from the resolver's published
//! stage, whether a message can be resolved now or must wait.
//!
//! ## Gating
//!
//! | Message              | Delivered when        |
//! |----------------------|-----------------------|
//! | Request, PrePrepare  | no round is active    |
//! | Prepare              | stage is PrePrepared  |
//! | Commit               | stage is Prepared     |
//! | Reply                | always                |
//!
//! Anything else is buffered. A delivery flushes the matching buffer first,
//! and the periodic alarm flushes whichever buffer the current stage allows.

use std::collections::VecDeque;
use std::time::Duration;

use qb_03_block::{Block, Transaction};
use qb_04_pbft::{CommitMsg, PrePrepareMsg, PrepareMsg, Stage};
use shared_types::NodeName;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::wiring::{Envelope, NodeStatus, PbftMessage};

/// Messages held per buffer before the oldest is dropped.
pub const BUFFER_CAPACITY: usize = 1024;

/// Messages that arrived before the round could use them.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    requests: VecDeque<Block>,
    preprepares: VecDeque<PrePrepareMsg>,
    prepares: VecDeque<PrepareMsg>,
    commits: VecDeque<CommitMsg>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one message; returns what must be delivered now, oldest first.
    pub fn route(&mut self, msg: PbftMessage, stage: Stage) -> Vec<PbftMessage> {
        match msg {
            PbftMessage::Request(block) => {
                if stage == Stage::Idle {
                    let mut ready = drain(&mut self.requests, PbftMessage::Request);
                    ready.push(PbftMessage::Request(block));
                    ready
                } else {
                    push(&mut self.requests, block, "request");
                    Vec::new()
                }
            }
            PbftMessage::PrePrepare(pp) => {
                if stage == Stage::Idle {
                    let mut ready = drain(&mut self.preprepares, PbftMessage::PrePrepare);
                    ready.push(PbftMessage::PrePrepare(pp));
                    ready
                } else {
                    push(&mut self.preprepares, pp, "pre-prepare");
                    Vec::new()
                }
            }
            PbftMessage::Prepare(prepare) => {
                if stage == Stage::PrePrepared {
                    let mut ready = drain(&mut self.prepares, PbftMessage::Prepare);
                    ready.push(PbftMessage::Prepare(prepare));
                    ready
                } else {
                    push(&mut self.prepares, prepare, "prepare");
                    Vec::new()
                }
            }
            PbftMessage::Commit(commit) => {
                if stage == Stage::Prepared {
                    let mut ready = drain(&mut self.commits, PbftMessage::Commit);
                    ready.push(PbftMessage::Commit(commit));
                    ready
                } else {
                    push(&mut self.commits, commit, "commit");
                    Vec::new()
                }
            }
            PbftMessage::Reply(reply) => vec![PbftMessage::Reply(reply)],
        }
    }

    /// Buffered messages the current stage can now use.
    pub fn on_alarm(&mut self, stage: Stage) -> Vec<PbftMessage> {
        match stage {
            Stage::Idle => {
                let mut ready = drain(&mut self.preprepares, PbftMessage::PrePrepare);
                ready.extend(drain(&mut self.requests, PbftMessage::Request));
                ready
            }
            Stage::PrePrepared => drain(&mut self.prepares, PbftMessage::Prepare),
            Stage::Prepared => drain(&mut self.commits, PbftMessage::Commit),
            Stage::Committed => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len() + self.preprepares.len() + self.prepares.len() + self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn drain<T>(queue: &mut VecDeque<T>, wrap: fn(T) -> PbftMessage) -> Vec<PbftMessage> {
    queue.drain(..).map(wrap).collect()
}

fn push<T>(queue: &mut VecDeque<T>, item: T, kind: &'static str) {
    if queue.len() >= BUFFER_CAPACITY {
        queue.pop_front();
        warn!(kind, capacity = BUFFER_CAPACITY, "Buffer full, oldest message dropped");
    }
    queue.push_back(item);
    debug!(kind, buffered = queue.len(), "Message buffered until the stage allows it");
}

/// Dispatcher task: inbound channel and alarm in, delivery channel out.
pub struct Dispatcher {
    node: NodeName,
    inbound: mpsc::Receiver<Envelope>,
    delivery: mpsc::Sender<PbftMessage>,
    transactions: mpsc::Sender<Transaction>,
    status: watch::Receiver<NodeStatus>,
    alarm: Duration,
    buffer: MessageBuffer,
}

impl Dispatcher {
    pub fn new(
        node: NodeName,
        inbound: mpsc::Receiver<Envelope>,
        delivery: mpsc::Sender<PbftMessage>,
        transactions: mpsc::Sender<Transaction>,
        status: watch::Receiver<NodeStatus>,
        alarm: Duration,
    ) -> Self {
        Self {
            node,
            inbound,
            delivery,
            transactions,
            status,
            alarm,
            buffer: MessageBuffer::new(),
        }
    }

    /// Run until the inbound channel closes or the resolver goes away.
    pub async fn run(mut self) {
        info!(node = %self.node, alarm_ms = self.alarm.as_millis() as u64, "Dispatcher started");
        let mut alarm = tokio::time::interval(self.alarm);
        alarm.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let ready = tokio::select! {
                envelope = self.inbound.recv() => match envelope {
                    Some(Envelope::Transaction(tx)) => {
                        if self.transactions.send(tx).await.is_err() {
                            warn!("Block clock gone, transaction dropped");
                        }
                        continue;
                    }
                    Some(Envelope::Pbft(msg)) => {
                        let stage = self.stage();
                        self.buffer.route(msg, stage)
                    }
                    None => break,
                },
                _ = alarm.tick() => {
                    let stage = self.stage();
                    self.buffer.on_alarm(stage)
                }
            };

            for msg in ready {
                if self.delivery.send(msg).await.is_err() {
                    info!("Resolver gone, dispatcher exiting");
                    return;
                }
            }
        }
        info!("Inbound channel closed, dispatcher exiting");
    }

    fn stage(&self) -> Stage {
        self.status.borrow().stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qb_01_qkd_service::MainRowInfo;
    use qb_02_uss::UssSignature;
    use qb_04_pbft::ReplyMsg;
    use shared_types::{DeviceId, SignIndex};

    fn signature() -> UssSignature {
        UssSignature {
            sign_index: SignIndex::new(DeviceId(*b"QKD-DEVICE-P0001"), [0; 16]),
            main_row_info: MainRowInfo::for_signer(NodeName::replica(1), 3, 16),
            verifier_count: 3,
            unit_len: 16,
            message: Vec::new(),
            tag: Vec::new(),
        }
    }

    fn prepare(node_id: u32) -> PbftMessage {
        PbftMessage::Prepare(PrepareMsg {
            view: 0,
            sequence: 1,
            digest: [0; 32],
            node_id,
            signature: signature(),
        })
    }

    fn commit(node_id: u32) -> PbftMessage {
        PbftMessage::Commit(CommitMsg {
            view: 0,
            sequence: 1,
            digest: [0; 32],
            node_id,
            signature: signature(),
        })
    }

    fn request() -> PbftMessage {
        let block =
            Block::with_timestamp(Vec::new(), [0; 32], 1, NodeName::replica(1), 7).unwrap();
        PbftMessage::Request(block)
    }

    #[test]
    fn test_prepare_waits_for_preprepared() {
        let mut buffer = MessageBuffer::new();
        assert!(buffer.route(prepare(2), Stage::Idle).is_empty());
        assert!(buffer.route(prepare(3), Stage::Prepared).is_empty());
        assert_eq!(buffer.len(), 2);

        let ready = buffer.route(prepare(4), Stage::PrePrepared);
        assert_eq!(ready, vec![prepare(2), prepare(3), prepare(4)]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_commit_waits_for_prepared() {
        let mut buffer = MessageBuffer::new();
        assert!(buffer.route(commit(2), Stage::PrePrepared).is_empty());
        assert!(buffer.on_alarm(Stage::PrePrepared).is_empty());
        assert_eq!(buffer.on_alarm(Stage::Prepared), vec![commit(2)]);
    }

    #[test]
    fn test_request_waits_for_idle() {
        let mut buffer = MessageBuffer::new();
        assert!(buffer.route(request(), Stage::PrePrepared).is_empty());
        assert!(buffer.on_alarm(Stage::Committed).is_empty());
        assert_eq!(buffer.on_alarm(Stage::Idle), vec![request()]);
    }

    #[test]
    fn test_reply_is_never_buffered() {
        let mut buffer = MessageBuffer::new();
        let reply = PbftMessage::Reply(ReplyMsg {
            view: 0,
            timestamp: 7,
            client_name: NodeName::client(1),
            node_id: 2,
            result: true,
            signature: signature(),
        });
        for stage in [Stage::Idle, Stage::PrePrepared, Stage::Prepared, Stage::Committed] {
            assert_eq!(buffer.route(reply.clone(), stage), vec![reply.clone()]);
        }
    }

    #[test]
    fn test_buffer_drops_oldest_when_full() {
        let mut buffer = MessageBuffer::new();
        for i in 0..=BUFFER_CAPACITY as u32 {
            buffer.route(prepare(i), Stage::Idle);
        }
        assert_eq!(buffer.len(), BUFFER_CAPACITY);
        let ready = buffer.on_alarm(Stage::PrePrepared);
        assert_eq!(ready.first(), Some(&prepare(1)));
    }
}
