//! # Envelopes
//!
//! Every value that crosses a task boundary inside the node is one of the
//! enums below, so each worker matches exhaustively on what it can receive.
//!
//! ```text
//! HTTP / transport ──Envelope──→ dispatcher ──PbftMessage──→ resolver
//!                                    │                          │
//!                          Transaction│                  Outbound│
//!                                    ↓                          ↓
//!                               block clock ──Outbound──→ broadcaster
//! ```

use qb_03_block::{Block, Transaction};
use qb_04_pbft::{CommitMsg, PrePrepareMsg, PrepareMsg, ReplyMsg};
use shared_types::NodeName;

/// Anything a node can receive from the outside.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Client-signed transaction waiting to be packed.
    Transaction(Transaction),
    Pbft(PbftMessage),
}

/// Agreement traffic handled by the dispatcher and the resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum PbftMessage {
    /// A block to agree on; only the primary turns it into a round.
    Request(Block),
    PrePrepare(PrePrepareMsg),
    Prepare(PrepareMsg),
    Commit(CommitMsg),
    Reply(ReplyMsg),
}

/// Work for the broadcaster.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// To every replica except this node.
    Broadcast(Envelope),
    /// To one participant.
    Direct { to: NodeName, envelope: Envelope },
}

impl Envelope {
    /// HTTP path the envelope is posted to.
    pub fn route(&self) -> &'static str {
        match self {
            Envelope::Transaction(_) => "/transaction",
            Envelope::Pbft(msg) => msg.route(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Transaction(_) => "transaction",
            Envelope::Pbft(msg) => msg.kind(),
        }
    }
}

impl PbftMessage {
    pub fn route(&self) -> &'static str {
        match self {
            PbftMessage::Request(_) => "/request",
            PbftMessage::PrePrepare(_) => "/preprepare",
            PbftMessage::Prepare(_) => "/prepare",
            PbftMessage::Commit(_) => "/commit",
            PbftMessage::Reply(_) => "/reply",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PbftMessage::Request(_) => "request",
            PbftMessage::PrePrepare(_) => "pre-prepare",
            PbftMessage::Prepare(_) => "prepare",
            PbftMessage::Commit(_) => "commit",
            PbftMessage::Reply(_) => "reply",
        }
    }
}

impl From<PbftMessage> for Envelope {
    fn from(msg: PbftMessage) -> Self {
        Envelope::Pbft(msg)
    }
}

impl From<Block> for Envelope {
    fn from(block: Block) -> Self {
        Envelope::Pbft(PbftMessage::Request(block))
    }
}

impl From<PrePrepareMsg> for Envelope {
    fn from(msg: PrePrepareMsg) -> Self {
        Envelope::Pbft(PbftMessage::PrePrepare(msg))
    }
}

impl From<PrepareMsg> for Envelope {
    fn from(msg: PrepareMsg) -> Self {
        Envelope::Pbft(PbftMessage::Prepare(msg))
    }
}

impl From<CommitMsg> for Envelope {
    fn from(msg: CommitMsg) -> Self {
        Envelope::Pbft(PbftMessage::Commit(msg))
    }
}

impl From<ReplyMsg> for Envelope {
    fn from(msg: ReplyMsg) -> Self {
        Envelope::Pbft(PbftMessage::Reply(msg))
    }
}

impl From<Transaction> for Envelope {
    fn from(tx: Transaction) -> Self {
        Envelope::Transaction(tx)
    }
}
