//! Node status published by the resolver over a `watch` channel.

use qb_04_pbft::Stage;
use serde::Serialize;
use serde_with::{hex::Hex, serde_as};
use shared_types::Hash;

/// Snapshot of the resolver's view of the node.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    /// Stage of the active round, `Idle` when none exists.
    pub stage: Stage,
    /// Sequence of the last committed round.
    pub last_sequence: Option<u64>,
    pub committed_rounds: u64,
    /// Requests originated here that reached the reply quorum.
    pub finalized_requests: usize,
    /// Height of the last committed block (0 before the first).
    pub tip_height: u64,
    #[serde_as(as = "Hex")]
    pub tip_hash: Hash,
}

impl Default for NodeStatus {
    fn default() -> Self {
        Self {
            stage: Stage::Idle,
            last_sequence: None,
            committed_rounds: 0,
            finalized_requests: 0,
            tip_height: 0,
            tip_hash: [0u8; 32],
        }
    }
}

impl NodeStatus {
    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Idle
    }
}
