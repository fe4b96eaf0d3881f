//! Reply collection at the request originator
//!
//! A request is final once `F + 1` distinct replicas sent a verified Reply
//! for it: at least one of them is honest.

use std::collections::{BTreeSet, HashMap};

use qb_02_uss::UssAuthenticator;
use tracing::info;

use super::error::{PbftError, PbftResult};
use super::messages::ReplyMsg;
use super::state::check_signature;

/// Outcome of recording one Reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// Reply recorded; `count` distinct replicas so far.
    Pending { count: usize },
    /// This Reply completed the quorum for its request.
    Finalized { count: usize },
    /// Request was already final; the Reply is ignored.
    AlreadyFinal,
}

/// Collects Replies addressed to this node, keyed by `(view, timestamp)`.
#[derive(Debug, Clone)]
pub struct ReplyCollector {
    quorum: usize,
    pending: HashMap<(u64, u64), BTreeSet<u32>>,
    finalized: BTreeSet<(u64, u64)>,
}

impl ReplyCollector {
    pub fn new(quorum: usize) -> Self {
        Self {
            quorum: quorum.max(1),
            pending: HashMap::new(),
            finalized: BTreeSet::new(),
        }
    }

    /// Verify `reply` and record its sender.
    pub fn record(
        &mut self,
        auth: &UssAuthenticator,
        reply: &ReplyMsg,
    ) -> PbftResult<ReplyStatus> {
        if reply.client_name != auth.node_name() {
            return Err(PbftError::MisaddressedReply {
                addressee: reply.client_name,
            });
        }
        check_signature(
            auth,
            &reply.signature,
            reply.sender(),
            &reply.signing_message(),
        )?;

        let key = (reply.view, reply.timestamp);
        if self.finalized.contains(&key) {
            return Ok(ReplyStatus::AlreadyFinal);
        }
        let senders = self.pending.entry(key).or_default();
        senders.insert(reply.node_id);
        let count = senders.len();
        if count < self.quorum {
            return Ok(ReplyStatus::Pending { count });
        }

        self.pending.remove(&key);
        self.finalized.insert(key);
        info!(
            view = reply.view,
            timestamp = reply.timestamp,
            replies = count,
            "Request committed by the consortium"
        );
        Ok(ReplyStatus::Finalized { count })
    }

    /// Number of requests that reached the reply quorum.
    pub fn finalized_count(&self) -> usize {
        self.finalized.len()
    }

    pub fn is_final(&self, view: u64, timestamp: u64) -> bool {
        self.finalized.contains(&(view, timestamp))
    }
}
