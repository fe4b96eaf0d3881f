//! Per-round PBFT state
//!
//! One `ConsensusState` exists per agreement round. It is created when a
//! request or pre-prepare arrives, driven through its stages by verified
//! messages, and dropped once this node has emitted its Reply.

use std::collections::BTreeMap;
use std::fmt;

use qb_02_uss::{UssAuthenticator, UssSignature};
use qb_03_block::Block;
use serde::{Deserialize, Serialize};
use shared_types::{unix_nanos, Hash, NodeName};
use tracing::{debug, info};

use super::error::{PbftError, PbftResult};
use super::messages::{
    preprepare_signing_message, reply_signing_message, vote_signing_message, CommitMsg,
    PrePrepareMsg, PrepareMsg, ReplyMsg,
};

/// Static parameters of the replica set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PbftConfig {
    pub view: u64,
    /// Replica expected to propose in this view.
    pub primary: NodeName,
    /// Tolerated faulty replicas (`F`).
    pub fault_tolerance: u32,
    /// Byte length of one USS key cell.
    pub unit_len: u32,
}

impl PbftConfig {
    /// `N = 3F + 1`
    pub fn replica_count(&self) -> u32 {
        3 * self.fault_tolerance + 1
    }

    /// Prepares needed before committing (`2F`).
    pub fn prepare_quorum(&self) -> usize {
        2 * self.fault_tolerance as usize
    }

    /// Commits needed before replying (`2F + 1`).
    pub fn commit_quorum(&self) -> usize {
        2 * self.fault_tolerance as usize + 1
    }

    /// Replies needed by the request originator (`F + 1`).
    pub fn reply_quorum(&self) -> usize {
        self.fault_tolerance as usize + 1
    }
}

impl Default for PbftConfig {
    fn default() -> Self {
        Self {
            view: 0,
            primary: NodeName::replica(1),
            fault_tolerance: 1,
            unit_len: 16,
        }
    }
}

/// Stage of the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Round created, no request processed yet.
    Idle,
    /// Request accepted; prepares are being collected.
    PrePrepared,
    /// Own Commit sent; commits are being collected.
    Prepared,
    /// Own Reply sent.
    Committed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::PrePrepared => "pre-prepared",
            Stage::Prepared => "prepared",
            Stage::Committed => "committed",
        };
        f.write_str(name)
    }
}

/// Outcome of a vote-collecting transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress<T> {
    /// Quorum reached; this message must be sent.
    Emit(T),
    /// Vote recorded, quorum not reached yet.
    AwaitingQuorum,
    /// Vote recorded; this node already emitted its message for the round.
    AlreadyEmitted,
}

impl<T> Progress<T> {
    pub fn into_emitted(self) -> Option<T> {
        match self {
            Progress::Emit(msg) => Some(msg),
            Progress::AwaitingQuorum | Progress::AlreadyEmitted => None,
        }
    }
}

/// Messages collected in one round, keyed by replica index.
#[derive(Debug, Clone, Default)]
pub struct MessageLogs {
    pub request: Option<Block>,
    pub prepared: BTreeMap<u32, PrepareMsg>,
    pub committed: BTreeMap<u32, CommitMsg>,
    pub replied: BTreeMap<u32, ReplyMsg>,
}

/// State of one agreement round at one replica.
#[derive(Debug, Clone)]
pub struct ConsensusState {
    config: PbftConfig,
    last_sequence: Option<u64>,
    sequence: Option<u64>,
    digest: Option<Hash>,
    stage: Stage,
    logs: MessageLogs,
    committed_message: Option<CommitMsg>,
}

impl ConsensusState {
    /// New round following the last committed sequence (`None` before the first).
    pub fn new(config: PbftConfig, last_sequence: Option<u64>) -> Self {
        Self {
            config,
            last_sequence,
            sequence: None,
            digest: None,
            stage: Stage::Idle,
            logs: MessageLogs::default(),
            committed_message: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn view(&self) -> u64 {
        self.config.view
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Sequence number assigned to this round, once known.
    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    pub fn logs(&self) -> &MessageLogs {
        &self.logs
    }

    /// Commit that completed the round, set together with the Reply.
    pub fn committed_message(&self) -> Option<&CommitMsg> {
        self.committed_message.as_ref()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Primary: accept `request` and build the signed PrePrepare.
    pub fn pre_prepare(
        &mut self,
        auth: &UssAuthenticator,
        request: Block,
    ) -> PbftResult<PrePrepareMsg> {
        self.require_idle()?;
        request
            .verify_transactions(auth)
            .map_err(PbftError::InvalidTransaction)?;

        let sequence = match self.last_sequence {
            Some(last) => last + 1,
            None => unix_nanos(),
        };
        let digest = request.digest().map_err(PbftError::Block)?;
        let view = self.config.view;
        let signature = auth.sign(
            self.config.replica_count() - 1,
            self.config.unit_len,
            &preprepare_signing_message(view, sequence, &digest),
        )?;

        self.open_round(sequence, digest, request.clone());
        info!(stage = "pre-prepare", view, sequence, "Request accepted by primary");
        Ok(PrePrepareMsg {
            view,
            sequence,
            digest,
            signature,
            request,
        })
    }

    /// Backup: check the primary's PrePrepare and answer with a signed Prepare.
    pub fn prepare(
        &mut self,
        auth: &UssAuthenticator,
        msg: PrePrepareMsg,
    ) -> PbftResult<PrepareMsg> {
        self.require_idle()?;
        self.check_view(msg.view)?;
        self.check_fresh_sequence(msg.sequence)?;
        let digest = msg.request.digest().map_err(PbftError::Block)?;
        check_digest(&digest, &msg.digest)?;
        msg.request
            .verify_transactions(auth)
            .map_err(PbftError::InvalidTransaction)?;
        check_signature(
            auth,
            &msg.signature,
            self.config.primary,
            &msg.signing_message(),
        )?;

        let node_id = self.own_id(auth);
        let signature = auth.sign(
            self.config.replica_count() - 1,
            self.config.unit_len,
            &vote_signing_message(msg.view, msg.sequence, &digest, node_id),
        )?;
        let prepare = PrepareMsg {
            view: msg.view,
            sequence: msg.sequence,
            digest,
            node_id,
            signature,
        };

        self.open_round(msg.sequence, digest, msg.request);
        self.logs.prepared.insert(node_id, prepare.clone());
        info!(
            stage = "prepare",
            view = msg.view,
            sequence = msg.sequence,
            "Pre-prepare accepted"
        );
        Ok(prepare)
    }

    /// Record a Prepare; emit this node's Commit once `2F` prepares are held.
    pub fn commit(
        &mut self,
        auth: &UssAuthenticator,
        msg: PrepareMsg,
    ) -> PbftResult<Progress<CommitMsg>> {
        self.check_vote(
            auth,
            msg.view,
            msg.sequence,
            &msg.digest,
            &msg.signature,
            msg.sender(),
            &msg.signing_message(),
        )?;
        self.logs.prepared.insert(msg.node_id, msg);
        debug!(prepared = self.logs.prepared.len(), "Prepare recorded");

        if !self.is_prepared() {
            return Ok(Progress::AwaitingQuorum);
        }
        let node_id = self.own_id(auth);
        if self.logs.committed.contains_key(&node_id) {
            return Ok(Progress::AlreadyEmitted);
        }

        let (view, sequence, digest) = self.round_key()?;
        let signature = auth.sign(
            self.config.replica_count() - 1,
            self.config.unit_len,
            &vote_signing_message(view, sequence, &digest, node_id),
        )?;
        let commit = CommitMsg {
            view,
            sequence,
            digest,
            node_id,
            signature,
        };
        self.logs.committed.insert(node_id, commit.clone());
        self.stage = Stage::Prepared;
        info!(stage = "commit", view, sequence, "Prepare quorum reached");
        Ok(Progress::Emit(commit))
    }

    /// Record a Commit; emit this node's Reply once `2F + 1` commits are held.
    pub fn reply(
        &mut self,
        auth: &UssAuthenticator,
        msg: CommitMsg,
    ) -> PbftResult<Progress<ReplyMsg>> {
        self.check_vote(
            auth,
            msg.view,
            msg.sequence,
            &msg.digest,
            &msg.signature,
            msg.sender(),
            &msg.signing_message(),
        )?;
        self.logs.committed.insert(msg.node_id, msg.clone());
        debug!(committed = self.logs.committed.len(), "Commit recorded");

        if !self.is_prepared() || self.logs.committed.len() < self.config.commit_quorum() {
            return Ok(Progress::AwaitingQuorum);
        }
        let node_id = self.own_id(auth);
        if self.logs.replied.contains_key(&node_id) {
            return Ok(Progress::AlreadyEmitted);
        }

        let request = self.logs.request.as_ref().ok_or(PbftError::NoActiveRequest)?;
        let view = self.config.view;
        let timestamp = request.timestamp;
        let client_name = request.origin;
        let signature = auth.sign(
            1,
            self.config.unit_len,
            &reply_signing_message(view, timestamp, &client_name, node_id, true),
        )?;
        let reply = ReplyMsg {
            view,
            timestamp,
            client_name,
            node_id,
            result: true,
            signature,
        };
        self.logs.replied.insert(node_id, reply.clone());
        self.committed_message = Some(msg);
        self.stage = Stage::Committed;
        info!(
            stage = "reply",
            view,
            sequence = ?self.sequence,
            client = %client_name,
            "Commit quorum reached"
        );
        Ok(Progress::Emit(reply))
    }

    // =========================================================================
    // Checks
    // =========================================================================

    fn require_idle(&self) -> PbftResult<()> {
        match self.stage {
            Stage::Idle => Ok(()),
            stage => Err(PbftError::RoundInProgress(stage)),
        }
    }

    fn is_prepared(&self) -> bool {
        self.logs.request.is_some() && self.logs.prepared.len() >= self.config.prepare_quorum()
    }

    fn check_view(&self, view: u64) -> PbftResult<()> {
        if view != self.config.view {
            return Err(PbftError::ViewMismatch {
                expected: self.config.view,
                actual: view,
            });
        }
        Ok(())
    }

    fn check_fresh_sequence(&self, sequence: u64) -> PbftResult<()> {
        match self.last_sequence {
            Some(last) if sequence <= last => Err(self.out_of_order(sequence)),
            _ => Ok(()),
        }
    }

    fn out_of_order(&self, sequence: u64) -> PbftError {
        PbftError::SequenceOutOfOrder {
            last: self.last_sequence,
            round: self.sequence,
            actual: sequence,
        }
    }

    /// Shared checks for Prepare and Commit votes.
    #[allow(clippy::too_many_arguments)]
    fn check_vote(
        &self,
        auth: &UssAuthenticator,
        view: u64,
        sequence: u64,
        digest: &Hash,
        signature: &UssSignature,
        sender: NodeName,
        signed: &[u8],
    ) -> PbftResult<()> {
        let request = self.logs.request.as_ref().ok_or(PbftError::NoActiveRequest)?;
        self.check_view(view)?;
        self.check_fresh_sequence(sequence)?;
        if self.sequence != Some(sequence) {
            return Err(self.out_of_order(sequence));
        }
        let expected = self.digest.ok_or(PbftError::NoActiveRequest)?;
        check_digest(&expected, digest)?;
        request
            .verify_transactions(auth)
            .map_err(PbftError::InvalidTransaction)?;
        check_signature(auth, signature, sender, signed)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn open_round(&mut self, sequence: u64, digest: Hash, request: Block) {
        self.sequence = Some(sequence);
        self.digest = Some(digest);
        self.logs.request = Some(request);
        self.stage = Stage::PrePrepared;
    }

    fn round_key(&self) -> PbftResult<(u64, u64, Hash)> {
        match (self.sequence, self.digest) {
            (Some(sequence), Some(digest)) => Ok((self.config.view, sequence, digest)),
            _ => Err(PbftError::NoActiveRequest),
        }
    }

    fn own_id(&self, auth: &UssAuthenticator) -> u32 {
        auth.node_name().index()
    }
}

fn check_digest(expected: &Hash, actual: &Hash) -> PbftResult<()> {
    if expected != actual {
        return Err(PbftError::DigestMismatch {
            expected: hex::encode(expected),
            actual: hex::encode(actual),
        });
    }
    Ok(())
}

/// The signature must come from `sender`, cover exactly `signed` and verify.
pub(crate) fn check_signature(
    auth: &UssAuthenticator,
    signature: &UssSignature,
    sender: NodeName,
    signed: &[u8],
) -> PbftResult<()> {
    let signer = signature.main_row_info.signer_node_name;
    if signer != sender {
        return Err(PbftError::SenderMismatch {
            claimed: sender,
            signer,
        });
    }
    if signature.message != signed || !auth.verify(signature) {
        return Err(PbftError::SignatureInvalid { signer });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum_sizes() {
        let config = PbftConfig {
            fault_tolerance: 2,
            ..PbftConfig::default()
        };
        assert_eq!(config.replica_count(), 7);
        assert_eq!(config.prepare_quorum(), 4);
        assert_eq!(config.commit_quorum(), 5);
        assert_eq!(config.reply_quorum(), 3);
    }

    #[test]
    fn test_new_round_is_idle() {
        let state = ConsensusState::new(PbftConfig::default(), Some(9));
        assert_eq!(state.stage(), Stage::Idle);
        assert_eq!(state.last_sequence(), Some(9));
        assert_eq!(state.sequence(), None);
        assert!(state.logs().request.is_none());
    }

    #[test]
    fn test_fresh_sequence_rule() {
        let state = ConsensusState::new(PbftConfig::default(), Some(9));
        assert!(state.check_fresh_sequence(10).is_ok());
        assert!(matches!(
            state.check_fresh_sequence(9),
            Err(PbftError::SequenceOutOfOrder { actual: 9, .. })
        ));
        let first = ConsensusState::new(PbftConfig::default(), None);
        assert!(first.check_fresh_sequence(0).is_ok());
    }

    #[test]
    fn test_progress_into_emitted() {
        assert_eq!(Progress::Emit(3).into_emitted(), Some(3));
        assert_eq!(Progress::<u8>::AwaitingQuorum.into_emitted(), None);
        assert_eq!(Progress::<u8>::AlreadyEmitted.into_emitted(), None);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::PrePrepared.to_string(), "pre-prepared");
    }
}
