//! Error types for the PBFT state machine

use qb_02_uss::UssError;
use qb_03_block::BlockError;
use shared_types::NodeName;

use super::Stage;

/// PBFT error types
///
/// Every variant means the offending message was dropped and the round
/// state is unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PbftError {
    #[error("PBFT view mismatch: expected {expected}, got {actual}")]
    ViewMismatch { expected: u64, actual: u64 },

    #[error("Sequence {actual} out of order (last committed {last:?}, round {round:?})")]
    SequenceOutOfOrder {
        last: Option<u64>,
        round: Option<u64>,
        actual: u64,
    },

    #[error("Digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("Signature from {signer} rejected")]
    SignatureInvalid { signer: NodeName },

    #[error("Message claims sender {claimed} but is signed by {signer}")]
    SenderMismatch { claimed: NodeName, signer: NodeName },

    #[error("Reply addressed to {addressee}")]
    MisaddressedReply { addressee: NodeName },

    #[error("Request carries an invalid transaction: {0}")]
    InvalidTransaction(BlockError),

    #[error("No active request in this round")]
    NoActiveRequest,

    #[error("Round already in stage {0}")]
    RoundInProgress(Stage),

    #[error("Block encoding failed: {0}")]
    Block(BlockError),

    #[error("Signing failed: {0}")]
    Signing(#[from] UssError),
}

impl PbftError {
    /// Short category used as the `reason` field of rejection logs.
    pub fn reason(&self) -> &'static str {
        match self {
            PbftError::ViewMismatch { .. } => "view_mismatch",
            PbftError::SequenceOutOfOrder { .. } => "sequence_order",
            PbftError::DigestMismatch { .. } => "digest_mismatch",
            PbftError::SignatureInvalid { .. } | PbftError::SenderMismatch { .. } => {
                "signature_rejected"
            }
            PbftError::MisaddressedReply { .. } => "misaddressed",
            PbftError::InvalidTransaction(_) => "invalid_transaction",
            PbftError::NoActiveRequest => "no_active_request",
            PbftError::RoundInProgress(_) => "round_in_progress",
            PbftError::Block(_) => "encoding",
            PbftError::Signing(_) => "signing",
        }
    }
}

/// Result type for PBFT operations
pub type PbftResult<T> = Result<T, PbftError>;
