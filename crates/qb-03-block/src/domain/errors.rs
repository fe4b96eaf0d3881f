//! # Block Errors

use qb_02_uss::UssError;
use thiserror::Error;

/// Errors raised while building, signing or checking transactions and blocks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlockError {
    /// Canonical encoding failed.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Transaction id does not match its contents.
    #[error("Transaction id mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: String, actual: String },

    /// A non-reserve input carries no signature.
    #[error("Input {input} of transaction {tx_id} is unsigned")]
    MissingSignature { tx_id: String, input: usize },

    /// The signature covers different bytes than the input.
    #[error("Input {input} of transaction {tx_id} signs a different message")]
    SignedMessageMismatch { tx_id: String, input: usize },

    /// The signature did not pass USS verification.
    #[error("Input {input} of transaction {tx_id} failed signature verification")]
    SignatureRejected { tx_id: String, input: usize },

    /// Signing an input failed.
    #[error("Signing failed: {0}")]
    Signing(#[from] UssError),
}

impl From<bincode::Error> for BlockError {
    fn from(e: bincode::Error) -> Self {
        BlockError::Encoding(e.to_string())
    }
}

/// Result type for block operations
pub type BlockResult<T> = Result<T, BlockError>;
