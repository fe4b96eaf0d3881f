//! # USS Errors

use qb_01_qkd_service::QkdError;
use thiserror::Error;

/// Errors raised while signing or checking a USS signature.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UssError {
    /// Message does not fit the Toeplitz matrix; it is never truncated.
    #[error("Message of {len} bytes exceeds the {max}-byte limit")]
    MessageTooLong { len: usize, max: usize },

    /// Signature fields disagree with each other or with the tag length.
    #[error("Malformed signature: {0}")]
    Malformed(&'static str),

    /// Acceptance parameter outside `(0, 1]`.
    #[error("Verification delta {0} outside (0, 1]")]
    InvalidDelta(f64),

    /// Key material could not be derived.
    #[error("Key service error: {0}")]
    Qkd(#[from] QkdError),
}

/// Result type for USS operations
pub type UssResult<T> = Result<T, UssError>;
