//! # QKD Service Errors

use shared_types::NodeName;
use thiserror::Error;

/// Upper bound on verifiers per signing event.
pub const MAX_VERIFIER_COUNT: u32 = 256;

/// Upper bound on the byte length of one key cell.
pub const MAX_UNIT_LEN: u32 = 64;

/// Errors raised by the QKD key service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QkdError {
    /// Matrix shape is empty or exceeds the service limits.
    #[error("Invalid key matrix shape: {verifier_count} verifiers x {unit_len} bytes")]
    InvalidDimensions { verifier_count: u32, unit_len: u32 },

    /// The signer holds the full matrix; residuals exist only for verifiers.
    #[error("Signer {signer} cannot read a verifier residual of its own signature")]
    SignerHoldsFullMatrix { signer: NodeName },
}

/// Result type for QKD service operations
pub type QkdResult<T> = Result<T, QkdError>;

/// Reject shapes that are empty or too large to allocate safely.
pub fn check_dimensions(verifier_count: u32, unit_len: u32) -> QkdResult<()> {
    if verifier_count == 0
        || unit_len == 0
        || verifier_count > MAX_VERIFIER_COUNT
        || unit_len > MAX_UNIT_LEN
    {
        return Err(QkdError::InvalidDimensions {
            verifier_count,
            unit_len,
        });
    }
    Ok(())
}
