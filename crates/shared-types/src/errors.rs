//! # Error Types
//!
//! Errors raised while parsing participant identities.

use thiserror::Error;

/// Malformed participant identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Node names are `P<n>` or `C<n>` with `n >= 1`.
    #[error("Invalid node name: {0:?}")]
    InvalidNodeName(String),

    /// Device ids are exactly 16 bytes.
    #[error("Invalid device id: expected 16 bytes, got {len}")]
    InvalidDeviceId { len: usize },
}
