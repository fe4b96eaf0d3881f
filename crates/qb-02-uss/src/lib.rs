//! # Unconditionally Secure Signatures (QB-02)
//!
//! Multi-verifier authentication codes keyed by the QKD service.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): Toeplitz hashing, signature entity,
//!   acceptance threshold
//! - **Service Layer** (`service.rs`): `UssAuthenticator`, bound to one node
//!
//! ## Scheme
//!
//! The signer compresses the message with a per-event Toeplitz matrix and
//! masks the 16-byte digest with every cell of its key matrix. A verifier
//! recomputes the cells of its residual and accepts when enough of them
//! match the tag.

pub mod domain;
pub mod service;

pub use domain::errors::{UssError, UssResult};
pub use domain::signature::{
    mask_digest, MatchCount, UssSignature, VerifyThreshold, DEFAULT_VERIFY_DELTA,
};
pub use domain::toeplitz::{
    pad_message, ToeplitzMatrix, DEFAULT_TOEPLITZ_SEED, DIGEST_LEN, MESSAGE_LEN,
};
pub use service::{UssAuthenticator, UssConfig};
