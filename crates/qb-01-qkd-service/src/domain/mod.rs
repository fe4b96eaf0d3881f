//! Domain layer for the QKD key service
//!
//! - allocation: main-row rule over replicas and clients
//! - matrix: full key matrix and verifier residuals
//! - errors: service error type and shape limits

mod allocation;
mod errors;
mod matrix;

pub use allocation::*;
pub use errors::*;
pub use matrix::*;
