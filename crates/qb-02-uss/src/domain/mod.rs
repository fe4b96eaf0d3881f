//! # Domain Layer
//!
//! Toeplitz hashing, the signature entity and the acceptance rule.

pub mod errors;
pub mod signature;
pub mod toeplitz;
