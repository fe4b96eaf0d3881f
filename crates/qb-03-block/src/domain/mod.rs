//! # Domain Layer
//!
//! - transaction: UTXO-style transactions with per-input USS signatures
//! - block: transaction batches and their digest
//! - errors: block error type

pub mod block;
pub mod errors;
pub mod transaction;
