//! # QKD Key Service (QB-01)
//!
//! Deterministic simulation of the QKD key distribution behind the USS
//! signature scheme.
//!
//! ## Architecture
//!
//! - **PRF** (`prf`): iterated HMAC-SHA256 byte generator
//! - **Domain Layer** (`domain/`): key matrix, main-row rule, residuals
//! - **Ports Layer** (`ports/`): `QkdKeyApi` consumed by the USS layer
//! - **Service Layer** (`service.rs`): node-bound service with residual pool
//!
//! ## Key Distribution Model
//!
//! The signer of an event holds a `k x k` matrix of key cells. Verifier `v`
//! holds exactly one cell per row, on a diagonal selected by its main row.
//! Distinct verifiers of one signer hold disjoint cells, so no verifier can
//! forge a tag that another verifier would accept.

pub mod cache;
pub mod domain;
pub mod ports;
pub mod prf;
pub mod service;

pub use cache::{ResidualKey, ResidualPool, DEFAULT_POOL_CAPACITY};
pub use domain::*;
pub use ports::inbound::QkdKeyApi;
pub use prf::generate_random_bytes;
pub use service::{QkdConfig, QkdService, DEFAULT_QKD_SEED};
