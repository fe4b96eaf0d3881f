//! # Shared Types Crate
//!
//! Identity and indexing types shared by every QB crate.
//!
//! ## Design Principles
//!
//! - **Explicit identity**: the current node's name travels as a value
//!   (`NodeName`) through signing and verification; there is no process-wide
//!   "who am I" variable.
//! - **One key per signing event**: `SignIndex` is the only input from which
//!   key material is derived.

pub mod entities;
pub mod errors;
pub mod time;

pub use entities::*;
pub use errors::*;
pub use time::{unix_nanos, unix_secs};
