//! Domain layer for the PBFT state machine
//!
//! - messages: wire messages and their signing encodings
//! - state: per-round state, stages and transitions
//! - replies: reply quorum at the request originator
//! - error: error taxonomy of rejected messages

mod error;
mod messages;
mod replies;
mod state;

pub use error::*;
pub use messages::*;
pub use replies::*;
pub use state::*;
