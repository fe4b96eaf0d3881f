//! # Worker Tasks
//!
//! One task per concern, connected by bounded channels:
//!
//! - `dispatcher`: stage gating, buffering and the 200 ms alarm
//! - `resolver`: round state, last commit and reply collection
//! - `broadcaster`: fire-and-forget fan-out
//! - `block_clock`: transaction queue and block packing

pub mod block_clock;
pub mod broadcaster;
pub mod dispatcher;
pub mod resolver;

pub use block_clock::BlockClock;
pub use broadcaster::Broadcaster;
pub use dispatcher::{Dispatcher, MessageBuffer, BUFFER_CAPACITY};
pub use resolver::Resolver;
