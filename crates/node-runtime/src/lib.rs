//! # Node Runtime Library
//!
//! Everything a QB node runs besides the protocol crates: configuration,
//! the worker tasks, the HTTP surface and the transports. The binary in
//! `main.rs` is a thin shell around [`NodeRuntime`].
//!
//! ## Known Limitation
//!
//! There is no round timeout and no view change. If a round cannot gather
//! its quorum (a silent primary, too many faulty replicas) the node stays in
//! that round and buffers new requests indefinitely.

pub mod adapters;
pub mod container;
pub mod handlers;
pub mod wiring;

pub use adapters::{HttpTransport, InMemoryTransport, Transport, TransportError};
pub use container::{ConfigError, NodeConfig, NodeContainer};
pub use wiring::{Envelope, NodeRuntime, NodeStatus, Outbound, PbftMessage};
