//! # Adapters
//!
//! Edges of the node: the HTTP server that feeds the dispatcher and the
//! transports the broadcaster sends through.

pub mod server;
pub mod transport;

pub use server::{router, ApiState};
pub use transport::{HttpTransport, InMemoryTransport, Transport, TransportError};
