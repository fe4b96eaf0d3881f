//! # Ports Layer
//!
//! - **Inbound (Driving)**: key-material API used by the USS layer

pub mod inbound;
