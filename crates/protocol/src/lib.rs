//! Threadline Protocol
//!
//! Shared types for communication between the Threadline server, the agent
//! bridge and remote clients. These types are serialized as JSON over
//! WebSocket, Server-Sent Events and the REST log endpoint.

pub mod stream;
pub mod types;
pub mod walk;

pub use stream::StreamFrame;
pub use types::*;
