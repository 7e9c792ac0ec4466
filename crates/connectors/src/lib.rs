//! Threadline Connectors
//!
//! Everything that talks to the agent process: the JSON-RPC bridge that
//! multiplexes calls and notifications over one connection, the WebSocket
//! transport it runs on, and the supervisor that keeps the process alive.

pub mod bridge;
pub mod supervisor;
pub mod transport;

use std::time::Duration;

pub use bridge::{Bridge, NotificationHandler, ThreadSubscription};
pub use supervisor::{AgentSupervisor, SupervisorConfig, SupervisorError};
pub use transport::connect_websocket;

use thiserror::Error;

/// Errors that can occur while talking to the agent process
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Agent unreachable or connection dropped mid-call
    #[error("Agent connectivity error: {0}")]
    Connectivity(String),

    #[error("Agent returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Agent call timed out after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, BridgeError::Connectivity(_))
    }
}
