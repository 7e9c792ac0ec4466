//! Application state

use std::sync::Arc;
use std::time::Duration;

use threadline_connectors::Bridge;

use crate::credentials::Credentials;
use crate::event_log::EventLog;

/// Shared state handed to every route and session.
pub struct AppState {
    pub bridge: Bridge,
    pub event_log: Arc<EventLog>,
    pub credentials: Credentials,
    /// Interval between keepalive frames on live streams
    pub keepalive: Duration,
}

impl AppState {
    pub fn new(
        bridge: Bridge,
        event_log: Arc<EventLog>,
        credentials: Credentials,
        keepalive: Duration,
    ) -> Self {
        Self {
            bridge,
            event_log,
            credentials,
            keepalive,
        }
    }
}
