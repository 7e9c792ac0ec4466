//! Stream connection state machine.
//!
//! Disconnected → Connecting → Connected → Reconnecting → Connecting → …
//! Transitions are driven by the view loop; this type only decides the next
//! state and how long to wait before the next attempt.

use std::time::Duration;

pub const BACKOFF_INITIAL: Duration = Duration::from_millis(500);
pub const BACKOFF_MAX: Duration = Duration::from_secs(8);

/// Exponential backoff: initial, doubling, capped.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BACKOFF_INITIAL, BACKOFF_MAX)
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32, delay: Duration },
}

#[derive(Debug)]
pub struct Connection {
    state: ConnectionState,
    backoff: Backoff,
    failures: u32,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new(Backoff::default())
    }
}

impl Connection {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            backoff,
            failures: 0,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Only a connected stream counts as healthy; anything else re-syncs.
    pub fn is_healthy(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    pub fn connected(&mut self) {
        self.failures = 0;
        self.backoff.reset();
        self.state = ConnectionState::Connected;
    }

    /// A connect attempt failed or a live stream dropped. Returns how long
    /// to wait before the next attempt.
    pub fn failed(&mut self) -> Duration {
        self.failures += 1;
        let delay = self.backoff.next_delay();
        self.state = ConnectionState::Reconnecting {
            attempt: self.failures,
            delay,
        };
        delay
    }

    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_failures_double_then_cap() {
        let mut conn = Connection::default();
        let delays: Vec<u128> = (0..7)
            .map(|_| {
                conn.connecting();
                conn.failed().as_millis()
            })
            .collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000, 8000, 8000]);
        assert_eq!(
            conn.state(),
            &ConnectionState::Reconnecting {
                attempt: 7,
                delay: Duration::from_secs(8)
            }
        );
    }

    #[test]
    fn success_resets_backoff() {
        let mut conn = Connection::default();
        conn.failed();
        conn.failed();
        conn.connected();
        assert!(conn.is_healthy());
        assert_eq!(conn.failed(), BACKOFF_INITIAL);
    }

    #[test]
    fn starts_disconnected_and_unhealthy() {
        let mut conn = Connection::default();
        assert_eq!(conn.state(), &ConnectionState::Disconnected);
        assert!(!conn.is_healthy());
        conn.connecting();
        assert!(!conn.is_healthy());
        conn.connected();
        conn.disconnect();
        assert_eq!(conn.state(), &ConnectionState::Disconnected);
    }
}
