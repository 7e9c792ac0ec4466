//! Thread event log - append-only SQLite store of agent notifications.
//!
//! One row per notification, keyed by a store-wide autoincrement sequence id.
//! Rows are never updated; age-based pruning is the only deletion. All
//! methods are blocking and meant for `spawn_blocking` or a dedicated task.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use threadline_protocol::ThreadEvent;

use crate::migration_runner::run_migrations;

pub const DEFAULT_READ_LIMIT: usize = 500;
pub const MAX_READ_LIMIT: usize = 5000;

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid event params: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Event log lock poisoned")]
    Poisoned,
}

pub struct EventLog {
    conn: Mutex<Connection>,
}

impl EventLog {
    /// Open (or create) the log at `path` and apply pending migrations.
    pub fn open(path: &Path) -> Result<Self, EventLogError> {
        let mut conn = Connection::open(path)?;
        run_migrations(&mut conn)?;
        info!(
            component = "event_log",
            event = "event_log.opened",
            path = %path.display(),
            "Event log opened"
        );
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, EventLogError> {
        let mut conn = Connection::open_in_memory()?;
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, EventLogError>,
    ) -> Result<T, EventLogError> {
        let conn = self.conn.lock().map_err(|_| EventLogError::Poisoned)?;
        f(&conn)
    }

    /// Append one notification. Returns its sequence id.
    pub fn append(
        &self,
        thread_id: &str,
        turn_id: Option<&str>,
        method: &str,
        params: &Value,
        created_at_ms: i64,
    ) -> Result<i64, EventLogError> {
        let params_json = serde_json::to_string(params)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO thread_events (thread_id, turn_id, method, params, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![thread_id, turn_id, method, params_json, created_at_ms],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// The newest `limit` events of a thread, in ascending sequence order.
    pub fn read(&self, thread_id: &str, limit: usize) -> Result<Vec<ThreadEvent>, EventLogError> {
        let limit = limit.clamp(1, MAX_READ_LIMIT) as i64;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, thread_id, turn_id, method, params, created_at FROM (
                     SELECT * FROM thread_events WHERE thread_id = ?1
                     ORDER BY id DESC LIMIT ?2
                 ) ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![thread_id, limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?;

            let mut events = Vec::new();
            for row in rows {
                let (id, thread_id, turn_id, method, params, created_at) = row?;
                events.push(ThreadEvent {
                    id,
                    thread_id,
                    turn_id,
                    method,
                    params: serde_json::from_str(&params)?,
                    created_at,
                });
            }
            Ok(events)
        })
    }

    /// Delete events created before `cutoff_ms`. Returns the number removed.
    pub fn prune_older_than(&self, cutoff_ms: i64) -> Result<usize, EventLogError> {
        let removed = self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM thread_events WHERE created_at < ?1",
                params![cutoff_ms],
            )?)
        })?;
        debug!(
            component = "event_log",
            event = "event_log.pruned",
            cutoff_ms,
            removed,
            "Pruned old events"
        );
        Ok(removed)
    }
}
