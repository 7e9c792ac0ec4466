//! Schema migrations for the event log database.
//!
//! Migrations are numbered SQL files under `migrations/`, embedded at build
//! time. `schema_versions` records what has been applied; each pending
//! migration runs in its own transaction.

use std::collections::HashSet;

use rusqlite::{params, Connection, Transaction};
use tracing::{debug, info};

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "001_thread_events",
    sql: include_str!("../migrations/001_thread_events.sql"),
}];

const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;";

const VERSIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_versions (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)";

fn applied_versions(conn: &Connection) -> rusqlite::Result<HashSet<i64>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_versions")?;
    let versions = stmt.query_map([], |row| row.get(0))?;
    versions.collect()
}

fn apply(tx: &Transaction<'_>, migration: &Migration) -> rusqlite::Result<()> {
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO schema_versions (version, name) VALUES (?1, ?2)",
        params![migration.version, migration.name],
    )?;
    Ok(())
}

/// Bring the database up to the latest schema. Returns how many migrations
/// ran.
pub fn run_migrations(conn: &mut Connection) -> rusqlite::Result<usize> {
    conn.execute_batch(CONNECTION_PRAGMAS)?;
    conn.execute_batch(VERSIONS_TABLE)?;

    let applied = applied_versions(conn)?;
    let mut ran = 0;
    for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        let tx = conn.transaction()?;
        apply(&tx, migration)?;
        tx.commit()?;

        info!(
            component = "migrations",
            event = "migration.applied",
            version = migration.version,
            name = migration.name,
            "Applied migration"
        );
        ran += 1;
    }

    debug!(
        component = "migrations",
        event = "migrations.complete",
        known = MIGRATIONS.len(),
        ran,
        "Schema up to date"
    );
    Ok(ran)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_once() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&mut conn).unwrap(), MIGRATIONS.len());
        assert_eq!(run_migrations(&mut conn).unwrap(), 0);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM thread_events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn versions_are_recorded() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        let applied = applied_versions(&conn).unwrap();
        assert!(MIGRATIONS.iter().all(|m| applied.contains(&m.version)));
    }
}
