//! SQLite knowledge base.
//!
//! Runtime defaults are intentionally conservative:
//! - `journal_mode = WAL` so searches can read while an ingest appends
//! - `busy_timeout = 5s` to reduce transient lock failures under contention
//! - `foreign_keys = ON` so deleting a document removes its chunks

pub mod migrations;
pub mod schema;
pub mod store;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::{path::Path, time::Duration};

/// Busy timeout used for knowledge base connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the knowledge base database, apply runtime pragmas,
/// and migrate schema to the latest version.
///
/// An empty database is a valid starting state.
///
/// # Errors
///
/// Returns an error if opening/configuring/migrating the database fails.
pub fn open_kb(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create knowledge base directory {}", parent.display()))?;
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("open knowledge base {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply knowledge base migrations")?;

    Ok(conn)
}

/// Open an existing knowledge base, returning `None` if the file is missing.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be opened or migrated.
pub fn try_open_kb(path: &Path) -> Result<Option<Connection>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("open knowledge base {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply knowledge base migrations")?;

    Ok(Some(conn))
}

/// Open a migrated in-memory knowledge base.
///
/// # Errors
///
/// Returns an error if SQLite cannot create the schema.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("open in-memory knowledge base")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    migrations::migrate(&mut conn).context("apply knowledge base migrations")?;
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BUSY_TIMEOUT, open_kb, try_open_kb};
    use crate::db::migrations;
    use tempfile::TempDir;

    fn temp_db_path() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("kb.sqlite3");
        (dir, path)
    }

    #[test]
    fn open_kb_sets_wal_busy_timeout_and_fk() {
        let (_dir, path) = temp_db_path();
        let conn = open_kb(&path).expect("open knowledge base");

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(
            u128::from(busy_timeout_ms),
            DEFAULT_BUSY_TIMEOUT.as_millis()
        );

        let foreign_keys: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("query foreign_keys");
        assert_eq!(foreign_keys, 1);

        assert_eq!(
            migrations::current_schema_version(&conn).expect("schema version"),
            migrations::LATEST_SCHEMA_VERSION
        );
    }

    #[test]
    fn try_open_kb_returns_none_for_missing_file() {
        let (_dir, path) = temp_db_path();
        assert!(try_open_kb(&path).expect("no error").is_none());

        drop(open_kb(&path).expect("create"));
        assert!(try_open_kb(&path).expect("no error").is_some());
    }
}
