//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas and custom functions required by core.
//! - Trigger schema migrations before returning a usable connection.
//! - Recover from an unreadable store according to `OpenFailurePolicy`.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have migrations fully applied.

use super::functions::register_functions;
use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info, warn};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const STORE_FILE_SUFFIXES: [&str; 3] = ["", "-wal", "-shm"];

/// What to do when the store cannot be opened or migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFailurePolicy {
    /// Surface the error to the caller.
    Fail,
    /// Delete the store files and start from an empty store.
    Recreate,
}

impl OpenFailurePolicy {
    /// `Fail` in debug builds, `Recreate` in release builds.
    pub fn for_build() -> Self {
        if cfg!(debug_assertions) {
            Self::Fail
        } else {
            Self::Recreate
        }
    }
}

impl Default for OpenFailurePolicy {
    fn default() -> Self {
        Self::for_build()
    }
}

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Creates the parent directory when missing.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=file");

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_file_connection(&mut conn) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode=file duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=memory");

    let mut conn = match Connection::open_in_memory() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=memory duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode=memory duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=memory duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Opens the store file, applying `policy` when open or migration fails.
///
/// With `Recreate`, the database and its WAL/SHM companions are removed and
/// an empty store is created in their place.
pub fn open_store(path: impl AsRef<Path>, policy: OpenFailurePolicy) -> DbResult<Connection> {
    let path = path.as_ref();
    match open_db(path) {
        Ok(conn) => Ok(conn),
        Err(err) if policy == OpenFailurePolicy::Recreate => {
            warn!(
                "event=db_recreate module=db status=start error_code=schema_open_failed error={}",
                err
            );
            remove_store_files(path)?;
            let conn = open_db(path)?;
            warn!("event=db_recreate module=db status=ok");
            Ok(conn)
        }
        Err(err) => Err(err),
    }
}

/// Removes a store file and its WAL/SHM companions. Missing files are skipped.
pub fn remove_store_files(path: impl AsRef<Path>) -> DbResult<()> {
    for file in store_files(path.as_ref()) {
        match std::fs::remove_file(&file) {
            Ok(()) => info!("event=db_remove_file module=db status=ok"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Lists the store file and its WAL/SHM companion paths.
pub(crate) fn store_files(path: &Path) -> Vec<PathBuf> {
    STORE_FILE_SUFFIXES
        .iter()
        .map(|suffix| {
            let mut name = path.as_os_str().to_os_string();
            name.push(suffix);
            PathBuf::from(name)
        })
        .collect()
}

fn bootstrap_file_connection(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    bootstrap_connection(conn)
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    register_functions(conn)?;
    apply_migrations(conn)?;
    Ok(())
}
