//! Schema version registry and executor.
//!
//! # Responsibility
//! - Describe every record-store schema version in strictly increasing order.
//! - Apply pending versions atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Every version is additive: new tables, or new columns with defaults.
//!   Columns are never renamed or removed, so older rows are default-filled
//!   and no data transform step exists.
//! - Applied version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// One record-shape descriptor.
#[derive(Debug, Clone, Copy)]
pub struct SchemaVersion {
    pub version: u32,
    pub description: &'static str,
    sql: &'static str,
}

/// Ordered schema history. Append only.
pub const SCHEMA_VERSIONS: &[SchemaVersion] = &[
    SchemaVersion {
        version: 1,
        description: "memories, items, tags, locations",
        sql: include_str!("0001_init.sql"),
    },
    SchemaVersion {
        version: 2,
        description: "memory notes",
        sql: include_str!("0002_notes.sql"),
    },
    SchemaVersion {
        version: 3,
        description: "private flag and recognized text",
        sql: include_str!("0003_recognized_text.sql"),
    },
];

/// Returns the latest schema version known by this binary.
pub fn latest_version() -> u32 {
    SCHEMA_VERSIONS.last().map_or(0, |schema| schema.version)
}

/// Returns the DDL of one schema version, if known.
pub fn version_sql(version: u32) -> Option<&'static str> {
    SCHEMA_VERSIONS
        .iter()
        .find(|schema| schema.version == version)
        .map(|schema| schema.sql)
}

/// Applies all pending schema versions on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for schema in SCHEMA_VERSIONS {
        if schema.version <= current_version {
            continue;
        }

        tx.execute_batch(schema.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", schema.version))?;
        info!(
            "event=db_migrate module=db status=ok version={} description=\"{}\"",
            schema.version, schema.description
        );
    }
    tx.commit()?;

    Ok(())
}

/// Reads `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
