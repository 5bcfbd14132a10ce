//! Tag vocabulary persistence helpers.
//!
//! # Responsibility
//! - Insert vocabulary entries without duplicates.
//! - Replace the tag links of one memory wholesale.
//!
//! # Invariants
//! - Label identity is exact and case-sensitive (`BINARY` collation), for
//!   both deduplication and ordering.
//! - Deleting a memory removes its link rows, never vocabulary rows.

use crate::model::memory::Tag;
use crate::repo::memory_repo::RepoResult;
use rusqlite::{params, Connection};
use std::collections::BTreeSet;

/// Inserts `label` into the vocabulary. Returns `false` if it already existed.
pub(crate) fn insert_tag_if_absent(conn: &Connection, label: &str) -> RepoResult<bool> {
    let changed = conn.execute("INSERT OR IGNORE INTO tags (label) VALUES (?1);", [label])?;
    Ok(changed > 0)
}

/// Replaces every tag link of `memory_id` with `tags`, inserting missing
/// vocabulary entries. Callers provide the transaction.
pub(crate) fn replace_memory_tags(
    conn: &Connection,
    memory_id: &str,
    tags: &BTreeSet<Tag>,
) -> RepoResult<()> {
    conn.execute("DELETE FROM memory_tags WHERE memory_id = ?1;", [memory_id])?;
    for tag in tags {
        insert_tag_if_absent(conn, &tag.label)?;
        conn.execute(
            "INSERT INTO memory_tags (memory_id, tag_label) VALUES (?1, ?2);",
            params![memory_id, tag.label.as_str()],
        )?;
    }
    Ok(())
}

/// Loads the tag set linked to one memory.
pub(crate) fn load_tags_for_memory(conn: &Connection, memory_id: &str) -> RepoResult<BTreeSet<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT tag_label
         FROM memory_tags
         WHERE memory_id = ?1
         ORDER BY tag_label ASC;",
    )?;
    let mut rows = stmt.query([memory_id])?;
    let mut tags = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tags.insert(Tag::new(row.get::<_, String>(0)?));
    }
    Ok(tags)
}
