//! Memory repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and predicate fetch over the relational memory layout.
//! - Own the diff-based upsert that avoids rewriting unchanged child rows.
//!
//! # Invariants
//! - Every multi-row write runs inside one transaction.
//! - Child rows (items, location, recognized text, frames) are owned by one
//!   memory and cascade with it; tags only lose their link rows.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::memory::{
    Item, ItemId, Location, Memory, MemoryId, Point, RecognizedText, Rect, Tag, TextFrame,
};
use crate::repo::tag_repo::{insert_tag_if_absent, load_tags_for_memory, replace_memory_tags};
use crate::search::predicate::Predicate;
use crate::search::query::build_search_predicate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const MEMORY_SELECT_SQL: &str = "SELECT
    id,
    created_at,
    modified_at,
    notes,
    is_private
FROM memories";

pub type RepoResult<T> = Result<T, RepoError>;

/// Record-store error for memory persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(MemoryId),
    ItemNotFound(ItemId),
    InvalidData(String),
    /// The single-writer coordinator cannot serve requests anymore.
    Unavailable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "memory not found: {id}"),
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted memory data: {message}"),
            Self::Unavailable(reason) => write!(f, "record store unavailable: {reason}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::ItemNotFound(_) => None,
            Self::InvalidData(_) => None,
            Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// What `upsert_memory` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Repository interface for memory records.
pub trait MemoryRecords {
    fn has_memories(&self) -> RepoResult<bool>;
    /// All memories, newest `created_at` first.
    fn fetch_all(&self) -> RepoResult<Vec<Memory>>;
    fn fetch_by_id(&self, id: MemoryId) -> RepoResult<Option<Memory>>;
    /// Memories matching `predicate`, newest `created_at` first.
    fn fetch_matching(&self, predicate: &Predicate) -> RepoResult<Vec<Memory>>;
    fn memory_id_for_item(&self, item_id: ItemId) -> RepoResult<Option<MemoryId>>;
    /// Tag vocabulary sorted by label.
    fn fetch_tags(&self) -> RepoResult<Vec<Tag>>;
    /// Returns `false` when a tag with the exact label already exists.
    fn insert_tag(&mut self, tag: &Tag) -> RepoResult<bool>;
    fn upsert_memory(&mut self, memory: &Memory) -> RepoResult<UpsertOutcome>;
    fn update_item(&mut self, item: &Item) -> RepoResult<()>;
    /// Returns `false` when no such memory exists.
    fn delete_memory(&mut self, id: MemoryId) -> RepoResult<bool>;
    /// Returns `false` when no such item exists.
    fn delete_item(&mut self, id: ItemId) -> RepoResult<bool>;
    /// Removes every memory and the whole tag vocabulary.
    fn wipe_all(&mut self) -> RepoResult<()>;

    /// Free-text search. Blank queries match nothing.
    fn search(&self, query: &str) -> RepoResult<Vec<Memory>> {
        match build_search_predicate(query) {
            Some(predicate) => self.fetch_matching(&predicate),
            None => Ok(Vec::new()),
        }
    }
}

/// SQLite-backed memory repository.
pub struct SqliteMemoryRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteMemoryRepository<'conn> {
    /// Wraps a migrated connection (see `db::open_db`).
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl MemoryRecords for SqliteMemoryRepository<'_> {
    fn has_memories(&self) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM memories);",
            [],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn fetch_all(&self) -> RepoResult<Vec<Memory>> {
        self.fetch_matching(&Predicate::All)
    }

    fn fetch_by_id(&self, id: MemoryId) -> RepoResult<Option<Memory>> {
        load_memory(self.conn, id)
    }

    fn fetch_matching(&self, predicate: &Predicate) -> RepoResult<Vec<Memory>> {
        let (clause, binds) = predicate.to_sql();
        let sql = format!("{MEMORY_SELECT_SQL} WHERE {clause} ORDER BY created_at DESC, id ASC;");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut memories = Vec::new();
        while let Some(row) = rows.next()? {
            let memory = parse_memory_row(row)?;
            memories.push(load_children(self.conn, memory)?);
        }
        Ok(memories)
    }

    fn memory_id_for_item(&self, item_id: ItemId) -> RepoResult<Option<MemoryId>> {
        let memory_id: Option<String> = self
            .conn
            .query_row(
                "SELECT memory_id FROM items WHERE id = ?1;",
                [item_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        memory_id
            .map(|value| parse_uuid(&value, "items.memory_id"))
            .transpose()
    }

    fn fetch_tags(&self) -> RepoResult<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT label FROM tags ORDER BY label ASC;")?;
        let mut rows = stmt.query([])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(Tag::new(row.get::<_, String>(0)?));
        }
        Ok(tags)
    }

    fn insert_tag(&mut self, tag: &Tag) -> RepoResult<bool> {
        insert_tag_if_absent(self.conn, &tag.label)
    }

    fn upsert_memory(&mut self, memory: &Memory) -> RepoResult<UpsertOutcome> {
        let tx = self.conn.transaction()?;
        let outcome = match load_memory(&tx, memory.id)? {
            None => {
                insert_memory(&tx, memory)?;
                UpsertOutcome::Inserted
            }
            Some(existing) => {
                if update_existing(&tx, &existing, memory)? {
                    UpsertOutcome::Updated
                } else {
                    UpsertOutcome::Unchanged
                }
            }
        };
        tx.commit()?;
        Ok(outcome)
    }

    fn update_item(&mut self, item: &Item) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE items
             SET
                name = ?2,
                center_x = ?3,
                center_y = ?4,
                modified_at = ?5
             WHERE id = ?1;",
            params![
                item.id.to_string(),
                item.name.as_str(),
                item.center.x,
                item.center.y,
                item.modified_at,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::ItemNotFound(item.id));
        }
        Ok(())
    }

    fn delete_memory(&mut self, id: MemoryId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM memories WHERE id = ?1;", [id.to_string()])?;
        Ok(changed > 0)
    }

    fn delete_item(&mut self, id: ItemId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM items WHERE id = ?1;", [id.to_string()])?;
        Ok(changed > 0)
    }

    fn wipe_all(&mut self) -> RepoResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM memories;
             DELETE FROM tags;",
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn load_memory(conn: &Connection, id: MemoryId) -> RepoResult<Option<Memory>> {
    let mut stmt = conn.prepare(&format!("{MEMORY_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    match rows.next()? {
        Some(row) => {
            let memory = parse_memory_row(row)?;
            Ok(Some(load_children(conn, memory)?))
        }
        None => Ok(None),
    }
}

fn parse_memory_row(row: &Row<'_>) -> RepoResult<Memory> {
    let id_text: String = row.get("id")?;
    let mut memory = Memory::with_id(parse_uuid(&id_text, "memories.id")?, row.get("created_at")?);
    memory.modified_at = row.get("modified_at")?;
    memory.notes = row.get("notes")?;
    memory.is_private = match row.get::<_, i64>("is_private")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_private value `{other}` in memories.is_private"
            )));
        }
    };
    Ok(memory)
}

fn load_children(conn: &Connection, mut memory: Memory) -> RepoResult<Memory> {
    let id_text = memory.id.to_string();
    memory.items = load_items(conn, &id_text)?;
    memory.tags = load_tags_for_memory(conn, &id_text)?;
    memory.location = load_location(conn, &id_text)?;
    memory.recognized_text = load_recognized_text(conn, &id_text)?;
    Ok(memory)
}

fn load_items(conn: &Connection, memory_id: &str) -> RepoResult<Vec<Item>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, center_x, center_y, created_at, modified_at
         FROM items
         WHERE memory_id = ?1
         ORDER BY name ASC, id ASC;",
    )?;
    let mut rows = stmt.query([memory_id])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get("id")?;
        items.push(Item {
            id: parse_uuid(&id_text, "items.id")?,
            name: row.get("name")?,
            center: Point::new(row.get("center_x")?, row.get("center_y")?),
            created_at: row.get("created_at")?,
            modified_at: row.get("modified_at")?,
        });
    }
    Ok(items)
}

fn load_location(conn: &Connection, memory_id: &str) -> RepoResult<Option<Location>> {
    let location = conn
        .query_row(
            "SELECT latitude, longitude FROM locations WHERE memory_id = ?1;",
            [memory_id],
            |row| Ok(Location::new(row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(location)
}

fn load_recognized_text(conn: &Connection, memory_id: &str) -> RepoResult<Option<RecognizedText>> {
    let header: Option<(String, String)> = conn
        .query_row(
            "SELECT id, text FROM recognized_texts WHERE memory_id = ?1;",
            [memory_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((id_text, text)) = header else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT text, x, y, width, height
         FROM text_frames
         WHERE recognized_text_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([id_text.as_str()])?;
    let mut frames = Vec::new();
    while let Some(row) = rows.next()? {
        frames.push(TextFrame {
            text: row.get("text")?,
            frame: Rect::new(
                row.get("x")?,
                row.get("y")?,
                row.get("width")?,
                row.get("height")?,
            ),
        });
    }

    Ok(Some(RecognizedText {
        id: parse_uuid(&id_text, "recognized_texts.id")?,
        text,
        frames,
    }))
}

fn insert_memory(conn: &Connection, memory: &Memory) -> RepoResult<()> {
    let memory_id = memory.id.to_string();
    conn.execute(
        "INSERT INTO memories (id, created_at, modified_at, notes, is_private)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            memory_id.as_str(),
            memory.created_at,
            memory.modified_at,
            memory.notes.as_str(),
            bool_to_int(memory.is_private),
        ],
    )?;

    for item in &memory.items {
        insert_item(conn, &memory_id, item)?;
    }
    replace_memory_tags(conn, &memory_id, &memory.tags)?;
    replace_location(conn, &memory_id, memory.location.as_ref())?;
    replace_recognized_text(conn, &memory_id, memory.recognized_text.as_ref())?;
    Ok(())
}

/// Applies only the differences between `existing` and `incoming`.
///
/// Returns whether any row changed. `created_at` is immutable and ignored.
fn update_existing(conn: &Connection, existing: &Memory, incoming: &Memory) -> RepoResult<bool> {
    let memory_id = incoming.id.to_string();
    let mut changed = false;

    if existing.modified_at != incoming.modified_at
        || existing.notes != incoming.notes
        || existing.is_private != incoming.is_private
    {
        conn.execute(
            "UPDATE memories
             SET
                modified_at = ?2,
                notes = ?3,
                is_private = ?4
             WHERE id = ?1;",
            params![
                memory_id.as_str(),
                incoming.modified_at,
                incoming.notes.as_str(),
                bool_to_int(incoming.is_private),
            ],
        )?;
        changed = true;
    }

    if existing.location != incoming.location {
        replace_location(conn, &memory_id, incoming.location.as_ref())?;
        changed = true;
    }

    if existing.recognized_text != incoming.recognized_text {
        replace_recognized_text(conn, &memory_id, incoming.recognized_text.as_ref())?;
        changed = true;
    }

    if reconcile_items(conn, &memory_id, &existing.items, &incoming.items)? {
        changed = true;
    }

    if existing.tags != incoming.tags {
        replace_memory_tags(conn, &memory_id, &incoming.tags)?;
        changed = true;
    }

    Ok(changed)
}

/// Matches items by id: updates in place, removes absent, inserts new.
fn reconcile_items(
    conn: &Connection,
    memory_id: &str,
    existing: &[Item],
    incoming: &[Item],
) -> RepoResult<bool> {
    let mut changed = false;

    for item in incoming {
        match existing.iter().find(|current| current.id == item.id) {
            Some(current) if current == item => {}
            Some(_) => {
                conn.execute(
                    "UPDATE items
                     SET
                        name = ?2,
                        center_x = ?3,
                        center_y = ?4,
                        modified_at = ?5
                     WHERE id = ?1;",
                    params![
                        item.id.to_string(),
                        item.name.as_str(),
                        item.center.x,
                        item.center.y,
                        item.modified_at,
                    ],
                )?;
                changed = true;
            }
            None => {
                insert_item(conn, memory_id, item)?;
                changed = true;
            }
        }
    }

    let kept: HashSet<ItemId> = incoming.iter().map(|item| item.id).collect();
    for item in existing.iter().filter(|item| !kept.contains(&item.id)) {
        conn.execute("DELETE FROM items WHERE id = ?1;", [item.id.to_string()])?;
        changed = true;
    }

    Ok(changed)
}

fn insert_item(conn: &Connection, memory_id: &str, item: &Item) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO items (id, memory_id, name, center_x, center_y, created_at, modified_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            item.id.to_string(),
            memory_id,
            item.name.as_str(),
            item.center.x,
            item.center.y,
            item.created_at,
            item.modified_at,
        ],
    )?;
    Ok(())
}

fn replace_location(
    conn: &Connection,
    memory_id: &str,
    location: Option<&Location>,
) -> RepoResult<()> {
    conn.execute("DELETE FROM locations WHERE memory_id = ?1;", [memory_id])?;
    if let Some(location) = location {
        conn.execute(
            "INSERT INTO locations (memory_id, latitude, longitude) VALUES (?1, ?2, ?3);",
            params![memory_id, location.lat, location.long],
        )?;
    }
    Ok(())
}

fn replace_recognized_text(
    conn: &Connection,
    memory_id: &str,
    recognized: Option<&RecognizedText>,
) -> RepoResult<()> {
    conn.execute(
        "DELETE FROM recognized_texts WHERE memory_id = ?1;",
        [memory_id],
    )?;
    let Some(recognized) = recognized else {
        return Ok(());
    };

    let recognized_id = recognized.id.to_string();
    conn.execute(
        "INSERT INTO recognized_texts (id, memory_id, text) VALUES (?1, ?2, ?3);",
        params![recognized_id.as_str(), memory_id, recognized.text.as_str()],
    )?;
    for (position, frame) in recognized.frames.iter().enumerate() {
        conn.execute(
            "INSERT INTO text_frames (recognized_text_id, position, text, x, y, width, height)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                recognized_id.as_str(),
                position as i64,
                frame.text.as_str(),
                frame.frame.x,
                frame.frame.y,
                frame.frame.width,
                frame.frame.height,
            ],
        )?;
    }
    Ok(())
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
