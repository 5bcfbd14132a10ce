//! Single-writer coordinator for the record store.
//!
//! # Responsibility
//! - Own the one SQLite connection used by the process.
//! - Funnel every read and write through one lock so calls queue instead of
//!   interleaving at the record level.
//!
//! # Invariants
//! - Each call is atomic on its own; no atomicity spans two calls.
//! - The handle is constructed explicitly and injected, never global.

use crate::db::{open_db_in_memory, open_store, DbResult, OpenFailurePolicy};
use crate::model::memory::{Item, ItemId, Memory, MemoryId, Tag};
use crate::repo::memory_repo::{
    MemoryRecords, RepoError, RepoResult, SqliteMemoryRepository, UpsertOutcome,
};
use crate::search::predicate::Predicate;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

/// Serialized access to the memory record store.
pub struct RecordStore {
    conn: Mutex<Connection>,
}

impl RecordStore {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Opens (or creates) the store file at `path`.
    pub fn open(path: impl AsRef<Path>, policy: OpenFailurePolicy) -> DbResult<Self> {
        Ok(Self::new(open_store(path, policy)?))
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Runs `op` with exclusive access to the repository.
    pub fn run<T>(
        &self,
        op: impl FnOnce(&mut SqliteMemoryRepository<'_>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| RepoError::Unavailable("connection lock poisoned"))?;
        let mut repo = SqliteMemoryRepository::new(&mut guard);
        op(&mut repo)
    }

    pub fn has_memories(&self) -> RepoResult<bool> {
        self.run(|repo| repo.has_memories())
    }

    pub fn fetch_all(&self) -> RepoResult<Vec<Memory>> {
        self.run(|repo| repo.fetch_all())
    }

    pub fn fetch_by_id(&self, id: MemoryId) -> RepoResult<Option<Memory>> {
        self.run(|repo| repo.fetch_by_id(id))
    }

    pub fn fetch_matching(&self, predicate: &Predicate) -> RepoResult<Vec<Memory>> {
        self.run(|repo| repo.fetch_matching(predicate))
    }

    pub fn search(&self, query: &str) -> RepoResult<Vec<Memory>> {
        self.run(|repo| repo.search(query))
    }

    pub fn memory_id_for_item(&self, item_id: ItemId) -> RepoResult<Option<MemoryId>> {
        self.run(|repo| repo.memory_id_for_item(item_id))
    }

    pub fn fetch_tags(&self) -> RepoResult<Vec<Tag>> {
        self.run(|repo| repo.fetch_tags())
    }

    pub fn insert_tag(&self, tag: &Tag) -> RepoResult<bool> {
        self.run(|repo| repo.insert_tag(tag))
    }

    pub fn upsert_memory(&self, memory: &Memory) -> RepoResult<UpsertOutcome> {
        self.run(|repo| repo.upsert_memory(memory))
    }

    pub fn update_item(&self, item: &Item) -> RepoResult<()> {
        self.run(|repo| repo.update_item(item))
    }

    pub fn delete_memory(&self, id: MemoryId) -> RepoResult<bool> {
        self.run(|repo| repo.delete_memory(id))
    }

    pub fn delete_item(&self, id: ItemId) -> RepoResult<bool> {
        self.run(|repo| repo.delete_item(id))
    }

    pub fn wipe_all(&self) -> RepoResult<()> {
        self.run(|repo| repo.wipe_all())
    }
}
