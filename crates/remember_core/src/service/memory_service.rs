//! Repository facade over the record store and the blob store.
//!
//! # Responsibility
//! - Keep the two stores consistent for every user-facing mutation.
//! - Bump `modified_at` on persisted edits and keep directory names in step
//!   with item names.
//!
//! # Invariants
//! - `update` of an unchanged memory is a no-op.
//! - `modified_at` strictly increases on every persisted edit.
//! - Item edits route through `update`, so directory renames never lag.
//! - Multi-step writes are not rolled back; `sync` reports the drift.

use crate::blob::render::{self, RenderError};
use crate::blob::sidecar::{self, SidecarError};
use crate::blob::store::{BlobStore, FileSystemError};
use crate::config::StoreConfig;
use crate::db::DbError;
use crate::model::memory::{now_epoch_ms, Item, ItemId, Memory, MemoryId, Tag};
use crate::repo::memory_repo::RepoError;
use crate::repo::record_store::RecordStore;
use crate::search::query::build_search_predicate;
use crate::service::legacy;
use crate::service::reconcile::{self, PurgeSummary, Reconciler, SyncReport};
use image::DynamicImage;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Facade error for memory use-cases.
#[derive(Debug)]
pub enum RepositoryError {
    /// Record-store failure, including schema open failures.
    Storage(RepoError),
    FileSystem(FileSystemError),
    Sidecar(SidecarError),
    Render(RenderError),
    NotFound(MemoryId),
    ItemNotFound(ItemId),
    /// Tag label is blank.
    InvalidTag(String),
}

impl Display for RepositoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::FileSystem(err) => write!(f, "{err}"),
            Self::Sidecar(err) => write!(f, "{err}"),
            Self::Render(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "memory not found: {id}"),
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::InvalidTag(value) => write!(f, "invalid tag: `{value}`"),
        }
    }
}

impl Error for RepositoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::FileSystem(err) => Some(err),
            Self::Sidecar(err) => Some(err),
            Self::Render(err) => Some(err),
            Self::NotFound(_) | Self::ItemNotFound(_) | Self::InvalidTag(_) => None,
        }
    }
}

impl From<RepoError> for RepositoryError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::ItemNotFound(id) => Self::ItemNotFound(id),
            other => Self::Storage(other),
        }
    }
}

impl From<DbError> for RepositoryError {
    fn from(value: DbError) -> Self {
        Self::Storage(RepoError::Db(value))
    }
}

impl From<FileSystemError> for RepositoryError {
    fn from(value: FileSystemError) -> Self {
        Self::FileSystem(value)
    }
}

impl From<SidecarError> for RepositoryError {
    fn from(value: SidecarError) -> Self {
        Self::Sidecar(value)
    }
}

impl From<RenderError> for RepositoryError {
    fn from(value: RenderError) -> Self {
        Self::Render(value)
    }
}

/// Entry point for every memory use-case.
pub struct MemoryService {
    records: RecordStore,
    blobs: BlobStore,
    config: StoreConfig,
}

impl MemoryService {
    /// Builds a facade over an injected record store. The blob root is
    /// `config.memories_dir()`.
    pub fn new(records: RecordStore, config: StoreConfig) -> Self {
        Self {
            records,
            blobs: BlobStore::new(config.memories_dir()),
            config,
        }
    }

    /// Moves a legacy database into place, opens the store and configures
    /// the blob layout.
    pub fn open(config: StoreConfig) -> RepositoryResult<Self> {
        let blobs = BlobStore::new(config.memories_dir());
        legacy::move_legacy_database(&config, &blobs)?;
        let records = RecordStore::open(config.database_path(), config.open_failure_policy)?;
        let service = Self::new(records, config);
        service.configure()?;
        Ok(service)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Creates the blob root and config directory, then migrates the legacy
    /// flat image layout. Idempotent.
    pub fn configure(&self) -> RepositoryResult<()> {
        self.blobs.create_directory(self.blobs.root())?;
        self.blobs.create_directory(&self.blobs.config_dir())?;
        legacy::migrate_legacy_images(&self.records, &self.blobs, &self.config)?;
        info!("event=store_configure module=service status=ok");
        Ok(())
    }

    pub fn has_memories(&self) -> RepositoryResult<bool> {
        Ok(self.records.has_memories()?)
    }

    /// All memories, newest first.
    pub fn fetch_all(&self) -> RepositoryResult<Vec<Memory>> {
        Ok(self.records.fetch_all()?)
    }

    pub fn fetch_by_id(&self, id: MemoryId) -> RepositoryResult<Option<Memory>> {
        Ok(self.records.fetch_by_id(id)?)
    }

    /// Searches tag labels, item names, notes and recognized text. A query
    /// that folds to blank matches nothing.
    pub fn search(&self, text: &str) -> RepositoryResult<Vec<Memory>> {
        if build_search_predicate(text).is_none() {
            return Ok(Vec::new());
        }
        Ok(self.records.search(text)?)
    }

    /// Tag vocabulary ordered by label.
    pub fn fetch_tags(&self) -> RepositoryResult<Vec<Tag>> {
        Ok(self.records.fetch_tags()?)
    }

    /// Adds `tag` to the vocabulary. Returns `false` if it already existed.
    pub fn insert_tag(&self, tag: &Tag) -> RepositoryResult<bool> {
        if tag.label.trim().is_empty() {
            return Err(RepositoryError::InvalidTag(tag.label.clone()));
        }
        Ok(self.records.insert_tag(tag)?)
    }

    /// Renders and writes the four artifacts, then upserts the record.
    ///
    /// Rendering happens before any write and outside the record lock. Items
    /// are stored in name order.
    pub fn save(
        &self,
        memory: &Memory,
        image: &DynamicImage,
        preview: &DynamicImage,
    ) -> RepositoryResult<()> {
        let started_at = Instant::now();
        info!("event=memory_save module=service status=start");

        let mut memory = memory.clone();
        memory.sort_items();
        let rendered = render::render_artifacts(image, preview, &self.config.render_options())?;
        let sidecar = sidecar::encode_memory(&memory)?;

        let paths = self.blobs.artifacts_for(&memory);
        self.blobs.create_directory(&paths.directory)?;
        self.blobs.write_file(&sidecar, &paths.sidecar, true)?;
        self.blobs.write_file(&rendered.original, &paths.original, true)?;
        self.blobs.write_file(&rendered.preview, &paths.preview, true)?;
        self.blobs.write_file(&rendered.thumbnail, &paths.thumbnail, true)?;

        let outcome = self.records.upsert_memory(&memory)?;
        info!(
            "event=memory_save module=service status=ok outcome={:?} items={} duration_ms={}",
            outcome,
            memory.items.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Persists an edited memory and returns the stored value.
    ///
    /// # Contract
    /// - Missing record: `NotFound`.
    /// - `created_at` is fixed at capture; the incoming value is ignored.
    /// - Nothing but timestamps differ: no write, returns the stored value.
    /// - Otherwise bumps `modified_at`, refreshes the sidecar, moves the
    ///   directory when its computed name changed, then upserts.
    pub fn update(&self, memory: &Memory) -> RepositoryResult<Memory> {
        let existing = self
            .records
            .fetch_by_id(memory.id)?
            .ok_or(RepositoryError::NotFound(memory.id))?;

        let mut incoming = memory.clone();
        incoming.created_at = existing.created_at;
        incoming.sort_items();
        if incoming.same_content(&existing) {
            return Ok(existing);
        }

        incoming.modified_at = next_modified(existing.modified_at);
        for item in &mut incoming.items {
            if let Some(previous) = existing.item(item.id) {
                item.modified_at = if previous.same_content(item) {
                    previous.modified_at
                } else {
                    next_modified(previous.modified_at)
                };
            }
        }

        self.refresh_blobs(&existing, &incoming)?;
        let outcome = self.records.upsert_memory(&incoming)?;
        info!(
            "event=memory_update module=service status=ok outcome={:?}",
            outcome
        );
        Ok(incoming)
    }

    /// Replaces one item and persists its memory through `update`.
    pub fn update_item(&self, item: &Item) -> RepositoryResult<Memory> {
        let mut memory = self.owning_memory(item.id)?;
        for slot in &mut memory.items {
            if slot.id == item.id {
                *slot = item.clone();
            }
        }
        self.update(&memory)
    }

    /// Removes one item and persists its memory through `update`.
    pub fn delete_item(&self, item_id: ItemId) -> RepositoryResult<Memory> {
        let mut memory = self.owning_memory(item_id)?;
        memory.items.retain(|item| item.id != item_id);
        self.update(&memory)
    }

    /// Deletes the record (children cascade, tags stay) and its directory.
    pub fn delete(&self, id: MemoryId) -> RepositoryResult<()> {
        let existing = self
            .records
            .fetch_by_id(id)?
            .ok_or(RepositoryError::NotFound(id))?;
        self.records.delete_memory(id)?;

        let directory = self.blobs.directory_for(&existing);
        if self.blobs.exists(&directory) {
            self.blobs.remove_entry(&directory)?;
        }
        info!("event=memory_delete module=service status=ok");
        Ok(())
    }

    /// Deletes every record and tag and every blob-root entry except the
    /// reserved config directory.
    pub fn wipe_all(&self) -> RepositoryResult<()> {
        self.records.wipe_all()?;

        let root = self.blobs.root();
        if self.blobs.exists(root) {
            let config_dir = self.blobs.config_dir();
            for entry in self.blobs.list_directory(root)? {
                if entry != config_dir {
                    self.blobs.remove_entry(&entry)?;
                }
            }
        }
        warn!("event=store_wipe module=service status=ok");
        Ok(())
    }

    /// Scans both stores, recovers sidecar-backed directories and reports
    /// drift. Never deletes.
    pub fn sync(&self) -> RepositoryResult<SyncReport> {
        Reconciler::new(&self.records, &self.blobs).scan()
    }

    /// Deletes the invalid records and orphan directories of `report`.
    pub fn purge(&self, report: &SyncReport) -> RepositoryResult<PurgeSummary> {
        reconcile::purge(&self.records, &self.blobs, report)
    }

    fn owning_memory(&self, item_id: ItemId) -> RepositoryResult<Memory> {
        let memory_id = self
            .records
            .memory_id_for_item(item_id)?
            .ok_or(RepositoryError::ItemNotFound(item_id))?;
        self.records
            .fetch_by_id(memory_id)?
            .ok_or(RepositoryError::NotFound(memory_id))
    }

    /// Rewrites the sidecar in the current directory, then moves the
    /// directory if its computed name changed. Skipped when the current
    /// directory is missing. An occupied rename target fails before anything
    /// is written.
    fn refresh_blobs(&self, existing: &Memory, incoming: &Memory) -> RepositoryResult<()> {
        let current = self.blobs.artifacts_for(existing);
        if !self.blobs.exists(&current.directory) {
            warn!("event=memory_update module=service status=skipped reason=directory_missing");
            return Ok(());
        }

        let target = self.blobs.directory_for(incoming);
        let renamed = target != current.directory;
        if renamed && self.blobs.exists(&target) {
            return Err(FileSystemError::AlreadyExists(target).into());
        }

        let previous_sidecar = sidecar::encode_memory(existing)?;
        let next_sidecar = sidecar::encode_memory(incoming)?;
        if next_sidecar != previous_sidecar || !self.blobs.exists(&current.sidecar) {
            self.blobs.write_file(&next_sidecar, &current.sidecar, true)?;
        }

        if renamed {
            self.blobs.move_entry(&current.directory, &target)?;
            info!("event=memory_rename module=service status=ok");
        }
        Ok(())
    }
}

/// Next modification timestamp: now, or one past `previous` if the clock
/// has not moved forward.
pub fn next_modified(previous: i64) -> i64 {
    now_epoch_ms().max(previous + 1)
}

#[cfg(test)]
mod tests {
    use super::{next_modified, RepositoryError};
    use crate::repo::memory_repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn next_modified_is_strictly_increasing() {
        let far_future = i64::MAX / 2;
        assert_eq!(next_modified(far_future), far_future + 1);
        assert!(next_modified(0) > 0);
    }

    #[test]
    fn repo_not_found_maps_to_facade_not_found() {
        let id = Uuid::new_v4();
        let mapped: RepositoryError = RepoError::NotFound(id).into();
        assert!(matches!(mapped, RepositoryError::NotFound(found) if found == id));
    }
}
