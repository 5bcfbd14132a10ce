//! Reconciliation between memory records and memory directories.
//!
//! # Responsibility
//! - Detect records whose artifacts are missing or incomplete.
//! - Recover unknown directories that carry a readable sidecar.
//! - Report directories that are neither known nor recoverable.
//!
//! # Invariants
//! - `scan` only mutates through recovery (move + upsert); it never deletes.
//! - Without drift in between, two scans return the same report.
//! - `purge` never touches anything outside the blob root or the reserved
//!   config directory.

use crate::blob::sidecar;
use crate::blob::store::{ArtifactPaths, BlobStore};
use crate::model::memory::{Memory, MemoryId};
use crate::repo::record_store::RecordStore;
use crate::service::memory_service::RepositoryResult;
use log::{info, warn};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Drift found by one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Records whose directory lacks one of the four artifacts.
    pub invalid_memories: BTreeSet<MemoryId>,
    /// Root entries with no valid record and no recoverable sidecar.
    pub orphan_directories: BTreeSet<PathBuf>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.invalid_memories.is_empty() && self.orphan_directories.is_empty()
    }
}

/// What `purge` removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub deleted_memories: usize,
    pub removed_directories: usize,
}

enum EntryOutcome {
    Recovered,
    Orphan,
}

/// One full scan over both stores.
pub struct Reconciler<'a> {
    records: &'a RecordStore,
    blobs: &'a BlobStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(records: &'a RecordStore, blobs: &'a BlobStore) -> Self {
        Self { records, blobs }
    }

    pub fn scan(&self) -> RepositoryResult<SyncReport> {
        let started_at = Instant::now();
        info!("event=sync module=reconcile status=start");

        let entries = self.root_entries()?;
        let listed: HashSet<&PathBuf> = entries.iter().collect();
        let mut report = SyncReport::default();
        let mut verified = HashSet::new();

        for memory in self.records.fetch_all()? {
            let directory = self.blobs.directory_for(&memory);
            if !self.blobs.is_complete(&directory) {
                report.invalid_memories.insert(memory.id);
                if listed.contains(&directory) {
                    report.orphan_directories.insert(directory.clone());
                }
            }
            verified.insert(directory);
        }

        let mut recovered = 0usize;
        for entry in &entries {
            if verified.contains(entry) {
                continue;
            }
            match self.reconcile_entry(entry)? {
                EntryOutcome::Recovered => recovered += 1,
                EntryOutcome::Orphan => {
                    report.orphan_directories.insert(entry.clone());
                }
            }
        }

        info!(
            "event=sync module=reconcile status=ok invalid={} orphans={} recovered={} duration_ms={}",
            report.invalid_memories.len(),
            report.orphan_directories.len(),
            recovered,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Blob-root entries, sorted, without the reserved config directory.
    fn root_entries(&self) -> RepositoryResult<Vec<PathBuf>> {
        let root = self.blobs.root();
        if !self.blobs.exists(root) {
            return Ok(Vec::new());
        }
        let config_dir = self.blobs.config_dir();
        Ok(self
            .blobs
            .list_directory(root)?
            .into_iter()
            .filter(|entry| *entry != config_dir)
            .collect())
    }

    /// Recovers `entry` from its sidecar, or classifies it as an orphan.
    ///
    /// A sidecar naming an id that already has a record is an orphan: the
    /// record wins and its own directory is judged separately.
    fn reconcile_entry(&self, entry: &Path) -> RepositoryResult<EntryOutcome> {
        if !entry.is_dir() || !self.blobs.is_complete(entry) {
            return Ok(EntryOutcome::Orphan);
        }

        let paths = ArtifactPaths::in_directory(entry);
        let Some(memory) = self.load_sidecar(&paths.sidecar) else {
            return Ok(EntryOutcome::Orphan);
        };

        if self.records.fetch_by_id(memory.id)?.is_some() {
            return Ok(EntryOutcome::Orphan);
        }

        let target = self.blobs.directory_for(&memory);
        if target.as_path() != entry {
            if self.blobs.exists(&target) {
                return Ok(EntryOutcome::Orphan);
            }
            self.blobs.move_entry(entry, &target)?;
        }

        self.records.upsert_memory(&memory)?;
        info!("event=sync_recover module=reconcile status=ok");
        Ok(EntryOutcome::Recovered)
    }

    /// Reads and decodes a sidecar. Unreadable or undecodable files yield
    /// `None`.
    fn load_sidecar(&self, path: &Path) -> Option<Memory> {
        let bytes = match self.blobs.read_file(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("event=sync_recover module=reconcile status=error reason=read error={err}");
                return None;
            }
        };
        match sidecar::decode_memory(&bytes) {
            Ok(memory) => Some(memory),
            Err(err) => {
                warn!("event=sync_recover module=reconcile status=error reason=decode error={err}");
                None
            }
        }
    }
}

/// Deletes the invalid records and removes the orphan directories listed in
/// `report`. Paths outside the blob root are skipped.
pub fn purge(
    records: &RecordStore,
    blobs: &BlobStore,
    report: &SyncReport,
) -> RepositoryResult<PurgeSummary> {
    let mut summary = PurgeSummary::default();

    for id in &report.invalid_memories {
        if records.delete_memory(*id)? {
            summary.deleted_memories += 1;
        }
    }

    let config_dir = blobs.config_dir();
    for directory in &report.orphan_directories {
        if directory.parent() != Some(blobs.root()) || *directory == config_dir {
            warn!("event=sync_purge module=reconcile status=skipped reason=outside_root");
            continue;
        }
        if blobs.exists(directory) {
            blobs.remove_entry(directory)?;
            summary.removed_directories += 1;
        }
    }

    warn!(
        "event=sync_purge module=reconcile status=ok deleted_memories={} removed_directories={}",
        summary.deleted_memories, summary.removed_directories
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::Reconciler;
    use crate::blob::naming::SIDECAR_FILE_NAME;
    use crate::blob::sidecar::encode_memory;
    use crate::blob::store::BlobStore;
    use crate::model::memory::Memory;
    use crate::repo::record_store::RecordStore;

    #[test]
    fn unreadable_or_undecodable_sidecars_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let records = RecordStore::open_in_memory().unwrap();
        let blobs = BlobStore::new(dir.path());
        let reconciler = Reconciler::new(&records, &blobs);

        let vanished = dir.path().join("gone").join(SIDECAR_FILE_NAME);
        assert!(reconciler.load_sidecar(&vanished).is_none());

        let garbled = dir.path().join(SIDECAR_FILE_NAME);
        std::fs::write(&garbled, b"{ nope").unwrap();
        assert!(reconciler.load_sidecar(&garbled).is_none());

        let memory = Memory::with_id(uuid::Uuid::new_v4(), 1_760_627_045_000);
        std::fs::write(&garbled, encode_memory(&memory).unwrap()).unwrap();
        let loaded = reconciler.load_sidecar(&garbled).unwrap();
        assert_eq!(loaded.id, memory.id);
    }
}
