//! One-shot migrations from older on-disk layouts.
//!
//! # Responsibility
//! - Move a root-level database into the reserved config directory.
//! - Move flat `Images/<id>*.{jpg,png}` files into per-memory directories.
//!
//! # Invariants
//! - Both migrations are no-ops once their legacy source is gone.
//! - A per-memory image failure is logged and skipped; it never aborts the
//!   remaining memories.

use crate::blob::sidecar;
use crate::blob::store::BlobStore;
use crate::config::StoreConfig;
use crate::db::store_files;
use crate::model::memory::Memory;
use crate::repo::record_store::RecordStore;
use crate::service::memory_service::RepositoryResult;
use log::{info, warn};
use std::path::Path;

/// Moves `<root>/database.sqlite` and its WAL/SHM files next to the config
/// directory. Returns whether anything moved.
///
/// Skipped when a database already exists at the new location.
pub fn move_legacy_database(config: &StoreConfig, blobs: &BlobStore) -> RepositoryResult<bool> {
    let legacy = config.legacy_database_path();
    if !blobs.exists(&legacy) {
        return Ok(false);
    }
    let target = config.database_path();
    if blobs.exists(&target) {
        warn!("event=legacy_db_move module=legacy status=skipped reason=target_exists");
        return Ok(false);
    }

    for (from, to) in store_files(&legacy).iter().zip(store_files(&target).iter()) {
        if blobs.exists(from) {
            blobs.move_entry(from, to)?;
        }
    }
    info!("event=legacy_db_move module=legacy status=ok");
    Ok(true)
}

/// Moves every known memory's flat images into its directory, writes its
/// sidecar, then removes `<root>/Images`. Returns the number of memories
/// migrated.
pub fn migrate_legacy_images(
    records: &RecordStore,
    blobs: &BlobStore,
    config: &StoreConfig,
) -> RepositoryResult<usize> {
    let images_dir = config.legacy_images_dir();
    if !blobs.exists(&images_dir) {
        return Ok(0);
    }
    info!("event=legacy_images module=legacy status=start");

    let mut migrated = 0usize;
    for memory in records.fetch_all()? {
        match migrate_memory_images(blobs, &images_dir, &memory) {
            Ok(()) => migrated += 1,
            Err(err) => {
                warn!("event=legacy_images module=legacy status=error error={err}");
            }
        }
    }

    blobs.remove_entry(&images_dir)?;
    info!("event=legacy_images module=legacy status=ok migrated={migrated}");
    Ok(migrated)
}

fn migrate_memory_images(
    blobs: &BlobStore,
    images_dir: &Path,
    memory: &Memory,
) -> RepositoryResult<()> {
    let id = memory.id.to_string();
    let paths = blobs.artifacts_for(memory);

    blobs.move_entry(&images_dir.join(format!("{id}.jpg")), &paths.original)?;
    blobs.move_entry(&images_dir.join(format!("{id}-preview.jpg")), &paths.preview)?;
    blobs.move_entry(
        &images_dir.join(format!("{id}-thumbnail.png")),
        &paths.thumbnail,
    )?;
    blobs.write_file(&sidecar::encode_memory(memory)?, &paths.sidecar, true)?;
    Ok(())
}
