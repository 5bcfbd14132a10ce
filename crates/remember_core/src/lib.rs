//! Core persistence for the Remember memory catalogue.
//!
//! Memories live in two stores that must stay in step: a SQLite record store
//! and one artifact directory per memory. `MemoryService` is the only entry
//! point that mutates both.

pub mod blob;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use blob::render::{fit_preview, RenderError, RenderOptions};
pub use blob::sidecar::SidecarError;
pub use blob::store::{BlobStore, FileSystemError};
pub use config::StoreConfig;
pub use db::{DbError, OpenFailurePolicy};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::memory::{
    Item, ItemId, Location, Memory, MemoryId, Point, RecognizedText, Rect, Tag, TextFrame,
};
pub use repo::memory_repo::{MemoryRecords, RepoError, RepoResult, UpsertOutcome};
pub use repo::record_store::RecordStore;
pub use search::predicate::{Predicate, SearchField};
pub use search::query::build_search_predicate;
pub use service::{MemoryService, PurgeSummary, RepositoryError, RepositoryResult, SyncReport};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
