//! Record-store layer: repository contracts and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for memories and tags.
//! - Isolate SQLite query details from the repository facade.
//! - Serialize all record access through `RecordStore`.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `ItemNotFound`) in
//!   addition to DB transport errors.

pub mod memory_repo;
pub mod record_store;
pub mod tag_repo;
