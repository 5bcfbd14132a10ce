//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate record-store and blob-store calls into memory use-cases.
//! - Keep CLI/UI layers decoupled from storage details.

pub mod legacy;
pub mod memory_service;
pub mod reconcile;

pub use memory_service::{MemoryService, RepositoryError, RepositoryResult};
pub use reconcile::{PurgeSummary, SyncReport};
