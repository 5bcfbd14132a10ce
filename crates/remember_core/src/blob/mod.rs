//! Blob store: per-memory artifact directories.
//!
//! # Responsibility
//! - Name memory directories deterministically from content.
//! - Provide filesystem primitives, sidecar encoding and image rendering.
//!
//! # Invariants
//! - The reserved `.config` directory is never a memory directory.

pub mod naming;
pub mod render;
pub mod sidecar;
pub mod store;

pub use naming::directory_name;
pub use store::{ArtifactPaths, BlobStore, FileSystemError, FsResult};
