//! Domain model for the memory catalogue.
//!
//! # Responsibility
//! - Define the canonical value types shared by the record store, the blob
//!   store and the repository facade.
//! - Keep the model free of storage details (no SQL, no paths).
//!
//! # Invariants
//! - Every memory is identified by a stable `MemoryId` that never changes.
//! - Items, location and recognized text are owned by exactly one memory.
//! - Tags are a shared vocabulary identified by their exact label.

pub mod memory;
