//! Free-text search over memory records.
//!
//! # Responsibility
//! - Turn user queries into record-store predicates.
//! - Keep matching rules (folding, tokenization) inside core.

pub mod predicate;
pub mod query;
