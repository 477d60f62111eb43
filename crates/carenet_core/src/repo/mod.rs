//! Record store abstraction and SQLite persistence.
//!
//! # Responsibility
//! - Define the storage contract the registry services consume.
//! - Isolate SQLite query details from association orchestration.
//!
//! # Invariants
//! - Store APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.
//! - Cross-entity edits commit through `RecordStore::atomically` only.

pub mod record_store;
