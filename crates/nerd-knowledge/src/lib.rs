//! Per-agent durable knowledge store (C9, spec.md §4.9).
//!
//! Backed by `tokio_rusqlite::Connection` exactly as the teacher's
//! `at-core::cache::CacheDb` is: same WAL pragma block, same
//! `conn.call(move |conn| { ... })` blocking-closure idiom, same
//! `ON CONFLICT DO UPDATE` upsert style. `nerd-init` opens one store
//! per agent plus one for the shared-concepts pool and one for the
//! project itself.

pub mod store;

pub use store::{KnowledgeStore, KnowledgeStoreError, ValidationReport, CURRENT_SCHEMA_VERSION};
