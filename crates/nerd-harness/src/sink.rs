//! The `KnowledgeSink` collaborator (spec.md §9): an optional callback
//! a research `Completer` can feed discovered atoms into, decoupling
//! `nerd-init`'s phase 12 workers from any particular knowledge-store
//! backend.

use nerd_core::types::KnowledgeAtom;

#[async_trait::async_trait]
pub trait KnowledgeSink: Send + Sync {
    async fn accept(&self, atom: KnowledgeAtom) -> Result<(), String>;
}

/// Discards every atom. Used where a caller wants to run the research
/// collaborator for side effects only, or in tests that don't assert
/// on sink contents.
#[derive(Debug, Clone, Default)]
pub struct NullSink;

#[async_trait::async_trait]
impl KnowledgeSink for NullSink {
    async fn accept(&self, _atom: KnowledgeAtom) -> Result<(), String> {
        Ok(())
    }
}
