//! Collaborator interfaces the workspace initialisation pipeline calls
//! out through, without owning their implementations (spec.md §9).
//!
//! `nerd-init` depends on the [`Completer`] trait for JIT prompt
//! compilation / strategic-knowledge research, and on [`KnowledgeSink`]
//! for streaming newly-researched atoms back in. Concrete providers
//! (an Anthropic client, a Mangle solver callback, …) live outside this
//! workspace; this crate only ships the seam plus test doubles.

pub mod completer;
pub mod sink;

pub use completer::{Completer, CompleterError, StubCompleter};
pub use sink::{KnowledgeSink, NullSink};
