//! Filesystem scanning, project-profile derivation, and agent
//! recommendation (C6/C7/C8, spec.md §4.6–§4.8).

pub mod profile;
pub mod recommender;
pub mod scanner;

pub use profile::ProfileBuilder;
pub use recommender::{recommend, Permission, RecommendedAgent};
pub use scanner::{scan, Classification, Fact, ScanError, ScanSummary};
