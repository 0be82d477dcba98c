//! Structured logging for the `nerd` workspace.
//!
//! Trimmed from the teacher's broader observability crate (which also
//! shipped Prometheus metrics and axum middleware) down to the logging
//! init the init pipeline and CLI actually use — there is no HTTP
//! server left in this workspace to instrument (spec.md §1 Non-goals:
//! single-process, no wire protocol).

pub mod logging;

pub use logging::{init_logging, init_logging_json};
