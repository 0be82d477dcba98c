//! Workspace Initialisation Pipeline (C6-C11, spec.md §4.6-§4.11):
//! scans a repository, derives a project profile, recommends
//! specialist agents, and seeds a self-contained, idempotent,
//! migratable `.nerd/` workspace.

pub mod eta;
pub mod facts;
pub mod kb;
pub mod orchestrator;
pub mod phases;
pub mod progress;
pub mod registry;
pub mod tools;
pub mod workspace_layout;

pub use eta::EtaTracker;
pub use orchestrator::{InitError, InitOrchestrator, InitResult};
pub use phases::{Phase, TOTAL_PHASES};
pub use progress::{channel, AgentUpdate, InitProgress, ProgressSender};
pub use workspace_layout::WorkspaceLayout;
