//! `agents.json` read/write (phase 20, spec.md §4.10, §3.6).
//!
//! Grounded on `nerd-accounts::store`'s atomic write-then-rename idiom,
//! reused here for the same crash-safety reason: a half-written
//! `agents.json` must never be observable.

use std::path::Path;

use chrono::{DateTime, Utc};
use nerd_core::types::{AgentRegistry, CreatedAgent};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid registry json: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn registry_path(workspace_root: &Path) -> std::path::PathBuf {
    workspace_root.join(".nerd").join("agents.json")
}

pub fn load(workspace_root: &Path, now: DateTime<Utc>) -> Result<AgentRegistry, RegistryError> {
    let path = registry_path(workspace_root);
    if !path.exists() {
        return Ok(AgentRegistry::new(now));
    }
    let body = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&body)?)
}

/// Atomic write-then-rename, matching `nerd-accounts::store`'s
/// crash-safety guarantee for the same reason: readers must never
/// observe a partially written file.
pub fn save(workspace_root: &Path, registry: &AgentRegistry) -> Result<(), RegistryError> {
    let dir = workspace_root.join(".nerd");
    std::fs::create_dir_all(&dir)?;
    let path = registry_path(workspace_root);
    let tmp_path = path.with_extension("json.tmp");
    let body = serde_json::to_string_pretty(registry)?;
    std::fs::write(&tmp_path, body)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// Merges `fresh` into the existing registry, preserving each
/// pre-existing agent's `created_at` by name (spec.md §7, S6: an
/// upgrade re-run must not reset a surviving agent's creation time).
pub fn merge_preserving_created_at(existing: &AgentRegistry, fresh: Vec<CreatedAgent>) -> Vec<CreatedAgent> {
    fresh
        .into_iter()
        .map(|mut agent| {
            if let Some(prior) = existing.agents.iter().find(|a| a.name == agent.name) {
                agent.created_at = prior.created_at;
            }
            agent
        })
        .collect()
}
