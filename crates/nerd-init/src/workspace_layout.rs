//! Creates and upgrades the on-disk `.nerd/` workspace layout
//! (phase 3, spec.md §6.3).
//!
//! Grounded on the teacher's `at-daemon::environment::ensure_layout`
//! idiom: `create_dir_all` every leaf directory up front so later
//! phases never have to check for their own parent.

use std::path::{Path, PathBuf};

const GITIGNORE_BODY: &str = "cache/\nsessions/\n*.backup_*\n";

fn write_if_absent(path: &Path, body: &str) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::write(path, body)?;
    }
    Ok(())
}

/// Absolute paths of every directory that must exist before phase 4
/// (scanning) runs.
pub struct WorkspaceLayout {
    pub root: PathBuf,
    pub shards_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub mangle_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub tools_dir: PathBuf,
    pub tools_compiled_dir: PathBuf,
    pub tools_learnings_dir: PathBuf,
    pub tools_profiles_dir: PathBuf,
    pub tools_traces_dir: PathBuf,
    pub agents_dir: PathBuf,
    pub campaigns_dir: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(workspace_root: &Path) -> Self {
        let root = workspace_root.join(".nerd");
        let tools_dir = root.join("tools");
        Self {
            shards_dir: root.join("shards"),
            sessions_dir: root.join("sessions"),
            cache_dir: root.join("cache"),
            mangle_dir: root.join("mangle"),
            prompts_dir: root.join("prompts"),
            tools_compiled_dir: tools_dir.join(".compiled"),
            tools_learnings_dir: tools_dir.join(".learnings"),
            tools_profiles_dir: tools_dir.join(".profiles"),
            tools_traces_dir: tools_dir.join(".traces"),
            tools_dir,
            agents_dir: root.join("agents"),
            campaigns_dir: root.join("campaigns"),
            root,
        }
    }

    fn all_dirs(&self) -> [&Path; 12] {
        [
            &self.shards_dir,
            &self.sessions_dir,
            &self.cache_dir,
            &self.mangle_dir,
            &self.prompts_dir,
            &self.tools_dir,
            &self.tools_compiled_dir,
            &self.tools_learnings_dir,
            &self.tools_profiles_dir,
            &self.tools_traces_dir,
            &self.agents_dir,
            &self.campaigns_dir,
        ]
    }

    /// Idempotent: safe to call again during an upgrade-mode re-run
    /// (`create_dir_all` on an existing directory is a no-op).
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in self.all_dirs() {
            std::fs::create_dir_all(dir)?;
        }
        write_if_absent(&self.root.join(".gitignore"), GITIGNORE_BODY)?;
        write_if_absent(&self.root.join("config.json"), "{}\n")?;
        write_if_absent(&self.mangle_dir.join("extensions.mg"), "")?;
        write_if_absent(&self.mangle_dir.join("policy_overrides.mg"), "")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_creates_every_leaf_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(tmp.path());
        layout.ensure().unwrap();

        for dir in layout.all_dirs() {
            assert!(dir.is_dir(), "{} should exist", dir.display());
        }
        assert!(layout.root.join(".gitignore").is_file());
        assert!(layout.root.join("config.json").is_file());
        assert!(layout.mangle_dir.join("extensions.mg").is_file());
    }

    #[test]
    fn ensure_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(tmp.path());
        layout.ensure().unwrap();
        std::fs::write(layout.root.join(".gitignore"), "custom\n").unwrap();
        layout.ensure().unwrap();

        let contents = std::fs::read_to_string(layout.root.join(".gitignore")).unwrap();
        assert_eq!(contents, "custom\n");
    }
}
