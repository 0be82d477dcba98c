//! `InitOrchestrator` (C10, spec.md §4.10): the fixed 22-phase
//! sequencer driving Scanner → ProfileBuilder → AgentRecommender →
//! KnowledgeStore(s) → the on-disk `.nerd/` workspace.
//!
//! Grounded on the teacher's `at-daemon::scheduler` sort-and-advance
//! loop, generalized from "pick the next ready task" to "run the next
//! fixed phase in order", plus its semaphore-bounded worker pool
//! idiom for phase 12.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nerd_core::config::InitConfig;
use nerd_core::types::{AgentRegistry, AgentStatus, CreatedAgent, ProjectProfile};
use nerd_harness::Completer;
use nerd_knowledge::KnowledgeStore;
use nerd_scan::{recommend, scan, ProfileBuilder};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::eta::EtaTracker;
use crate::facts;
use crate::kb::{self, AgentBuildResult, AgentBuildStatus, CORE_SHARD_NAMES};
use crate::phases::Phase;
use crate::progress::{AgentUpdate, InitProgress, ProgressSender};
use crate::registry;
use crate::tools;
use crate::workspace_layout::WorkspaceLayout;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("knowledge store error: {0}")]
    Knowledge(#[from] nerd_knowledge::KnowledgeStoreError),
    #[error("agent registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("scan error: {0}")]
    Scan(#[from] nerd_scan::ScanError),
}

#[derive(Debug, Clone)]
pub struct InitResult {
    pub success: bool,
    pub warnings: Vec<String>,
    pub workspace_root: PathBuf,
    pub agent_count: usize,
}

pub struct InitOrchestrator {
    workspace_root: PathBuf,
    config: InitConfig,
    completer: Arc<dyn Completer>,
    progress: ProgressSender,
    deadline: Option<DateTime<Utc>>,
}

impl InitOrchestrator {
    pub fn new(
        workspace_root: impl Into<PathBuf>,
        config: InitConfig,
        completer: Arc<dyn Completer>,
        progress: ProgressSender,
    ) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            config,
            completer,
            progress,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn emit(
        &self,
        eta: &EtaTracker,
        phase: Phase,
        message: impl Into<String>,
        now: DateTime<Utc>,
        agent_update: Option<AgentUpdate>,
    ) {
        let percent = phase.number() as f64 / crate::phases::TOTAL_PHASES as f64;
        self.progress.send(InitProgress {
            phase: phase.name().to_string(),
            message: message.into(),
            percent,
            current_phase_no: phase.number(),
            total_phases: crate::phases::TOTAL_PHASES,
            elapsed: eta.elapsed(now),
            eta_remaining: eta.remaining_eta(&remaining_after(phase)),
            agent_update,
        });
    }

    /// Runs all 22 phases in order. Returns `Ok` whether or not
    /// individual phases warned; only directory/scan failures or an
    /// expired deadline short-circuit with `success = false`.
    pub async fn run(&self) -> Result<InitResult, InitError> {
        let mut warnings = Vec::new();
        let start = Utc::now();
        let eta = EtaTracker::new(start);
        let layout = WorkspaceLayout::new(&self.workspace_root);

        // Phase 1: setup.
        eta.start_phase(Phase::Setup, Utc::now());
        self.emit(&eta, Phase::Setup, "starting background collaborators", Utc::now(), None);
        eta.complete_phase(Phase::Setup, Utc::now());

        // Phase 2: migration — forward-only, applied to any shard stores
        // that already exist from a prior run.
        eta.start_phase(Phase::Migration, Utc::now());
        if layout.shards_dir.is_dir() {
            if let Ok(mut entries) = std::fs::read_dir(&layout.shards_dir) {
                while let Some(Ok(entry)) = entries.next() {
                    if entry.path().extension().and_then(|e| e.to_str()) == Some("db") {
                        match KnowledgeStore::open(entry.path()).await {
                            Ok(store) => {
                                if let Err(e) = store.migrate_to(nerd_knowledge::CURRENT_SCHEMA_VERSION, Utc::now()).await {
                                    warnings.push(format!("migration warning for {:?}: {e}", entry.path()));
                                }
                            }
                            Err(e) => warnings.push(format!("could not open {:?} for migration: {e}", entry.path())),
                        }
                    }
                }
            }
        }
        self.emit(&eta, Phase::Migration, "schema migration complete", Utc::now(), None);
        eta.complete_phase(Phase::Migration, Utc::now());

        // Phase 3: directory — fatal on failure.
        eta.start_phase(Phase::Directory, Utc::now());
        if let Err(e) = layout.ensure() {
            return Ok(self.abort(&layout, warnings, format!("directory creation failed: {e}")));
        }
        self.emit(&eta, Phase::Directory, "workspace layout ready", Utc::now(), None);
        eta.complete_phase(Phase::Directory, Utc::now());

        // Phase 4: scanning — fatal on failure.
        eta.start_phase(Phase::Scanning, Utc::now());
        let scan_summary = match scan(&self.workspace_root, &self.config.skip_dirs, self.config.max_scan_depth) {
            Ok(summary) => summary,
            Err(e) => return Ok(self.abort(&layout, warnings, format!("scan failed: {e}"))),
        };
        let project_store = KnowledgeStore::open(self.workspace_root.join(".nerd/knowledge.db")).await?;
        self.emit(
            &eta,
            Phase::Scanning,
            format!("scanned {} files", scan_summary.file_count),
            Utc::now(),
            None,
        );
        eta.complete_phase(Phase::Scanning, Utc::now());

        // Phase 5: analysis — placeholder; the logic collaborator owns
        // deeper analysis and is out of scope here.
        eta.start_phase(Phase::Analysis, Utc::now());
        self.emit(&eta, Phase::Analysis, "analysis delegated to logic collaborator", Utc::now(), None);
        eta.complete_phase(Phase::Analysis, Utc::now());

        // Phase 6: profile.
        eta.start_phase(Phase::Profile, Utc::now());
        let profile = ProfileBuilder::new(&self.workspace_root, &scan_summary).build(Utc::now());
        write_profile_json(&self.workspace_root, &profile)?;
        self.emit(&eta, Phase::Profile, "project profile saved", Utc::now(), None);
        eta.complete_phase(Phase::Profile, Utc::now());

        // Phase 7: facts.
        eta.start_phase(Phase::Facts, Utc::now());
        let facts_text = facts::render(&scan_summary.facts, &profile);
        std::fs::write(self.workspace_root.join(".nerd/profile.mg"), facts_text)?;
        self.emit(&eta, Phase::Facts, "mangle facts generated", Utc::now(), None);
        eta.complete_phase(Phase::Facts, Utc::now());

        // Phase 8: prompt_atoms — seed project-level prompt atoms into
        // the project knowledge store; the JIT collaborator populates
        // the richer prompt_atoms table later, on demand.
        eta.start_phase(Phase::PromptAtoms, Utc::now());
        project_store
            .store_atom(
                "project:bootstrap_prompt",
                &format!("Initialised workspace for {} ({}).", profile.name, profile.language),
                0.8,
                Utc::now(),
            )
            .await?;
        self.emit(&eta, Phase::PromptAtoms, "project prompt atoms seeded", Utc::now(), None);
        eta.complete_phase(Phase::PromptAtoms, Utc::now());

        // Phase 9: prompt_db — open/create the corpus database.
        eta.start_phase(Phase::PromptDb, Utc::now());
        let _corpus_db = KnowledgeStore::open(self.workspace_root.join(".nerd/prompts/corpus.db")).await?;
        self.emit(&eta, Phase::PromptDb, "prompt corpus db ready", Utc::now(), None);
        eta.complete_phase(Phase::PromptDb, Utc::now());

        // Phase 10: agents.
        eta.start_phase(Phase::Agents, Utc::now());
        let recommended = recommend(&profile);
        self.emit(
            &eta,
            Phase::Agents,
            format!("recommended {} agents", recommended.len()),
            Utc::now(),
            None,
        );
        eta.complete_phase(Phase::Agents, Utc::now());

        // Phase 11: shared_kb.
        eta.start_phase(Phase::SharedKb, Utc::now());
        let shared_atoms = kb::shared_base_atoms();
        let shared_store = KnowledgeStore::open(layout.shards_dir.join("core_concepts.db")).await?;
        shared_store.store_many(&shared_atoms, Utc::now()).await?;
        self.emit(&eta, Phase::SharedKb, "shared concepts seeded", Utc::now(), None);
        eta.complete_phase(Phase::SharedKb, Utc::now());

        if self.deadline_expired(Utc::now()) {
            warnings.push("deadline expired before kb_creation".to_string());
            return Ok(self.finish(&layout, warnings, false, 0));
        }

        // Phase 12: kb_creation — bounded-parallel per-agent builder.
        eta.start_phase(Phase::KbCreation, Utc::now());
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_kb_builds.max(1)));
        let mut handles = Vec::new();
        for agent in recommended.clone() {
            let semaphore = semaphore.clone();
            let shards_dir = layout.shards_dir.clone();
            let shared_atoms = shared_atoms.clone();
            let completer = self.completer.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                kb::build_agent_kb(&shards_dir, &agent, &shared_atoms, completer, Utc::now()).await
            }));
        }
        let mut build_results = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Ok(result)) => build_results.push(result),
                Ok(Err(e)) => warnings.push(format!("agent kb build failed: {e}")),
                Err(e) => warnings.push(format!("agent kb build task panicked: {e}")),
            }
        }
        for result in &build_results {
            if let Some(warning) = &result.warning {
                warnings.push(format!("{}: {warning}", result.name));
            }
            self.emit(
                &eta,
                Phase::KbCreation,
                format!("agent {} ready", result.name),
                Utc::now(),
                Some(AgentUpdate {
                    name: result.name.clone(),
                    status: format!("{:?}", result.status),
                }),
            );
        }
        eta.complete_phase(Phase::KbCreation, Utc::now());

        // Phase 13: codebase_kb.
        eta.start_phase(Phase::CodebaseKb, Utc::now());
        kb::seed_codebase_kb(&project_store, &profile, &scan_summary, Utc::now()).await?;
        self.emit(&eta, Phase::CodebaseKb, "codebase knowledge recorded", Utc::now(), None);
        eta.complete_phase(Phase::CodebaseKb, Utc::now());

        // Phase 14: core_shards_kb.
        eta.start_phase(Phase::CoreShardsKb, Utc::now());
        for shard_name in CORE_SHARD_NAMES {
            kb::seed_core_shard(&layout.shards_dir, shard_name, &shared_atoms, Utc::now()).await?;
        }
        self.emit(&eta, Phase::CoreShardsKb, "core shards seeded", Utc::now(), None);
        eta.complete_phase(Phase::CoreShardsKb, Utc::now());

        // Phase 15: campaign_kb.
        eta.start_phase(Phase::CampaignKb, Utc::now());
        kb::seed_campaign_kb(&layout.shards_dir, Utc::now()).await?;
        self.emit(&eta, Phase::CampaignKb, "campaign knowledge seeded", Utc::now(), None);
        eta.complete_phase(Phase::CampaignKb, Utc::now());

        // Phase 16: tool_generation.
        eta.start_phase(Phase::ToolGeneration, Utc::now());
        let descriptors = tools::collect_tool_descriptors(&recommended);
        self.emit(&eta, Phase::ToolGeneration, "tool descriptors generated", Utc::now(), None);
        eta.complete_phase(Phase::ToolGeneration, Utc::now());

        // Phase 17: preferences.
        eta.start_phase(Phase::Preferences, Utc::now());
        write_if_absent_json(&self.workspace_root.join(".nerd/preferences.json"), &default_preferences())?;
        self.emit(&eta, Phase::Preferences, "preferences file ready", Utc::now(), None);
        eta.complete_phase(Phase::Preferences, Utc::now());

        // Phase 18: session.
        eta.start_phase(Phase::Session, Utc::now());
        write_json(&self.workspace_root.join(".nerd/session.json"), &default_session(Utc::now()))?;
        self.emit(&eta, Phase::Session, "session state initialised", Utc::now(), None);
        eta.complete_phase(Phase::Session, Utc::now());

        // Phase 19: tools.
        eta.start_phase(Phase::Tools, Utc::now());
        tools::write_available_tools(&layout.tools_dir, &descriptors)?;
        self.emit(&eta, Phase::Tools, "available_tools.json written", Utc::now(), None);
        eta.complete_phase(Phase::Tools, Utc::now());

        // Phase 20: registry — merge preserving created_at for any
        // agent that already existed (upgrade mode, S6).
        eta.start_phase(Phase::Registry, Utc::now());
        let existing_registry = registry::load(&self.workspace_root, Utc::now())?;
        let fresh_agents: Vec<CreatedAgent> = build_results
            .iter()
            .map(|r| created_agent_from_build(&layout, r, Utc::now()))
            .collect();
        let merged_agents = registry::merge_preserving_created_at(&existing_registry, fresh_agents);
        let mut registry_doc = AgentRegistry::new(existing_registry.created_at);
        registry_doc.agents = merged_agents;
        registry::save(&self.workspace_root, &registry_doc)?;
        let agent_count = registry_doc.agents.len();
        self.emit(&eta, Phase::Registry, "agents.json written", Utc::now(), None);
        eta.complete_phase(Phase::Registry, Utc::now());

        // Phase 21: prompt_sync — ingest any `agents/<agent>/prompts.yaml`
        // left by a prior run or hand-authored by the user.
        eta.start_phase(Phase::PromptSync, Utc::now());
        if let Err(e) = self.sync_prompts(&layout, &recommended, Utc::now()).await {
            warnings.push(format!("prompt sync warning: {e}"));
        }
        self.emit(&eta, Phase::PromptSync, "prompt sync complete", Utc::now(), None);
        eta.complete_phase(Phase::PromptSync, Utc::now());

        // Phase 22: complete.
        eta.start_phase(Phase::Complete, Utc::now());
        self.emit(&eta, Phase::Complete, "init complete", Utc::now(), None);
        eta.complete_phase(Phase::Complete, Utc::now());

        info!(agents = agent_count, warnings = warnings.len(), "init pipeline finished");
        Ok(InitResult {
            success: true,
            warnings,
            workspace_root: self.workspace_root.clone(),
            agent_count,
        })
    }

    fn deadline_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| now > d)
    }

    fn abort(&self, layout: &WorkspaceLayout, warnings: Vec<String>, reason: String) -> InitResult {
        warn!(reason = %reason, "init pipeline aborted");
        let mut warnings = warnings;
        warnings.push(reason);
        self.finish(layout, warnings, false, 0)
    }

    fn finish(&self, _layout: &WorkspaceLayout, warnings: Vec<String>, success: bool, agent_count: usize) -> InitResult {
        InitResult {
            success,
            warnings,
            workspace_root: self.workspace_root.clone(),
            agent_count,
        }
    }

    /// Phase 21: for every `agents/<name>/prompts.yaml` that exists,
    /// parse its `atoms:` list and upsert each into that agent's store.
    /// A missing or malformed file is not an error — most agents have
    /// no hand-authored prompts yet.
    async fn sync_prompts(
        &self,
        layout: &WorkspaceLayout,
        agents: &[nerd_scan::RecommendedAgent],
        now: DateTime<Utc>,
    ) -> Result<(), InitError> {
        for agent in agents {
            let prompts_path = layout.agents_dir.join(&agent.name).join("prompts.yaml");
            if !prompts_path.is_file() {
                continue;
            }
            let Ok(text) = std::fs::read_to_string(&prompts_path) else {
                continue;
            };
            let atoms = parse_prompt_atoms(&text);
            if atoms.is_empty() {
                continue;
            }
            let store = KnowledgeStore::open(layout.shards_dir.join(format!("{}_knowledge.db", agent.name))).await?;
            for (concept, content) in atoms {
                store.store_atom(&concept, &content, 0.75, now).await?;
            }
        }
        Ok(())
    }
}

/// Minimal `atoms:\n  - concept: ...\n    content: ...` reader. Not a
/// general YAML parser: prompts.yaml is a small, hand-authored format
/// and a full YAML dependency is unwarranted for it.
fn parse_prompt_atoms(text: &str) -> Vec<(String, String)> {
    let mut atoms = Vec::new();
    let mut current_concept: Option<String> = None;
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("- concept:") {
            current_concept = Some(rest.trim().trim_matches('"').to_string());
        } else if let Some(rest) = trimmed.strip_prefix("content:") {
            if let Some(concept) = current_concept.take() {
                atoms.push((concept, rest.trim().trim_matches('"').to_string()));
            }
        }
    }
    atoms
}

fn created_agent_from_build(layout: &WorkspaceLayout, result: &AgentBuildResult, now: DateTime<Utc>) -> CreatedAgent {
    CreatedAgent {
        name: result.name.clone(),
        knowledge_path: layout
            .shards_dir
            .join(format!("{}_knowledge.db", result.name))
            .to_string_lossy()
            .to_string(),
        kb_size: result.kb_size,
        tools: result.tools.clone(),
        created_at: now,
        status: match result.status {
            AgentBuildStatus::Ready => AgentStatus::Ready,
            AgentBuildStatus::Partial => AgentStatus::Partial,
        },
        quality_score: None,
    }
}

fn write_profile_json(workspace_root: &Path, profile: &ProjectProfile) -> std::io::Result<()> {
    write_json(&workspace_root.join(".nerd/profile.json"), profile)
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> std::io::Result<()> {
    let body = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, body)
}

fn write_if_absent_json(path: &Path, value: &impl serde::Serialize) -> std::io::Result<()> {
    if path.exists() {
        return Ok(());
    }
    write_json(path, value)
}

fn default_preferences() -> serde_json::Value {
    serde_json::json!({ "theme": "default", "auto_update_kb": true })
}

fn default_session(now: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({ "started_at": now.to_rfc3339(), "active_agent": serde_json::Value::Null })
}

fn remaining_after(phase: Phase) -> Vec<Phase> {
    Phase::ALL.into_iter().filter(|p| p.number() > phase.number()).collect()
}
