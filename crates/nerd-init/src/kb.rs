//! Knowledge-base seeding for the project store, the shared-concepts
//! pool, per-agent stores, the fixed internal shards, and the campaign
//! shard (phases 11-15, spec.md §4.10).

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nerd_core::types::{KnowledgeAtom, ProjectProfile};
use nerd_harness::{Completer, CompleterError};
use nerd_knowledge::KnowledgeStore;
use nerd_scan::{RecommendedAgent, ScanSummary};
use tracing::warn;

/// Hardcoded base atoms seeded into the shared-concepts pool (phase
/// 11) and inherited-by-copy into every agent store. Small and fixed
/// on purpose: this is bootstrap knowledge, not research output.
pub fn shared_base_atoms() -> Vec<KnowledgeAtom> {
    [
        ("code_review_checklist", "Check for correctness, security, and test coverage before approving a change."),
        ("commit_hygiene", "Small, reviewable commits with messages describing what changed and why."),
        ("test_pyramid", "Prefer many fast unit tests, fewer integration tests, and a handful of end-to-end tests."),
        ("error_handling", "Propagate errors with context; never silently swallow a failure."),
        ("dependency_hygiene", "Pin versions, review transitive dependency changes, avoid unmaintained crates."),
    ]
    .into_iter()
    .map(|(concept, content)| KnowledgeAtom::new(concept, content, 0.9))
    .collect()
}

/// Base atoms every freshly created agent gets, derived from its
/// recommended topics.
fn agent_topic_atoms(agent: &RecommendedAgent) -> Vec<KnowledgeAtom> {
    agent
        .topics
        .iter()
        .map(|topic| {
            KnowledgeAtom::new(
                format!("topic:{topic}"),
                format!("{} specializes in {topic}: {}", agent.name, agent.reason),
                0.8,
            )
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentBuildStatus {
    Ready,
    Partial,
}

#[derive(Debug, Clone)]
pub struct AgentBuildResult {
    pub name: String,
    pub status: AgentBuildStatus,
    pub kb_size: usize,
    pub warning: Option<String>,
    pub tools: Vec<String>,
}

/// Build (or, in upgrade mode, append to) one agent's knowledge store.
/// Inherits the shared atoms, stores topic atoms, then optionally asks
/// the research `Completer` for one additional strategic atom. A
/// `Completer` failure (e.g. the default `StubCompleter`'s
/// `NotConfigured`) only marks this agent `Partial`; it never aborts
/// the phase (spec.md §4.10, §7).
pub async fn build_agent_kb(
    shards_dir: &Path,
    agent: &RecommendedAgent,
    shared_atoms: &[KnowledgeAtom],
    completer: Arc<dyn Completer>,
    now: DateTime<Utc>,
) -> Result<AgentBuildResult, nerd_knowledge::KnowledgeStoreError> {
    let db_path = shards_dir.join(format!("{}_knowledge.db", agent.name));
    let store = KnowledgeStore::open(&db_path).await?;

    store.store_many(shared_atoms, now).await?;
    store.store_many(&agent_topic_atoms(agent), now).await?;

    let system_prompt = format!(
        "You are researching durable knowledge for a {} specialist agent.",
        agent.name
    );
    let user_prompt = format!(
        "Summarise one high-value, durable fact about: {}",
        agent.topics.join(", ")
    );

    let (status, warning) = match completer.complete(&system_prompt, &user_prompt).await {
        Ok(researched) => {
            store
                .store_atom(&format!("research:{}", agent.name), &researched, 0.7, now)
                .await?;
            (AgentBuildStatus::Ready, None)
        }
        Err(CompleterError::NotConfigured(msg)) => (AgentBuildStatus::Partial, Some(msg)),
        Err(e) => {
            warn!(agent = %agent.name, error = %e, "research completer failed");
            (AgentBuildStatus::Partial, Some(e.to_string()))
        }
    };

    let kb_size = store.count().await?;
    Ok(AgentBuildResult {
        name: agent.name.clone(),
        status,
        kb_size,
        warning,
        tools: agent.tools.clone(),
    })
}

/// Fixed internal shards (phase 14): coder, reviewer, tester. These
/// are not user-recommended agents; they always exist.
pub const CORE_SHARD_NAMES: &[&str] = &["coder", "reviewer", "tester"];

pub async fn seed_core_shard(
    shards_dir: &Path,
    shard_name: &str,
    shared_atoms: &[KnowledgeAtom],
    now: DateTime<Utc>,
) -> Result<usize, nerd_knowledge::KnowledgeStoreError> {
    let db_path = shards_dir.join(format!("{shard_name}_knowledge.db"));
    let store = KnowledgeStore::open(&db_path).await?;
    store.store_many(shared_atoms, now).await?;
    let atom = KnowledgeAtom::new(
        format!("role:{shard_name}"),
        format!("The {shard_name} shard handles {shard_name}-stage work in the core pipeline."),
        0.85,
    );
    store.store_atom(&atom.concept, &atom.content, atom.confidence, now).await?;
    store.count().await
}

/// Campaign-orchestration atoms (phase 15): how multi-agent campaigns
/// coordinate handoffs between the core shards.
pub async fn seed_campaign_kb(
    shards_dir: &Path,
    now: DateTime<Utc>,
) -> Result<usize, nerd_knowledge::KnowledgeStoreError> {
    let db_path = shards_dir.join("campaign_knowledge.db");
    let store = KnowledgeStore::open(&db_path).await?;
    let atoms = [
        ("campaign_handoff", "A campaign hands a bead from coder to reviewer to tester in sequence."),
        ("campaign_escalation", "An escalated bead pauses the campaign until a human resolves it."),
    ];
    for (concept, content) in atoms {
        store.store_atom(concept, content, 0.85, now).await?;
    }
    store.count().await
}

/// Project-level atoms derived from the profile and scan summary
/// (phase 13): language, framework, file-topology summary.
pub async fn seed_codebase_kb(
    project_store: &KnowledgeStore,
    profile: &ProjectProfile,
    scan: &ScanSummary,
    now: DateTime<Utc>,
) -> Result<(), nerd_knowledge::KnowledgeStoreError> {
    project_store
        .store_atom("project:language", &format!("Primary language is {}.", profile.language), 0.95, now)
        .await?;
    if let Some(framework) = &profile.framework {
        project_store
            .store_atom("project:framework", &format!("Framework in use: {framework}."), 0.9, now)
            .await?;
    }
    project_store
        .store_atom(
            "project:topology",
            &format!(
                "{} files across {} directories.",
                scan.file_count, scan.directory_count
            ),
            0.95,
            now,
        )
        .await?;
    Ok(())
}
