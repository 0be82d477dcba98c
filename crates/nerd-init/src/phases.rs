//! The fixed 22-phase pipeline ordering (C10, spec.md §4.10).

/// One named unit of the init pipeline, in canonical execution order.
/// Parallelism lives inside a phase (phase 12); phases themselves
/// always execute in this numerical order (spec.md §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Setup,
    Migration,
    Directory,
    Scanning,
    Analysis,
    Profile,
    Facts,
    PromptAtoms,
    PromptDb,
    Agents,
    SharedKb,
    KbCreation,
    CodebaseKb,
    CoreShardsKb,
    CampaignKb,
    ToolGeneration,
    Preferences,
    Session,
    Tools,
    Registry,
    PromptSync,
    Complete,
}

impl Phase {
    pub const ALL: [Phase; 22] = [
        Phase::Setup,
        Phase::Migration,
        Phase::Directory,
        Phase::Scanning,
        Phase::Analysis,
        Phase::Profile,
        Phase::Facts,
        Phase::PromptAtoms,
        Phase::PromptDb,
        Phase::Agents,
        Phase::SharedKb,
        Phase::KbCreation,
        Phase::CodebaseKb,
        Phase::CoreShardsKb,
        Phase::CampaignKb,
        Phase::ToolGeneration,
        Phase::Preferences,
        Phase::Session,
        Phase::Tools,
        Phase::Registry,
        Phase::PromptSync,
        Phase::Complete,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Migration => "migration",
            Phase::Directory => "directory",
            Phase::Scanning => "scanning",
            Phase::Analysis => "analysis",
            Phase::Profile => "profile",
            Phase::Facts => "facts",
            Phase::PromptAtoms => "prompt_atoms",
            Phase::PromptDb => "prompt_db",
            Phase::Agents => "agents",
            Phase::SharedKb => "shared_kb",
            Phase::KbCreation => "kb_creation",
            Phase::CodebaseKb => "codebase_kb",
            Phase::CoreShardsKb => "core_shards_kb",
            Phase::CampaignKb => "campaign_kb",
            Phase::ToolGeneration => "tool_generation",
            Phase::Preferences => "preferences",
            Phase::Session => "session",
            Phase::Tools => "tools",
            Phase::Registry => "registry",
            Phase::PromptSync => "prompt_sync",
            Phase::Complete => "complete",
        }
    }

    /// Default duration used to seed the ETA tracker, tuned to roughly
    /// observed averages — kb_creation dominates since it's the only
    /// phase that may call out to a research `Completer` per agent.
    pub fn default_duration_secs(self) -> f64 {
        match self {
            Phase::Setup => 0.5,
            Phase::Migration => 1.0,
            Phase::Directory => 0.5,
            Phase::Scanning => 3.0,
            Phase::Analysis => 0.5,
            Phase::Profile => 1.5,
            Phase::Facts => 1.0,
            Phase::PromptAtoms => 1.0,
            Phase::PromptDb => 0.5,
            Phase::Agents => 0.5,
            Phase::SharedKb => 1.0,
            Phase::KbCreation => 6.0,
            Phase::CodebaseKb => 1.5,
            Phase::CoreShardsKb => 2.0,
            Phase::CampaignKb => 1.0,
            Phase::ToolGeneration => 1.0,
            Phase::Preferences => 0.3,
            Phase::Session => 0.3,
            Phase::Tools => 0.5,
            Phase::Registry => 0.3,
            Phase::PromptSync => 1.0,
            Phase::Complete => 0.0,
        }
    }

    pub fn number(self) -> u32 {
        Phase::ALL.iter().position(|p| *p == self).unwrap_or(0) as u32 + 1
    }
}

pub const TOTAL_PHASES: u32 = Phase::ALL.len() as u32;
