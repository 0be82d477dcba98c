//! Shared data types for the account rotation core and the workspace
//! initialisation pipeline.
//!
//! These are plain serde-able records; the crates that own behaviour
//! (`nerd-accounts`, `nerd-scan`, `nerd-knowledge`, `nerd-init`) build their
//! logic on top of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Account (spec.md §3.1)
// ---------------------------------------------------------------------------

/// A single upstream provider credential with its own refresh token and
/// rate-limit state.
///
/// `index` is a stable ordinal re-assigned on deletion so that
/// `{a.index : a in store} == 0..len` always holds (spec.md §8 property 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub index: usize,
    pub email: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "accessExpiry")]
    pub access_expiry: DateTime<Utc>,
    #[serde(rename = "projectId")]
    pub project_id: String,
    #[serde(rename = "managedProjectId")]
    pub managed_project_id: String,
    #[serde(rename = "addedAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "lastUsed")]
    pub last_used: DateTime<Utc>,
    #[serde(rename = "rateLimitResetTimes", default)]
    pub rate_limit_reset_times: HashMap<String, DateTime<Utc>>,
    #[serde(rename = "coolingDownUntil")]
    pub cooling_down_until: DateTime<Utc>,
    #[serde(rename = "cooldownReason", default)]
    pub cooldown_reason: String,
    #[serde(rename = "consecutiveFailures", default)]
    pub consecutive_failures: u32,
    #[serde(rename = "lastError", default)]
    pub last_error: String,
}

impl Account {
    /// Build a fresh account record, timestamped `now`.
    pub fn new(email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            index: 0,
            email: email.into(),
            refresh_token: String::new(),
            access_token: String::new(),
            access_expiry: now,
            project_id: String::new(),
            managed_project_id: String::new(),
            created_at: now,
            updated_at: now,
            last_used: now,
            rate_limit_reset_times: HashMap::new(),
            cooling_down_until: DateTime::<Utc>::from_timestamp(0, 0).unwrap_or(now),
            cooldown_reason: String::new(),
            consecutive_failures: 0,
            last_error: String::new(),
        }
    }

    /// `access_token` is considered expired if `now + 60s >= access_expiry`.
    pub fn access_token_expired(&self, now: DateTime<Utc>) -> bool {
        now + chrono::Duration::seconds(60) >= self.access_expiry
    }

    /// Whether this account is presently serving a cooldown.
    pub fn is_cooling_down(&self, now: DateTime<Utc>) -> bool {
        now < self.cooling_down_until
    }

    /// `true` iff a non-expired rate-limit entry exists for `quota_key`.
    /// Stale entries are the caller's responsibility to prune (spec.md §4.5).
    pub fn is_rate_limited(&self, quota_key: &str, now: DateTime<Utc>) -> bool {
        self.rate_limit_reset_times
            .get(quota_key)
            .map(|reset| now <= *reset)
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// HealthScoreConfig (spec.md §3.2)
// ---------------------------------------------------------------------------

/// Immutable tuning parameters for [`HealthTracker`](../../nerd_accounts/health/struct.HealthTracker.html)-style scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthScoreConfig {
    pub initial: i32,
    pub success_reward: i32,
    pub rate_limit_penalty: i32,
    pub failure_penalty: i32,
    pub recovery_rate_per_hour: i32,
    pub min_usable: i32,
    pub max_score: i32,
}

impl Default for HealthScoreConfig {
    fn default() -> Self {
        Self {
            initial: 70,
            success_reward: 1,
            rate_limit_penalty: 15,
            failure_penalty: 25,
            recovery_rate_per_hour: 5,
            min_usable: 30,
            max_score: 100,
        }
    }
}

impl HealthScoreConfig {
    /// Saturating clamp into `[0, max_score]`.
    pub fn clamp(&self, score: i32) -> i32 {
        score.clamp(0, self.max_score)
    }
}

// ---------------------------------------------------------------------------
// Account file envelope (spec.md §3.3 / §6.1)
// ---------------------------------------------------------------------------

pub const ACCOUNT_FILE_VERSION: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountFile {
    pub version: u32,
    pub accounts: Vec<Account>,
    #[serde(rename = "activeIndex")]
    pub active_index: i64,
    #[serde(rename = "activeIndexByFamily", default)]
    pub active_index_by_family: HashMap<String, usize>,
}

impl AccountFile {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            version: ACCOUNT_FILE_VERSION,
            accounts,
            active_index: 0,
            active_index_by_family: HashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectProfile (spec.md §3.4)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Direct,
    Dev,
    Transitive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
    pub major_version: Option<String>,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Application,
    Library,
    Hybrid,
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSystemInfo {
    pub name: String,
    pub config_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectProfile {
    pub project_id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub language: String,
    pub framework: Option<String>,
    pub build_system: Option<String>,
    pub architecture: Option<String>,
    pub patterns: Vec<String>,

    pub dependencies: Vec<Dependency>,
    pub entry_points: Vec<String>,
    pub test_directories: Vec<String>,
    pub config_files: Vec<String>,

    pub file_count: usize,
    pub directory_count: usize,
    pub build_system_info: Option<BuildSystemInfo>,
    pub project_type: ProjectType,
}

impl ProjectProfile {
    /// Deterministic id derived from the workspace path and a creation
    /// instant supplied by the caller (spec.md §3.4 invariant).
    pub fn derive_project_id(workspace_root: &str, created_at: DateTime<Utc>) -> String {
        let digest = ring::digest::digest(
            &ring::digest::SHA256,
            format!("{workspace_root}::{}", created_at.timestamp_millis()).as_bytes(),
        );
        hex_prefix(digest.as_ref(), 16)
    }
}

// ---------------------------------------------------------------------------
// KnowledgeAtom (spec.md §3.5)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeAtom {
    pub concept: String,
    pub content: String,
    pub confidence: f64,
    pub content_hash: String,
}

impl KnowledgeAtom {
    pub fn new(concept: impl Into<String>, content: impl Into<String>, confidence: f64) -> Self {
        let concept = concept.into();
        let content = content.into();
        let content_hash = compute_content_hash(&concept, &content);
        Self {
            concept,
            content,
            confidence: confidence.clamp(0.0, 1.0),
            content_hash,
        }
    }
}

/// `sha256(concept || "::" || content)`, first 16 hex chars.
pub fn compute_content_hash(concept: &str, content: &str) -> String {
    let payload = format!("{concept}::{content}");
    let digest = ring::digest::digest(&ring::digest::SHA256, payload.as_bytes());
    hex_prefix(digest.as_ref(), 16)
}

fn hex_prefix(bytes: &[u8], hex_chars: usize) -> String {
    let mut s = String::with_capacity(hex_chars);
    for byte in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{byte:02x}");
        if s.len() >= hex_chars {
            break;
        }
    }
    s.truncate(hex_chars);
    s
}

// ---------------------------------------------------------------------------
// Agent registry (spec.md §3.6)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Ready,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedAgent {
    pub name: String,
    pub knowledge_path: String,
    pub kb_size: usize,
    pub tools: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub status: AgentStatus,
    pub quality_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistry {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub agents: Vec<CreatedAgent>,
}

impl AgentRegistry {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            version: 1,
            created_at,
            agents: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_deterministic_and_16_hex_chars() {
        let a = compute_content_hash("concept", "content");
        let b = compute_content_hash("concept", "content");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn content_hash_differs_on_either_field() {
        let base = compute_content_hash("concept", "content");
        assert_ne!(base, compute_content_hash("concept2", "content"));
        assert_ne!(base, compute_content_hash("concept", "content2"));
    }

    #[test]
    fn access_token_expiry_honours_60s_skew() {
        let now = Utc::now();
        let mut acct = Account::new("a@example.com", now);
        acct.access_expiry = now + chrono::Duration::seconds(30);
        assert!(acct.access_token_expired(now));

        acct.access_expiry = now + chrono::Duration::seconds(120);
        assert!(!acct.access_token_expired(now));
    }

    #[test]
    fn rate_limit_expires_after_reset() {
        let now = Utc::now();
        let mut acct = Account::new("a@example.com", now);
        acct.rate_limit_reset_times
            .insert("claude".into(), now + chrono::Duration::seconds(30));
        assert!(acct.is_rate_limited("claude", now));
        assert!(!acct.is_rate_limited("claude", now + chrono::Duration::seconds(60)));
        assert!(!acct.is_rate_limited("gemini-cli", now));
    }
}
