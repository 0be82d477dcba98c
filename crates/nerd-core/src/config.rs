use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration loaded from `~/.nerd/config.toml`.
///
/// Every section implements `Default`, and the whole struct derives
/// `#[serde(default)]` per field so a config file that only overrides one
/// setting still parses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub init: InitConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            accounts: AccountsConfig::default(),
            health: HealthConfig::default(),
            init: InitConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Config {
    /// Load config from `~/.nerd/config.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Write this config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: impl Into<PathBuf>) -> Result<(), ConfigError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
        let text = self.to_toml()?;
        std::fs::write(&path, text).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nerd")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub workspace_root: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            workspace_root: None,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

/// Rotation-strategy knobs for the account manager (C4/C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// `"sticky"` or `"hybrid"`; see spec.md §4.5.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_accounts_path")]
    pub store_path: String,
    #[serde(default = "default_max_tokens")]
    pub bucket_max_tokens: u32,
    #[serde(default = "default_regen_rate")]
    pub bucket_regen_per_minute: f64,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            store_path: default_accounts_path(),
            bucket_max_tokens: default_max_tokens(),
            bucket_regen_per_minute: default_regen_rate(),
        }
    }
}

fn default_strategy() -> String {
    "sticky".into()
}
fn default_accounts_path() -> String {
    "~/.nerd/antigravity_accounts.json".into()
}
fn default_max_tokens() -> u32 {
    60
}
fn default_regen_rate() -> f64 {
    1.0
}

/// Mirrors spec.md §3.2 `HealthScoreConfig`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_initial")]
    pub initial: i32,
    #[serde(default = "default_success_reward")]
    pub success_reward: i32,
    #[serde(default = "default_rate_limit_penalty")]
    pub rate_limit_penalty: i32,
    #[serde(default = "default_failure_penalty")]
    pub failure_penalty: i32,
    #[serde(default = "default_recovery_rate")]
    pub recovery_rate_per_hour: i32,
    #[serde(default = "default_min_usable")]
    pub min_usable: i32,
    #[serde(default = "default_max_score")]
    pub max_score: i32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            initial: default_initial(),
            success_reward: default_success_reward(),
            rate_limit_penalty: default_rate_limit_penalty(),
            failure_penalty: default_failure_penalty(),
            recovery_rate_per_hour: default_recovery_rate(),
            min_usable: default_min_usable(),
            max_score: default_max_score(),
        }
    }
}

fn default_initial() -> i32 {
    70
}
fn default_success_reward() -> i32 {
    1
}
fn default_rate_limit_penalty() -> i32 {
    15
}
fn default_failure_penalty() -> i32 {
    25
}
fn default_recovery_rate() -> i32 {
    5
}
fn default_min_usable() -> i32 {
    30
}
fn default_max_score() -> i32 {
    100
}

/// Knobs for the workspace-initialisation pipeline (C10/C11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    #[serde(default = "default_kb_workers")]
    pub max_concurrent_kb_builds: usize,
    #[serde(default = "default_skip_list")]
    pub skip_dirs: Vec<String>,
    #[serde(default = "default_scan_depth")]
    pub max_scan_depth: usize,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            max_concurrent_kb_builds: default_kb_workers(),
            skip_dirs: default_skip_list(),
            max_scan_depth: default_scan_depth(),
        }
    }
}

fn default_kb_workers() -> usize {
    3
}
fn default_skip_list() -> Vec<String> {
    vec![
        "node_modules".into(),
        ".git".into(),
        "target".into(),
        "dist".into(),
        "build".into(),
        ".nerd".into(),
        "vendor".into(),
        "__pycache__".into(),
        ".venv".into(),
    ]
}
fn default_scan_depth() -> usize {
    24
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub allowed_paths: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_paths: Vec::new(),
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
    fn default_roundtrips_through_toml() {
        let cfg = Config::default();
        let text = cfg.to_toml().expect("serialize");
        let parsed: Config = toml::from_str(&text).expect("parse");
        assert_eq!(parsed.accounts.strategy, cfg.accounts.strategy);
        assert_eq!(parsed.health.initial, cfg.health.initial);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let text = "[health]\nmin_usable = 50\n";
        let parsed: Config = toml::from_str(text).expect("parse partial");
        assert_eq!(parsed.health.min_usable, 50);
        assert_eq!(parsed.health.initial, default_initial());
        assert_eq!(parsed.accounts.strategy, "sticky");
    }
}
