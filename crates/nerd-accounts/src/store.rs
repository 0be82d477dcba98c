//! Durable, single-process-safe storage for the account list (C1).
//!
//! Grounded on `at-core/session_store.rs`'s file-backed pattern: state
//! lives behind a lock, is mirrored to disk as JSON, and is reloaded
//! wholesale on startup. Unlike the session store this is a single
//! document (not one file per record) because the spec's persistence
//! round-trip property (spec.md §8 property 7) is defined over the whole
//! account list.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use nerd_core::types::{Account, AccountFile, ACCOUNT_FILE_VERSION};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AccountStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("email must not be empty")]
    EmptyEmail,
    #[error("account not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, AccountStoreError>;

// ---------------------------------------------------------------------------
// In-memory state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct State {
    accounts: Vec<Account>,
    active_index: i64,
    active_index_by_family: HashMap<String, usize>,
}

// ---------------------------------------------------------------------------
// AccountStore
// ---------------------------------------------------------------------------

/// File-backed account store. All operations serialise through one
/// reader-writer lock; mutators hold the write lock across both the
/// in-memory change and the disk write so observers never see
/// uncommitted state (spec.md §5).
pub struct AccountStore {
    path: PathBuf,
    state: RwLock<State>,
}

impl AccountStore {
    /// Open a store at `path` without reading it; call [`AccountStore::load`]
    /// to populate from disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(State::default()),
        }
    }

    /// Default path: `~/.nerd/antigravity_accounts.json` (spec.md §6.1).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nerd")
            .join("antigravity_accounts.json")
    }

    /// Load the on-disk document. Accepts, in order: the current
    /// versioned form, a bare legacy array, or a missing/empty file
    /// (silently starts empty). A corrupt file warns and starts empty
    /// without touching the file on disk (spec.md §4.1, §7).
    pub async fn load(&self) -> Result<()> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => {
                *self.state.write().await = State::default();
                return Ok(());
            }
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                *self.state.write().await = State::default();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut state = match parse_document(&text) {
            Some(state) => state,
            None => {
                warn!(path = %self.path.display(), "account file is corrupt or unrecognised; starting empty");
                State::default()
            }
        };
        reindex(&mut state.accounts);

        let mut guard = self.state.write().await;
        *guard = state;
        debug!(count = guard.accounts.len(), "accounts loaded");
        Ok(())
    }

    /// Atomically persist the in-memory state: write to a sibling temp
    /// file, set mode 0600, then rename over the target (write-then-rename,
    /// spec.md §4.1). Always writes version 3.
    pub async fn save(&self) -> Result<()> {
        let guard = self.state.read().await;
        self.save_locked(&guard).await
    }

    async fn save_locked(&self, state: &State) -> Result<()> {
        let doc = AccountFile {
            version: ACCOUNT_FILE_VERSION,
            accounts: state.accounts.clone(),
            active_index: state.active_index,
            active_index_by_family: state.active_index_by_family.clone(),
        };
        let json = serde_json::to_string_pretty(&doc)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json.as_bytes()).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&tmp_path, perms).await?;
        }

        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    /// Upsert by email. Assigns `index = len(accounts)` and timestamps on
    /// insert; merges non-empty fields on update. Persists on success; on a
    /// disk-write failure the in-memory state is rolled back
    /// (spec.md §4.1, §7).
    pub async fn add(&self, mut incoming: Account, now: DateTime<Utc>) -> Result<Account> {
        if incoming.email.trim().is_empty() {
            return Err(AccountStoreError::EmptyEmail);
        }

        let mut guard = self.state.write().await;
        let before = guard.clone();

        let stored = if let Some(existing) = guard
            .accounts
            .iter_mut()
            .find(|a| a.email == incoming.email)
        {
            if !incoming.project_id.is_empty() {
                existing.project_id = incoming.project_id.clone();
            }
            if !incoming.refresh_token.is_empty() {
                existing.refresh_token = incoming.refresh_token.clone();
            }
            if !incoming.access_token.is_empty() {
                existing.access_token = incoming.access_token.clone();
            }
            if incoming.access_expiry > existing.access_expiry {
                existing.access_expiry = incoming.access_expiry;
            }
            existing.updated_at = now;
            existing.clone()
        } else {
            incoming.index = guard.accounts.len();
            incoming.created_at = now;
            incoming.updated_at = now;
            guard.accounts.push(incoming.clone());
            incoming
        };

        if let Err(e) = self.save_locked(&guard).await {
            *guard = before;
            return Err(e);
        }
        Ok(stored)
    }

    /// Remove by email, re-index the remainder, and clamp stored active
    /// indices into range (spec.md §4.1).
    pub async fn delete(&self, email: &str) -> Result<()> {
        let mut guard = self.state.write().await;
        let before = guard.clone();

        let pos = guard
            .accounts
            .iter()
            .position(|a| a.email == email)
            .ok_or_else(|| AccountStoreError::NotFound(email.to_string()))?;
        guard.accounts.remove(pos);
        reindex(&mut guard.accounts);

        let len = guard.accounts.len() as i64;
        if guard.active_index >= len {
            guard.active_index = 0;
        }
        let max_idx = guard.accounts.len();
        guard
            .active_index_by_family
            .retain(|_, idx| *idx < max_idx);

        if let Err(e) = self.save_locked(&guard).await {
            *guard = before;
            return Err(e);
        }
        Ok(())
    }

    /// Persist an in-place mutation performed by the caller under the
    /// write lock (used by the account manager when recording outcomes).
    pub async fn with_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut AccountsView) -> T,
    {
        let mut guard = self.state.write().await;
        let mut view = AccountsView {
            accounts: &mut guard.accounts,
            active_index: &mut guard.active_index,
            active_index_by_family: &mut guard.active_index_by_family,
        };
        let result = f(&mut view);
        if let Err(e) = self.save_locked(&guard).await {
            warn!(error = %e, "failed to persist account mutation (soft-durable)");
        }
        Ok(result)
    }

    pub async fn get(&self, email: &str) -> Option<Account> {
        let guard = self.state.read().await;
        guard.accounts.iter().find(|a| a.email == email).cloned()
    }

    /// Stable sort by index.
    pub async fn list(&self) -> Vec<Account> {
        let guard = self.state.read().await;
        let mut accounts = guard.accounts.clone();
        accounts.sort_by_key(|a| a.index);
        accounts
    }

    pub async fn active_index_for(&self, family: &str) -> Option<usize> {
        let guard = self.state.read().await;
        guard.active_index_by_family.get(family).copied()
    }

    pub async fn set_active_index_for(&self, family: &str, index: usize) {
        let mut guard = self.state.write().await;
        guard
            .active_index_by_family
            .insert(family.to_string(), index);
        if let Err(e) = self.save_locked(&guard).await {
            warn!(error = %e, "failed to persist active index (soft-durable)");
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A mutable view into the store's state, handed to [`AccountStore::with_mut`]
/// callbacks so the manager can mutate individual accounts and the
/// active-index maps atomically under the write lock.
pub struct AccountsView<'a> {
    pub accounts: &'a mut Vec<Account>,
    pub active_index: &'a mut i64,
    pub active_index_by_family: &'a mut HashMap<String, usize>,
}

fn reindex(accounts: &mut [Account]) {
    for (i, a) in accounts.iter_mut().enumerate() {
        a.index = i;
    }
}

/// Parse either the current versioned envelope or a legacy bare array /
/// version-less object, returning `None` if neither shape matches.
fn parse_document(text: &str) -> Option<State> {
    let value: Value = serde_json::from_str(text).ok()?;

    if value.is_array() {
        let accounts: Vec<Account> = serde_json::from_value(value).ok()?;
        return Some(State {
            accounts,
            active_index: 0,
            active_index_by_family: HashMap::new(),
        });
    }

    if let Some(obj) = value.as_object() {
        if obj.contains_key("accounts") {
            let file: AccountFile = serde_json::from_value(value).ok()?;
            return Some(State {
                accounts: file.accounts,
                active_index: file.active_index,
                active_index_by_family: file.active_index_by_family,
            });
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "nerd-accounts-test-{}-{}-{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
            n
        ))
    }

    #[tokio::test]
    async fn add_assigns_contiguous_indices() {
        let store = AccountStore::new(temp_path());
        let now = Utc::now();
        store.add(Account::new("a@example.com", now), now).await.unwrap();
        store.add(Account::new("b@example.com", now), now).await.unwrap();
        store.add(Account::new("c@example.com", now), now).await.unwrap();

        let list = store.list().await;
        let indices: Vec<usize> = list.iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        let _ = tokio::fs::remove_file(store.path()).await;
    }

    #[tokio::test]
    async fn delete_reindexes_and_clamps_active() {
        let store = AccountStore::new(temp_path());
        let now = Utc::now();
        store.add(Account::new("a@example.com", now), now).await.unwrap();
        store.add(Account::new("b@example.com", now), now).await.unwrap();
        store.add(Account::new("c@example.com", now), now).await.unwrap();
        store.set_active_index_for("gemini", 2).await;

        store.delete("a@example.com").await.unwrap();

        let list = store.list().await;
        assert_eq!(list.len(), 2);
        let indices: Vec<usize> = list.iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![0, 1]);
        // active index for "gemini" pointed at a now out-of-range slot and
        // should have been dropped.
        assert_eq!(store.active_index_for("gemini").await, None);
        let _ = tokio::fs::remove_file(store.path()).await;
    }

    #[tokio::test]
    async fn delete_unknown_email_errors() {
        let store = AccountStore::new(temp_path());
        let err = store.delete("ghost@example.com").await.unwrap_err();
        assert!(matches!(err, AccountStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn save_then_reload_round_trips() {
        let path = temp_path();
        let now = Utc::now();
        {
            let store = AccountStore::new(&path);
            let mut acct = Account::new("persistent@example.com", now);
            acct.refresh_token = "persist-token".into();
            store.add(acct, now).await.unwrap();
        }

        let reopened = AccountStore::new(&path);
        reopened.load().await.unwrap();
        let found = reopened.get("persistent@example.com").await.unwrap();
        assert_eq!(found.email, "persistent@example.com");
        assert_eq!(found.refresh_token, "persist-token");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn legacy_bare_array_is_upgraded() {
        let path = temp_path();
        let now = Utc::now();
        let legacy_account = Account::new("legacy@example.com", now);
        let array = serde_json::to_string(&vec![legacy_account]).unwrap();
        tokio::fs::write(&path, array).await.unwrap();

        let store = AccountStore::new(&path);
        store.load().await.unwrap();
        let list = store.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].email, "legacy@example.com");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn missing_file_loads_empty_without_error() {
        let store = AccountStore::new(temp_path());
        store.load().await.unwrap();
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_warns_and_starts_empty() {
        let path = temp_path();
        tokio::fs::write(&path, "{ this is not json").await.unwrap();
        let store = AccountStore::new(&path);
        store.load().await.unwrap();
        assert!(store.list().await.is_empty());
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn account_uniqueness_holds_across_repeated_inserts() {
        let store = AccountStore::new(temp_path());
        let now = Utc::now();
        store.add(Account::new("dup@example.com", now), now).await.unwrap();
        store.add(Account::new("dup@example.com", now), now).await.unwrap();
        let list = store.list().await;
        assert_eq!(list.len(), 1);
        let _ = tokio::fs::remove_file(store.path()).await;
    }
}
