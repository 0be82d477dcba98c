//! Coordinates C1/C2/C3, exposes `Acquire` and outcome callbacks, and
//! enforces the sticky/hybrid rotation strategies (C4, spec.md §4.5).
//!
//! Grounded on `at-daemon/orchestrator.rs`'s pattern of one struct
//! owning several collaborators behind `Arc`s and driving them through a
//! fixed protocol; the lock discipline follows spec.md §5's note that
//! `AccountStore` already serialises every mutation.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use nerd_core::types::{Account, HealthScoreConfig};
use tracing::warn;

use crate::bucket::{TokenBucketConfig, TokenBucketTracker};
use crate::health::HealthTracker;
use crate::quota::quota_key;
use crate::selector::{select, AccountSnapshot, SelectionOutcome};
use crate::store::AccountStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Sticky,
    Hybrid,
}

#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("no accounts configured")]
    NoAccountsConfigured,
    #[error("all accounts exhausted for family {family}")]
    Exhausted { family: String },
}

/// Coordinates the account store, health tracker, and token buckets
/// behind a single facade. One `AccountManager` serves the whole
/// process; cloneable collaborators (the store's internal lock, the
/// trackers) make concurrent `Acquire`/`MarkX` calls safe.
pub struct AccountManager {
    store: AccountStore,
    health: HealthTracker,
    buckets: TokenBucketTracker,
}

impl AccountManager {
    pub fn new(store: AccountStore, health_config: HealthScoreConfig, bucket_config: TokenBucketConfig) -> Self {
        Self {
            store,
            health: HealthTracker::new(health_config),
            buckets: TokenBucketTracker::new(bucket_config),
        }
    }

    pub async fn load(&self) -> crate::store::Result<()> {
        self.store.load().await
    }

    pub fn store(&self) -> &AccountStore {
        &self.store
    }

    /// Acquire the best account to serve a request for `family`/`model`
    /// under `strategy`.
    pub async fn acquire(
        &self,
        family: &str,
        model: &str,
        strategy: Strategy,
        now: DateTime<Utc>,
    ) -> Result<Account, AcquireError> {
        let accounts = self.store.list().await;
        if accounts.is_empty() {
            return Err(AcquireError::NoAccountsConfigured);
        }
        let key = quota_key(family, model);

        match strategy {
            Strategy::Hybrid => self.acquire_hybrid(&accounts, family, &key, now).await,
            Strategy::Sticky => self.acquire_sticky(&accounts, family, &key, now).await,
        }
    }

    async fn acquire_hybrid(
        &self,
        accounts: &[Account],
        family: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Account, AcquireError> {
        let snapshots: Vec<AccountSnapshot> = accounts
            .iter()
            .map(|a| self.snapshot(a, key, now))
            .collect();

        match select(&snapshots, now) {
            SelectionOutcome::NoAccountsConfigured => Err(AcquireError::NoAccountsConfigured),
            SelectionOutcome::ExhaustedFallback(idx) => {
                let account = &accounts[idx];
                warn!(email = %account.email, family, "account selector exhausted; falling back");
                self.adopt(account, family, now).await;
                Ok(account.clone())
            }
            SelectionOutcome::Selected(idx) => {
                // Peek-then-refund guard: skip accounts that the token
                // bucket would admission-block, trying the remaining
                // eligible candidates in priority order.
                let mut ranked = snapshots
                    .iter()
                    .filter(|s| !s.is_rate_limited && !s.is_cooling_down)
                    .cloned()
                    .collect::<Vec<_>>();
                ranked.sort_by(|a, b| {
                    priority_key(b, now)
                        .partial_cmp(&priority_key(a, now))
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.index.cmp(&b.index))
                });
                debug_assert_eq!(ranked.first().map(|s| s.index), Some(idx));

                for candidate in &ranked {
                    let account = &accounts[candidate.index];
                    if self.buckets.peek(&account.email) {
                        self.adopt(account, family, now).await;
                        return Ok(account.clone());
                    }
                }
                Err(AcquireError::Exhausted {
                    family: family.to_string(),
                })
            }
        }
    }

    async fn acquire_sticky(
        &self,
        accounts: &[Account],
        family: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Account, AcquireError> {
        let n = accounts.len();
        let current = self
            .store
            .active_index_for(family)
            .await
            .unwrap_or(0)
            .min(n - 1);

        if self.is_serviceable(&accounts[current], key, now) {
            // Lazily persisted: save happens on the next outcome report.
            return Ok(accounts[current].clone());
        }

        for offset in 1..=n {
            let idx = (current + offset) % n;
            if self.is_serviceable(&accounts[idx], key, now) {
                let account = &accounts[idx];
                self.adopt(account, family, now).await;
                return Ok(account.clone());
            }
        }

        Err(AcquireError::Exhausted {
            family: family.to_string(),
        })
    }

    fn is_serviceable(&self, account: &Account, key: &str, now: DateTime<Utc>) -> bool {
        !account.is_rate_limited(key, now) && !account.is_cooling_down(now)
    }

    fn snapshot(&self, account: &Account, key: &str, now: DateTime<Utc>) -> AccountSnapshot {
        AccountSnapshot {
            index: account.index,
            health_score: self.health.score(&account.email, now),
            is_rate_limited: account.is_rate_limited(key, now),
            is_cooling_down: account.is_cooling_down(now),
            last_used: account.last_used,
            consecutive_failures: account.consecutive_failures,
        }
    }

    async fn adopt(&self, account: &Account, family: &str, now: DateTime<Utc>) {
        self.store.set_active_index_for(family, account.index).await;
        let email = account.email.clone();
        let _ = self
            .store
            .with_mut(|view| {
                if let Some(a) = view.accounts.iter_mut().find(|a| a.email == email) {
                    a.last_used = now;
                }
            })
            .await;
    }

    /// Reset failure streak, reward health, persist.
    pub async fn mark_success(&self, email: &str, now: DateTime<Utc>) {
        self.health.record_success(email, now);
        let email_owned = email.to_string();
        let _ = self
            .store
            .with_mut(|view| {
                if let Some(a) = view.accounts.iter_mut().find(|a| a.email == email_owned) {
                    a.consecutive_failures = 0;
                    a.last_used = now;
                }
            })
            .await;
    }

    /// Record a 429: set the quota's reset time, bump the failure
    /// streak, penalise health, persist.
    pub async fn mark_rate_limited(
        &self,
        email: &str,
        quota_key: &str,
        retry_after: ChronoDuration,
        now: DateTime<Utc>,
    ) {
        self.health.record_rate_limit(email, now);
        let email_owned = email.to_string();
        let quota_key_owned = quota_key.to_string();
        let _ = self
            .store
            .with_mut(|view| {
                if let Some(a) = view.accounts.iter_mut().find(|a| a.email == email_owned) {
                    a.rate_limit_reset_times
                        .insert(quota_key_owned, now + retry_after);
                    a.consecutive_failures += 1;
                }
            })
            .await;
    }

    /// Record a hard failure, penalise health, store the error, persist.
    pub async fn mark_failure(&self, email: &str, err_msg: &str, now: DateTime<Utc>) {
        self.health.record_failure(email, now);
        let email_owned = email.to_string();
        let err_owned = err_msg.to_string();
        let _ = self
            .store
            .with_mut(|view| {
                if let Some(a) = view.accounts.iter_mut().find(|a| a.email == email_owned) {
                    a.consecutive_failures += 1;
                    a.last_error = err_owned;
                }
            })
            .await;
    }

    /// Force a cooldown window on `email`, independent of health/quota
    /// state.
    pub async fn cooldown(&self, email: &str, until: DateTime<Utc>, reason: &str) {
        let email_owned = email.to_string();
        let reason_owned = reason.to_string();
        let _ = self
            .store
            .with_mut(|view| {
                if let Some(a) = view.accounts.iter_mut().find(|a| a.email == email_owned) {
                    a.cooling_down_until = until;
                    a.cooldown_reason = reason_owned;
                }
            })
            .await;
    }
}

fn priority_key(snapshot: &AccountSnapshot, now: DateTime<Utc>) -> f64 {
    let seconds_since_last_used = (now - snapshot.last_used).num_seconds().max(0) as f64;
    let lru_term = seconds_since_last_used.min(3600.0) * 0.01;
    3.0 * snapshot.health_score as f64 + lru_term - 5.0 * snapshot.consecutive_failures as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> std::path::PathBuf {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "nerd-accounts-manager-test-{}-{}-{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
            n
        ))
    }

    async fn manager_with(n: usize) -> (AccountManager, DateTime<Utc>) {
        let store = AccountStore::new(temp_path());
        let now = Utc::now();
        for i in 0..n {
            store
                .add(Account::new(format!("acct{i}@example.com"), now), now)
                .await
                .unwrap();
        }
        let manager = AccountManager::new(store, HealthScoreConfig::default(), TokenBucketConfig::default());
        (manager, now)
    }

    #[tokio::test]
    async fn acquire_fails_with_no_accounts_configured() {
        let store = AccountStore::new(temp_path());
        let manager = AccountManager::new(store, HealthScoreConfig::default(), TokenBucketConfig::default());
        let err = manager
            .acquire("claude", "opus", Strategy::Sticky, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::NoAccountsConfigured));
    }

    #[tokio::test]
    async fn sticky_strategy_rotates_past_rate_limited_current() {
        let (manager, now) = manager_with(2).await;
        manager
            .mark_rate_limited("acct0@example.com", "claude", ChronoDuration::seconds(3600), now)
            .await;

        let acquired = manager
            .acquire("claude", "opus", Strategy::Sticky, now)
            .await
            .unwrap();
        assert_eq!(acquired.email, "acct1@example.com");
    }

    #[tokio::test]
    async fn sticky_strategy_stays_on_current_when_serviceable() {
        let (manager, now) = manager_with(2).await;
        let first = manager
            .acquire("claude", "opus", Strategy::Sticky, now)
            .await
            .unwrap();
        assert_eq!(first.email, "acct0@example.com");
        let second = manager
            .acquire("claude", "opus", Strategy::Sticky, now)
            .await
            .unwrap();
        assert_eq!(second.email, "acct0@example.com");
    }

    #[tokio::test]
    async fn sticky_strategy_exhausted_when_all_rate_limited() {
        let (manager, now) = manager_with(2).await;
        manager
            .mark_rate_limited("acct0@example.com", "claude", ChronoDuration::seconds(3600), now)
            .await;
        manager
            .mark_rate_limited("acct1@example.com", "claude", ChronoDuration::seconds(3600), now)
            .await;

        let err = manager
            .acquire("claude", "opus", Strategy::Sticky, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::Exhausted { .. }));
    }

    #[tokio::test]
    async fn hybrid_strategy_prefers_healthiest_account() {
        let (manager, now) = manager_with(2).await;
        manager.mark_failure("acct0@example.com", "boom", now).await;
        manager.mark_failure("acct0@example.com", "boom", now).await;

        let acquired = manager
            .acquire("claude", "opus", Strategy::Hybrid, now)
            .await
            .unwrap();
        assert_eq!(acquired.email, "acct1@example.com");
    }

    #[tokio::test]
    async fn mark_success_resets_consecutive_failures() {
        let (manager, now) = manager_with(1).await;
        manager.mark_failure("acct0@example.com", "boom", now).await;
        manager.mark_success("acct0@example.com", now).await;
        let account = manager.store().get("acct0@example.com").await.unwrap();
        assert_eq!(account.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn cooldown_removes_account_from_sticky_rotation() {
        let (manager, now) = manager_with(2).await;
        manager
            .cooldown("acct0@example.com", now + ChronoDuration::hours(1), "manual")
            .await;

        let acquired = manager
            .acquire("claude", "opus", Strategy::Sticky, now)
            .await
            .unwrap();
        assert_eq!(acquired.email, "acct1@example.com");
    }
}
