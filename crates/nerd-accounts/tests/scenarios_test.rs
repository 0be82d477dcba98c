//! Integration tests covering the account-rotation scenarios.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Duration, Utc};
use nerd_accounts::{manager::AcquireError, AccountManager, AccountStore, Strategy, TokenBucketConfig};
use nerd_core::types::{Account, HealthScoreConfig};

fn temp_path() -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "nerd-accounts-scenario-{}-{}-{}.json",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
        n
    ))
}

/// S1 — rotation across 429s on the gemini-antigravity quota pool.
#[tokio::test]
async fn s1_rotation_across_429s() {
    let store = AccountStore::new(temp_path());
    let now = Utc::now();
    for email in ["a@example.com", "b@example.com", "c@example.com"] {
        store.add(Account::new(email, now), now).await.unwrap();
    }
    let manager = AccountManager::new(store, HealthScoreConfig::default(), TokenBucketConfig::default());

    let first = manager
        .acquire("gemini", "gemini-antigravity-pro", Strategy::Sticky, now)
        .await
        .unwrap();
    assert_eq!(first.email, "a@example.com");

    manager
        .mark_rate_limited("a@example.com", "gemini-antigravity", Duration::seconds(60), now)
        .await;

    let second = manager
        .acquire("gemini", "gemini-antigravity-pro", Strategy::Sticky, now)
        .await
        .unwrap();
    assert_eq!(second.email, "b@example.com");

    manager
        .mark_rate_limited("b@example.com", "gemini-antigravity", Duration::seconds(60), now)
        .await;
    manager
        .mark_rate_limited("c@example.com", "gemini-antigravity", Duration::seconds(60), now)
        .await;

    let err = manager
        .acquire("gemini", "gemini-antigravity-pro", Strategy::Sticky, now)
        .await
        .unwrap_err();
    assert!(matches!(err, AcquireError::Exhausted { .. }));
}

/// S3 — health arithmetic against an explicit initial score.
#[tokio::test]
async fn s3_health_arithmetic() {
    let config = HealthScoreConfig {
        initial: 50,
        ..HealthScoreConfig::default()
    };
    let tracker = nerd_accounts::HealthTracker::new(config);
    let now = Utc::now();

    tracker.record_success("idx0", now);
    assert_eq!(tracker.score("idx0", now), 51);

    tracker.record_failure("idx0", now);
    assert_eq!(tracker.score("idx0", now), 26);

    tracker.record_rate_limit("idx0", now);
    assert_eq!(tracker.score("idx0", now), 11);

    tracker.record_failure("idx0", now);
    assert_eq!(tracker.score("idx0", now), 0);
}

/// S4 — token bucket admission and refund.
#[test]
fn s4_token_bucket() {
    let tracker = nerd_accounts::TokenBucketTracker::new(TokenBucketConfig {
        max_tokens: 5.0,
        regen_rate_per_minute: 60.0,
        initial_tokens: 5.0,
    });
    for _ in 0..5 {
        assert!(tracker.consume("acct"));
    }
    assert!(!tracker.consume("acct"));
    tracker.refund("acct");
    assert!(tracker.consume("acct"));
}

/// S5 — account persistence round-trip across store instances.
#[tokio::test]
async fn s5_persistence_round_trip() {
    let path = temp_path();
    let now = Utc::now();
    {
        let store = AccountStore::new(&path);
        let mut account = Account::new("persistent@example.com", now);
        account.refresh_token = "persist-token".to_string();
        store.add(account, now).await.unwrap();
    }

    let reopened = AccountStore::new(&path);
    reopened.load().await.unwrap();
    let found = reopened.get("persistent@example.com").await.unwrap();
    assert_eq!(found.email, "persistent@example.com");
    assert_eq!(found.refresh_token, "persist-token");

    let _ = tokio::fs::remove_file(&path).await;
}

/// Universal property 6 — quota-key isolation: rate-limiting one quota
/// key leaves others untouched.
#[tokio::test]
async fn quota_key_isolation() {
    let store = AccountStore::new(temp_path());
    let now = Utc::now();
    store.add(Account::new("a@example.com", now), now).await.unwrap();
    let manager = AccountManager::new(store, HealthScoreConfig::default(), TokenBucketConfig::default());

    manager
        .mark_rate_limited("a@example.com", "gemini-antigravity", Duration::seconds(60), now)
        .await;

    let claude_account = manager
        .acquire("claude", "opus", Strategy::Sticky, now)
        .await
        .unwrap();
    assert_eq!(claude_account.email, "a@example.com");
}

/// Universal property 2 — index contiguity after repeated add/delete.
#[tokio::test]
async fn index_contiguity_after_mutations() {
    let store = AccountStore::new(temp_path());
    let now = Utc::now();
    for email in ["a@example.com", "b@example.com", "c@example.com", "d@example.com"] {
        store.add(Account::new(email, now), now).await.unwrap();
    }
    store.delete("b@example.com").await.unwrap();
    store.delete("a@example.com").await.unwrap();

    let list = store.list().await;
    let indices: Vec<usize> = list.iter().map(|a| a.index).collect();
    assert_eq!(indices, (0..list.len()).collect::<Vec<_>>());

    let _ = tokio::fs::remove_file(store.path()).await;
}
