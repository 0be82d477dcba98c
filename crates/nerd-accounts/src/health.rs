//! Time-based linear recovery health scoring (C2, spec.md §4.2).
//!
//! Grounded on `at-harness/circuit_breaker.rs`'s state-machine shape
//! (config struct + `Arc<Mutex<InnerState>>` per key) but the scoring
//! itself is arithmetic rather than open/closed/half-open transitions:
//! every outcome nudges a bounded integer score, and idle time recovers
//! it linearly.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use nerd_core::types::HealthScoreConfig;

#[derive(Debug, Clone, Copy)]
struct ScoreState {
    score: i32,
    last_update: DateTime<Utc>,
}

/// Per-account health score, recovered linearly over idle time and
/// nudged by outcome events. One [`HealthTracker`] covers every account
/// known to a single [`crate::manager::AccountManager`].
pub struct HealthTracker {
    config: HealthScoreConfig,
    scores: Mutex<HashMap<String, ScoreState>>,
}

impl HealthTracker {
    pub fn new(config: HealthScoreConfig) -> Self {
        Self {
            config,
            scores: Mutex::new(HashMap::new()),
        }
    }

    /// Current score for `email`, applying recovery for elapsed idle time
    /// as of `now`. Initialises unseen accounts at `config.initial`.
    pub fn score(&self, email: &str, now: DateTime<Utc>) -> i32 {
        let mut guard = self.scores.lock().expect("health tracker mutex poisoned");
        let state = guard.entry(email.to_string()).or_insert(ScoreState {
            score: self.config.initial,
            last_update: now,
        });
        self.recover(state, now);
        state.score
    }

    /// Reward a successful call.
    pub fn record_success(&self, email: &str, now: DateTime<Utc>) {
        self.apply(email, now, self.config.success_reward);
    }

    /// Penalise a rate-limit response.
    pub fn record_rate_limit(&self, email: &str, now: DateTime<Utc>) {
        self.apply(email, now, -self.config.rate_limit_penalty);
    }

    /// Penalise a hard failure.
    pub fn record_failure(&self, email: &str, now: DateTime<Utc>) {
        self.apply(email, now, -self.config.failure_penalty);
    }

    /// Whether `email`'s current score clears the usability floor.
    pub fn is_usable(&self, email: &str, now: DateTime<Utc>) -> bool {
        self.score(email, now) >= self.config.min_usable
    }

    fn apply(&self, email: &str, now: DateTime<Utc>, delta: i32) {
        let mut guard = self.scores.lock().expect("health tracker mutex poisoned");
        let state = guard.entry(email.to_string()).or_insert(ScoreState {
            score: self.config.initial,
            last_update: now,
        });
        self.recover(state, now);
        state.score = self.config.clamp(state.score + delta);
        state.last_update = now;
    }

    /// Apply `recovery_rate_per_hour * elapsed_hours` (truncated toward
    /// zero) to `state`, never exceeding `max_score`, and advance
    /// `last_update` to `now` regardless of whether time had elapsed.
    fn recover(&self, state: &mut ScoreState, now: DateTime<Utc>) {
        if now <= state.last_update {
            return;
        }
        let elapsed_hours =
            (now - state.last_update).num_milliseconds() as f64 / 3_600_000.0;
        let recovered = (self.config.recovery_rate_per_hour as f64 * elapsed_hours) as i32;
        if recovered > 0 {
            state.score = self.config.clamp(state.score + recovered);
        }
        state.last_update = now;
    }
}
