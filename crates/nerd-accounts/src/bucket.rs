//! Per-account admission quota, independent of health (C3, spec.md §4.3).
//!
//! Grounded on `at-harness/rate_limiter.rs`'s `TokenBucket`/`DashMap`
//! shape: one bucket per key, refilled lazily on access rather than by
//! a background task.

use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Parameters shared by every bucket this tracker manages.
#[derive(Debug, Clone, Copy)]
pub struct TokenBucketConfig {
    pub max_tokens: f64,
    pub regen_rate_per_minute: f64,
    pub initial_tokens: f64,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self {
            max_tokens: 60.0,
            regen_rate_per_minute: 1.0,
            initial_tokens: 60.0,
        }
    }
}

/// Per-account token buckets, keyed by account email. One instance
/// covers every account known to a single [`crate::manager::AccountManager`].
pub struct TokenBucketTracker {
    config: TokenBucketConfig,
    buckets: DashMap<String, Bucket>,
}

impl TokenBucketTracker {
    pub fn new(config: TokenBucketConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    /// Regenerate to now, then consume one token if available. Returns
    /// `false` (no mutation) if the bucket is empty.
    pub fn consume(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.config.initial_tokens,
            last_refill: now,
        });
        self.regen(&mut *entry, now);
        if entry.tokens > 0.0 {
            entry.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Peek at admissibility without consuming — used by the hybrid
    /// selector's peek-then-refund guard.
    pub fn peek(&self, key: &str) -> bool {
        if self.consume(key) {
            self.refund(key);
            true
        } else {
            false
        }
    }

    /// Regenerate to now, then give back one token (capped at `max_tokens`).
    pub fn refund(&self, key: &str) {
        let now = Instant::now();
        let mut entry = self.buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.config.initial_tokens,
            last_refill: now,
        });
        self.regen(&mut *entry, now);
        entry.tokens = (entry.tokens + 1.0).min(self.config.max_tokens);
    }

    fn regen(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed_minutes = now.saturating_duration_since(bucket.last_refill).as_secs_f64() / 60.0;
        let regenerated = (self.config.regen_rate_per_minute * elapsed_minutes).floor();
        if regenerated > 0.0 {
            bucket.tokens = (bucket.tokens + regenerated).clamp(0.0, self.config.max_tokens);
        }
        bucket.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_initialises_to_initial_tokens() {
        let tracker = TokenBucketTracker::new(TokenBucketConfig {
            max_tokens: 5.0,
            regen_rate_per_minute: 1.0,
            initial_tokens: 2.0,
        });
        assert!(tracker.consume("a@example.com"));
        assert!(tracker.consume("a@example.com"));
        assert!(!tracker.consume("a@example.com"));
    }

    #[test]
    fn refund_caps_at_max_tokens() {
        let tracker = TokenBucketTracker::new(TokenBucketConfig {
            max_tokens: 2.0,
            regen_rate_per_minute: 1.0,
            initial_tokens: 2.0,
        });
        tracker.refund("a@example.com");
        tracker.refund("a@example.com");
        assert!(tracker.consume("a@example.com"));
        assert!(tracker.consume("a@example.com"));
        assert!(!tracker.consume("a@example.com"));
    }

    #[test]
    fn peek_does_not_change_observable_admissibility() {
        let tracker = TokenBucketTracker::new(TokenBucketConfig {
            max_tokens: 1.0,
            regen_rate_per_minute: 1.0,
            initial_tokens: 1.0,
        });
        assert!(tracker.peek("a@example.com"));
        assert!(tracker.peek("a@example.com"));
        assert!(tracker.consume("a@example.com"));
    }

    #[test]
    fn distinct_keys_have_independent_buckets() {
        let tracker = TokenBucketTracker::new(TokenBucketConfig {
            max_tokens: 1.0,
            regen_rate_per_minute: 1.0,
            initial_tokens: 1.0,
        });
        assert!(tracker.consume("a@example.com"));
        assert!(!tracker.consume("a@example.com"));
        assert!(tracker.consume("b@example.com"));
    }
}
