//! Pure scoring function over an account snapshot (C5, spec.md §4.4).
//!
//! Grounded on `at-daemon/scheduler.rs`'s `next_bead()`: both are pure
//! functions that sort candidates by a computed priority and pick the
//! max, with an explicit tie-break rule rather than relying on
//! whatever order the input arrived in.

use chrono::{DateTime, Utc};

/// A read-only snapshot of one account's selection-relevant state, built
/// by the caller from C1 (account fields) + C2 (health score).
#[derive(Debug, Clone, Copy)]
pub struct AccountSnapshot {
    pub index: usize,
    pub health_score: i32,
    pub is_rate_limited: bool,
    pub is_cooling_down: bool,
    pub last_used: DateTime<Utc>,
    pub consecutive_failures: u32,
}

/// Outcome of a selection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionOutcome {
    /// A healthy candidate was chosen outright.
    Selected(usize),
    /// Every candidate was excluded; the best excluded one was returned
    /// anyway as a last resort.
    ExhaustedFallback(usize),
    /// No candidates were supplied at all.
    NoAccountsConfigured,
}

/// `priority = 3.0 * health + 0.01 * min(seconds_since_last_used, 3600)
/// - 5.0 * consecutive_failures`.
fn priority(snapshot: &AccountSnapshot, now: DateTime<Utc>) -> f64 {
    let seconds_since_last_used = (now - snapshot.last_used).num_seconds().max(0) as f64;
    let lru_term = seconds_since_last_used.min(3600.0) * 0.01;
    3.0 * snapshot.health_score as f64 + lru_term - 5.0 * snapshot.consecutive_failures as f64
}

/// Aggregate counts over a snapshot, independent of which one would be
/// selected — used for dashboards/diagnostics (spec.md §8 scenario S2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorStats {
    pub total: usize,
    pub healthy: usize,
    pub exhausted: usize,
}

/// `healthy` counts candidates that are neither rate-limited nor cooling
/// down; `exhausted` counts the rest.
pub fn stats(snapshots: &[AccountSnapshot]) -> SelectorStats {
    let total = snapshots.len();
    let healthy = snapshots
        .iter()
        .filter(|s| !s.is_rate_limited && !s.is_cooling_down)
        .count();
    SelectorStats {
        total,
        healthy,
        exhausted: total - healthy,
    }
}

/// Select the best account from `snapshots` as of `now`. Excludes
/// rate-limited or cooling-down candidates first; if that empties the
/// field, falls back to the highest-health excluded candidate. Ties
/// break toward the lower `index`.
pub fn select(snapshots: &[AccountSnapshot], now: DateTime<Utc>) -> SelectionOutcome {
    if snapshots.is_empty() {
        return SelectionOutcome::NoAccountsConfigured;
    }

    let eligible: Vec<&AccountSnapshot> = snapshots
        .iter()
        .filter(|s| !s.is_rate_limited && !s.is_cooling_down)
        .collect();

    if eligible.is_empty() {
        let best = snapshots
            .iter()
            .max_by(|a, b| {
                a.health_score
                    .cmp(&b.health_score)
                    .then_with(|| b.index.cmp(&a.index))
            })
            .expect("snapshots non-empty");
        return SelectionOutcome::ExhaustedFallback(best.index);
    }

    let best = eligible
        .iter()
        .map(|s| (*s, priority(s, now)))
        .max_by(|(a, ap), (b, bp)| {
            ap.partial_cmp(bp)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.index.cmp(&a.index))
        })
        .expect("eligible non-empty");

    SelectionOutcome::Selected(best.0.index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(index: usize, health: i32, last_used_secs_ago: i64) -> AccountSnapshot {
        AccountSnapshot {
            index,
            health_score: health,
            is_rate_limited: false,
            is_cooling_down: false,
            last_used: Utc::now() - chrono::Duration::seconds(last_used_secs_ago),
            consecutive_failures: 0,
        }
    }

    #[test]
    fn no_accounts_configured_on_empty_snapshot() {
        assert_eq!(select(&[], Utc::now()), SelectionOutcome::NoAccountsConfigured);
    }

    #[test]
    fn excludes_rate_limited_and_cooling_down() {
        let now = Utc::now();
        let mut a = snap(0, 90, 10);
        a.is_rate_limited = true;
        let b = snap(1, 50, 10);
        assert_eq!(select(&[a, b], now), SelectionOutcome::Selected(1));
    }

    #[test]
    fn healthier_account_wins_over_fresher_one() {
        let now = Utc::now();
        let healthy_but_stale = snap(0, 90, 3600);
        let fresh_but_unhealthy = snap(1, 40, 0);
        assert_eq!(
            select(&[healthy_but_stale, fresh_but_unhealthy], now),
            SelectionOutcome::Selected(0)
        );
    }

    #[test]
    fn repeated_failures_decay_priority() {
        let now = Utc::now();
        let a = snap(0, 80, 0);
        let mut b = snap(1, 80, 0);
        b.consecutive_failures = 3; // -15, tips it below a
        assert_eq!(select(&[a, b], now), SelectionOutcome::Selected(0));
    }

    #[test]
    fn ties_break_toward_lower_index() {
        let now = Utc::now();
        let a = snap(0, 70, 100);
        let b = snap(1, 70, 100);
        assert_eq!(select(&[a, b], now), SelectionOutcome::Selected(0));
        assert_eq!(select(&[b, a], now), SelectionOutcome::Selected(0));
    }

    #[test]
    fn all_excluded_falls_back_to_highest_health() {
        let now = Utc::now();
        let mut a = snap(0, 90, 0);
        a.is_rate_limited = true;
        let mut b = snap(1, 40, 0);
        b.is_cooling_down = true;
        assert_eq!(select(&[a, b], now), SelectionOutcome::ExhaustedFallback(0));
    }

    #[test]
    fn lru_term_is_capped_at_one_hour() {
        let now = Utc::now();
        let a = snap(0, 50, 3600);
        let b = snap(1, 50, 7200); // beyond the cap, same effective term as a
        assert_eq!(select(&[a, b], now), SelectionOutcome::Selected(0)); // tie -> lower index
    }

    /// S2 — selector picks healthy over fresh; stats report one healthy,
    /// one exhausted.
    #[test]
    fn s2_selector_picks_healthy_over_fresh_and_reports_stats() {
        let now = Utc::now();
        let good = AccountSnapshot {
            index: 0,
            health_score: 90,
            is_rate_limited: false,
            is_cooling_down: false,
            last_used: now - chrono::Duration::hours(2),
            consecutive_failures: 0,
        };
        let bad = AccountSnapshot {
            index: 1,
            health_score: 20,
            is_rate_limited: true,
            is_cooling_down: false,
            last_used: now,
            consecutive_failures: 0,
        };
        let snapshots = [good, bad];
        assert_eq!(select(&snapshots, now), SelectionOutcome::Selected(0));
        assert_eq!(
            stats(&snapshots),
            SelectorStats { total: 2, healthy: 1, exhausted: 1 }
        );
    }
}
