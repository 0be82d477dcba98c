//! ETATracker (C11, spec.md §4.11): expected-vs-actual phase durations
//! plus a remaining-time estimate. All methods hold one mutex.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::phases::Phase;

struct Inner {
    start: DateTime<Utc>,
    phase_durations: HashMap<&'static str, ChronoDuration>,
    current_phase_start: DateTime<Utc>,
    current_phase_no: u32,
}

/// Default estimate for a phase name the tracker has never heard of.
const UNKNOWN_PHASE_DEFAULT_SECS: i64 = 10;

pub struct EtaTracker(Mutex<Inner>);

impl EtaTracker {
    pub fn new(start: DateTime<Utc>) -> Self {
        let phase_durations = Phase::ALL
            .iter()
            .map(|p| (p.name(), ChronoDuration::milliseconds((p.default_duration_secs() * 1000.0) as i64)))
            .collect();
        Self(Mutex::new(Inner {
            start,
            phase_durations,
            current_phase_start: start,
            current_phase_no: 0,
        }))
    }

    pub fn start_phase(&self, phase: Phase, now: DateTime<Utc>) {
        let mut inner = self.0.lock().expect("eta tracker lock poisoned");
        inner.current_phase_start = now;
        inner.current_phase_no = phase.number();
    }

    /// Overwrites the baseline estimate for `phase` with the actual
    /// elapsed duration, so future `remaining_eta` calls sharpen.
    pub fn complete_phase(&self, phase: Phase, now: DateTime<Utc>) {
        let mut inner = self.0.lock().expect("eta tracker lock poisoned");
        let elapsed = now - inner.current_phase_start;
        inner.phase_durations.insert(phase.name(), elapsed.max(ChronoDuration::zero()));
    }

    /// Sum of the current estimates for the phases named in
    /// `remaining`, defaulting unknown names to 10s.
    pub fn remaining_eta(&self, remaining: &[Phase]) -> ChronoDuration {
        let inner = self.0.lock().expect("eta tracker lock poisoned");
        remaining.iter().fold(ChronoDuration::zero(), |acc, phase| {
            acc + inner
                .phase_durations
                .get(phase.name())
                .copied()
                .unwrap_or_else(|| ChronoDuration::seconds(UNKNOWN_PHASE_DEFAULT_SECS))
        })
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> ChronoDuration {
        let inner = self.0.lock().expect("eta tracker lock poisoned");
        (now - inner.start).max(ChronoDuration::zero())
    }

    pub fn current_phase_no(&self) -> u32 {
        self.0.lock().expect("eta tracker lock poisoned").current_phase_no
    }
}
