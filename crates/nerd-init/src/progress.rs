//! `InitProgress` channel (C10, spec.md §6.5): single-producer,
//! many-reader-shaped (in practice one receiver), drop-on-full.
//!
//! Grounded on the teacher's general `tokio::sync` usage in
//! `at-daemon` and `at-bridge::event_bus::EventBus`'s broadcast idiom,
//! generalized from `EventBus`'s unbounded-fanout `flume` channel to a
//! single bounded `tokio::sync::mpsc` whose sender drops updates
//! instead of blocking when the receiver isn't draining.

use chrono::Duration as ChronoDuration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct AgentUpdate {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct InitProgress {
    pub phase: String,
    pub message: String,
    pub percent: f64,
    pub current_phase_no: u32,
    pub total_phases: u32,
    pub elapsed: ChronoDuration,
    pub eta_remaining: ChronoDuration,
    pub agent_update: Option<AgentUpdate>,
}

/// Sender half. `send` uses `try_send` and silently drops the update
/// on `Full` — a slow or absent receiver never blocks the orchestrator
/// (spec.md §6.5, §5 "Suspension points").
#[derive(Clone)]
pub struct ProgressSender(mpsc::Sender<InitProgress>);

impl ProgressSender {
    pub fn send(&self, progress: InitProgress) {
        if let Err(mpsc::error::TrySendError::Closed(_)) = self.0.try_send(progress) {
            // Receiver gone; nothing more to do, the orchestrator keeps running.
        }
    }
}

/// Bounded channel; a small buffer is enough since the pipeline only
/// emits on phase boundaries and per-agent sub-steps.
pub fn channel(capacity: usize) -> (ProgressSender, mpsc::Receiver<InitProgress>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ProgressSender(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InitProgress {
        InitProgress {
            phase: "setup".into(),
            message: "starting".into(),
            percent: 0.0,
            current_phase_no: 1,
            total_phases: 22,
            elapsed: ChronoDuration::zero(),
            eta_remaining: ChronoDuration::zero(),
            agent_update: None,
        }
    }

    #[tokio::test]
    async fn send_drops_silently_when_buffer_is_full() {
        let (tx, mut rx) = channel(1);
        tx.send(sample());
        tx.send(sample());
        tx.send(sample());

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 1);
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_does_not_panic() {
        let (tx, rx) = channel(1);
        drop(rx);
        tx.send(sample());
    }
}
