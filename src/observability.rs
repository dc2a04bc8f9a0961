use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Evaluation workflow counters
#[derive(Debug, Default)]
pub struct EvaluationMetrics {
    pub submitted: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub detached: AtomicU64,
    pub background_delivered: AtomicU64,
    pub stale_discarded: AtomicU64,
    pub cancelled: AtomicU64,
}

impl EvaluationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detached(&self) {
        self.detached.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_background_delivered(&self) {
        self.background_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_discarded(&self) {
        self.stale_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EvaluationStats {
        EvaluationStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            detached: self.detached.load(Ordering::Relaxed),
            background_delivered: self.background_delivered.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.snapshot();
        info!(
            "Evaluation metrics: submitted={}, completed={}, failed={}, detached={}, background_delivered={}, stale_discarded={}, cancelled={}",
            stats.submitted,
            stats.completed,
            stats.failed,
            stats.detached,
            stats.background_delivered,
            stats.stale_discarded,
            stats.cancelled
        );
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub detached: u64,
    pub background_delivered: u64,
    pub stale_discarded: u64,
    pub cancelled: u64,
}

impl EvaluationStats {
    /// Runs that reached a terminal state of any kind.
    pub fn finished(&self) -> u64 {
        self.completed + self.failed + self.stale_discarded + self.cancelled
    }
}
