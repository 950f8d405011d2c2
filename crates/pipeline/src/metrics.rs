use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use graph::LoadOutcome;

/// Counters for one pipeline run. Shared by all chunk workers.
pub struct RunMetrics {
    // Chunks
    chunks_total: AtomicUsize,
    chunks_succeeded: AtomicUsize,
    chunks_failed: AtomicUsize,
    fallback_splits: AtomicUsize,

    // Statements
    statements_generated: AtomicUsize,
    statements_sanitized: AtomicUsize,
    statements_executed: AtomicUsize,
    batches_committed: AtomicUsize,
    batches_failed: AtomicUsize,

    // Timing (in microseconds)
    total_extract_time_us: AtomicU64,
    total_load_time_us: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            chunks_total: AtomicUsize::new(0),
            chunks_succeeded: AtomicUsize::new(0),
            chunks_failed: AtomicUsize::new(0),
            fallback_splits: AtomicUsize::new(0),
            statements_generated: AtomicUsize::new(0),
            statements_sanitized: AtomicUsize::new(0),
            statements_executed: AtomicUsize::new(0),
            batches_committed: AtomicUsize::new(0),
            batches_failed: AtomicUsize::new(0),
            total_extract_time_us: AtomicU64::new(0),
            total_load_time_us: AtomicU64::new(0),
        })
    }

    pub fn record_chunks(&self, count: usize) {
        self.chunks_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_chunk(&self, success: bool, duration: Duration) {
        if success {
            self.chunks_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.chunks_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.total_extract_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_splits(&self, splits: usize) {
        self.fallback_splits.store(splits, Ordering::Relaxed);
    }

    pub fn record_statements(&self, generated: usize, sanitized: usize) {
        self.statements_generated.fetch_add(generated, Ordering::Relaxed);
        self.statements_sanitized.fetch_add(sanitized, Ordering::Relaxed);
    }

    pub fn record_load(&self, outcome: &LoadOutcome, duration: Duration) {
        self.statements_executed
            .fetch_add(outcome.statements_executed, Ordering::Relaxed);
        self.batches_committed
            .fetch_add(outcome.batches_committed, Ordering::Relaxed);
        self.batches_failed
            .fetch_add(outcome.batches_failed, Ordering::Relaxed);
        self.total_load_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let chunks_total = self.chunks_total.load(Ordering::Relaxed);
        let extract_us = self.total_extract_time_us.load(Ordering::Relaxed) as f64;
        MetricsSnapshot {
            chunks_total,
            chunks_succeeded: self.chunks_succeeded.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
            fallback_splits: self.fallback_splits.load(Ordering::Relaxed),
            statements_generated: self.statements_generated.load(Ordering::Relaxed),
            statements_sanitized: self.statements_sanitized.load(Ordering::Relaxed),
            statements_executed: self.statements_executed.load(Ordering::Relaxed),
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            avg_chunk_time_ms: if chunks_total > 0 {
                extract_us / chunks_total as f64 / 1000.0
            } else {
                0.0
            },
            load_time_ms: self.total_load_time_us.load(Ordering::Relaxed) as f64 / 1000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub chunks_total: usize,
    pub chunks_succeeded: usize,
    pub chunks_failed: usize,
    pub fallback_splits: usize,
    pub statements_generated: usize,
    pub statements_sanitized: usize,
    pub statements_executed: usize,
    pub batches_committed: usize,
    pub batches_failed: usize,
    pub avg_chunk_time_ms: f64,
    pub load_time_ms: f64,
}

impl MetricsSnapshot {
    pub fn summary(&self) -> String {
        format!(
            "chunks {}/{} ok ({} failed, {} fallback splits), statements {} generated, {} after sanitizing, {} executed, batches {} committed / {} failed, avg chunk {:.1} ms, load {:.1} ms",
            self.chunks_succeeded,
            self.chunks_total,
            self.chunks_failed,
            self.fallback_splits,
            self.statements_generated,
            self.statements_sanitized,
            self.statements_executed,
            self.batches_committed,
            self.batches_failed,
            self.avg_chunk_time_ms,
            self.load_time_ms,
        )
    }
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
