//! Lock-free atomic metrics collection.

use super::TelemetrySnapshot;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters for the tile manager and its query handles.
///
/// All operations use `Relaxed` ordering; the counters are independent
/// measurements and are only ever read as a snapshot.
pub struct TileMetrics {
    start_time: Instant,

    // === Step metrics ===
    steps: AtomicU64,

    // === Load metrics ===
    /// Loads handed to the loader
    loads_issued: AtomicU64,
    /// Loads currently in flight
    loads_active: AtomicUsize,
    /// Payloads decoded and inserted
    loads_succeeded: AtomicU64,
    /// Loader errors (retried with backoff)
    loads_failed: AtomicU64,
    /// Loads re-issued after a failure deadline
    retries: AtomicU64,
    /// Payloads rejected by the codec or alignment check
    decode_failures: AtomicU64,
    /// Payloads recognised as previously rejected without decoding
    corrupt_payloads_skipped: AtomicU64,
    /// Total payload bytes received
    bytes_loaded: AtomicU64,
    /// Total loader latency in microseconds
    load_time_us: AtomicU64,

    // === Cache metrics ===
    tiles_evicted: AtomicU64,

    // === Query metrics ===
    queries: AtomicU64,
    queries_answered: AtomicU64,
    queries_unavailable: AtomicU64,
}

impl TileMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            steps: AtomicU64::new(0),
            loads_issued: AtomicU64::new(0),
            loads_active: AtomicUsize::new(0),
            loads_succeeded: AtomicU64::new(0),
            loads_failed: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            corrupt_payloads_skipped: AtomicU64::new(0),
            bytes_loaded: AtomicU64::new(0),
            load_time_us: AtomicU64::new(0),
            tiles_evicted: AtomicU64::new(0),
            queries: AtomicU64::new(0),
            queries_answered: AtomicU64::new(0),
            queries_unavailable: AtomicU64::new(0),
        }
    }

    // === Step tracking ===

    pub fn step_completed(&self) {
        self.steps.fetch_add(1, Ordering::Relaxed);
    }

    // === Load tracking ===

    /// Record a load being issued; `retry` marks a re-issue after failure.
    pub fn load_issued(&self, retry: bool) {
        self.loads_issued.fetch_add(1, Ordering::Relaxed);
        self.loads_active.fetch_add(1, Ordering::Relaxed);
        if retry {
            self.retries.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a loader call finishing, successfully or not.
    pub fn load_finished(&self, elapsed: Duration) {
        self.loads_active.fetch_sub(1, Ordering::Relaxed);
        self.load_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn load_succeeded(&self, bytes: usize) {
        self.loads_succeeded.fetch_add(1, Ordering::Relaxed);
        self.bytes_loaded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn load_failed(&self) {
        self.loads_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_failed(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn corrupt_payload_skipped(&self) {
        self.corrupt_payloads_skipped.fetch_add(1, Ordering::Relaxed);
    }

    // === Cache tracking ===

    pub fn tiles_evicted(&self, count: usize) {
        self.tiles_evicted.fetch_add(count as u64, Ordering::Relaxed);
    }

    // === Query tracking ===

    pub fn query_answered(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.queries_answered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn query_unavailable(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.queries_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let uptime = self.start_time.elapsed();
        let loads_issued = self.loads_issued.load(Ordering::Relaxed);
        let loads_active = self.loads_active.load(Ordering::Relaxed);
        let finished = loads_issued.saturating_sub(loads_active as u64);
        let load_time_us = self.load_time_us.load(Ordering::Relaxed);

        TelemetrySnapshot {
            uptime_secs: uptime.as_secs_f64(),
            steps: self.steps.load(Ordering::Relaxed),
            loads_issued,
            loads_active,
            loads_succeeded: self.loads_succeeded.load(Ordering::Relaxed),
            loads_failed: self.loads_failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            corrupt_payloads_skipped: self.corrupt_payloads_skipped.load(Ordering::Relaxed),
            bytes_loaded: self.bytes_loaded.load(Ordering::Relaxed),
            avg_load_ms: if finished > 0 {
                load_time_us as f64 / finished as f64 / 1000.0
            } else {
                0.0
            },
            tiles_evicted: self.tiles_evicted.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            queries_answered: self.queries_answered.load(Ordering::Relaxed),
            queries_unavailable: self.queries_unavailable.load(Ordering::Relaxed),
        }
    }
}

impl Default for TileMetrics {
    fn default() -> Self {
        Self::new()
    }
}
