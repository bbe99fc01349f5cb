//! Point-in-time telemetry snapshot.

use std::fmt;

use serde::Serialize;

/// Immutable copy of [`TileMetrics`](super::TileMetrics) for display and
/// JSON output.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TelemetrySnapshot {
    pub uptime_secs: f64,
    pub steps: u64,

    // === Load metrics ===
    pub loads_issued: u64,
    pub loads_active: usize,
    pub loads_succeeded: u64,
    pub loads_failed: u64,
    pub retries: u64,
    pub decode_failures: u64,
    pub corrupt_payloads_skipped: u64,
    pub bytes_loaded: u64,
    /// Mean loader latency of finished loads
    pub avg_load_ms: f64,

    // === Cache metrics ===
    pub tiles_evicted: u64,

    // === Query metrics ===
    pub queries: u64,
    pub queries_answered: u64,
    pub queries_unavailable: u64,
}

impl TelemetrySnapshot {
    /// Fraction of queries that produced an answer (0.0 - 1.0).
    pub fn availability(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            self.queries_answered as f64 / self.queries as f64
        }
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Steps:            {}", self.steps)?;
        writeln!(
            f,
            "Loads:            {} issued, {} ok, {} failed, {} retried, {} active",
            self.loads_issued, self.loads_succeeded, self.loads_failed, self.retries, self.loads_active
        )?;
        writeln!(
            f,
            "Corrupt payloads: {} rejected, {} skipped",
            self.decode_failures, self.corrupt_payloads_skipped
        )?;
        writeln!(
            f,
            "Data:             {:.1} KB, avg load {:.2} ms",
            self.bytes_loaded as f64 / 1024.0,
            self.avg_load_ms
        )?;
        writeln!(f, "Evicted:          {}", self.tiles_evicted)?;
        write!(
            f,
            "Queries:          {} ({:.1}% answered)",
            self.queries,
            self.availability() * 100.0
        )
    }
}
