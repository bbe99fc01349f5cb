//! Tile manager configuration.

/// Default number of bucket rings kept around the viewer.
///
/// A radius of 1 keeps the 3x3 block of buckets centred on the viewer.
pub const DEFAULT_RETENTION_RADIUS_TILES: u32 = 1;

/// Largest accepted retention radius.
pub const MAX_RETENTION_RADIUS_TILES: u32 = 8;

/// Default number of steps an unneeded tile survives before eviction.
pub const DEFAULT_RETENTION_GRACE_STEPS: u64 = 120;

/// Default delay, in steps, before retrying a failed load.
pub const DEFAULT_RETRY_BACKOFF_STEPS: u64 = 60;

/// Default ceiling for the exponential retry delay.
pub const DEFAULT_MAX_RETRY_BACKOFF_STEPS: u64 = 3600;

/// Default number of loads allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT_LOADS: usize = 8;

/// Upper bound on concurrent loads.
pub const MAX_CONCURRENT_LOADS: usize = 64;

/// Tunables for [`TileManager`](super::TileManager).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileManagerConfig {
    /// Rings of buckets around the viewer's bucket that must be resident.
    pub retention_radius_tiles: u32,

    /// Steps a tile may go untouched before it is evicted.
    pub retention_grace_steps: u64,

    /// Delay before the first retry of a failed load. Later retries double
    /// the delay up to `max_retry_backoff_steps`.
    pub retry_backoff_steps: u64,

    /// Ceiling for the retry delay.
    pub max_retry_backoff_steps: u64,

    /// Loads allowed in flight at once.
    pub max_concurrent_loads: usize,
}

impl Default for TileManagerConfig {
    fn default() -> Self {
        Self {
            retention_radius_tiles: DEFAULT_RETENTION_RADIUS_TILES,
            retention_grace_steps: DEFAULT_RETENTION_GRACE_STEPS,
            retry_backoff_steps: DEFAULT_RETRY_BACKOFF_STEPS,
            max_retry_backoff_steps: DEFAULT_MAX_RETRY_BACKOFF_STEPS,
            max_concurrent_loads: DEFAULT_MAX_CONCURRENT_LOADS,
        }
    }
}

impl TileManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retention radius (clamped to 0..=8).
    pub fn with_retention_radius(mut self, radius: u32) -> Self {
        self.retention_radius_tiles = radius.min(MAX_RETENTION_RADIUS_TILES);
        self
    }

    pub fn with_grace_steps(mut self, steps: u64) -> Self {
        self.retention_grace_steps = steps;
        self
    }

    /// Set the initial retry delay (at least one step).
    pub fn with_retry_backoff(mut self, steps: u64) -> Self {
        self.retry_backoff_steps = steps.max(1);
        self
    }

    pub fn with_max_retry_backoff(mut self, steps: u64) -> Self {
        self.max_retry_backoff_steps = steps;
        self
    }

    /// Set the load concurrency (clamped to 1..=64).
    pub fn with_max_concurrent_loads(mut self, loads: usize) -> Self {
        self.max_concurrent_loads = loads.clamp(1, MAX_CONCURRENT_LOADS);
        self
    }

    /// Delay before retrying after `failures` consecutive failures.
    ///
    /// `retry_backoff_steps * 2^(failures - 1)`, capped at
    /// `max_retry_backoff_steps` (but never below the base delay).
    pub fn backoff_for(&self, failures: u32) -> u64 {
        let cap = self.max_retry_backoff_steps.max(self.retry_backoff_steps);
        let exponent = failures.saturating_sub(1).min(63);
        self.retry_backoff_steps
            .checked_mul(1u64 << exponent)
            .map_or(cap, |delay| delay.min(cap))
    }

    /// Copy with every field forced into its valid range.
    pub(crate) fn normalized(&self) -> Self {
        Self {
            retention_radius_tiles: self.retention_radius_tiles.min(MAX_RETENTION_RADIUS_TILES),
            retention_grace_steps: self.retention_grace_steps,
            retry_backoff_steps: self.retry_backoff_steps.max(1),
            max_retry_backoff_steps: self.max_retry_backoff_steps,
            max_concurrent_loads: self.max_concurrent_loads.clamp(1, MAX_CONCURRENT_LOADS),
        }
    }
}
