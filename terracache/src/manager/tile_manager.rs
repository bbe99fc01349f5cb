//! Per-step orchestration of tile loads, retries and eviction.
//!
//! # Tile State Machine
//!
//! ```text
//! NotLoaded --[required]--> Loading
//! Loading --[payload decodes and covers the bucket]--> Ready
//! Loading --[loader error]--> Failed (retry_after = step + backoff)
//! Loading --[corrupt payload]--> Failed (never retried)
//! Failed --[required and step >= retry_after]--> Loading
//! Ready | Failed --[untouched for grace steps]--> NotLoaded (evicted)
//! ```
//!
//! # Concurrency
//!
//! `step_once` is synchronous and never blocks: loads run as tasks on the
//! Tokio runtime, bounded by a semaphore, and report back over an unbounded
//! channel that is drained at each step. Queries go through
//! [`TerrainQuery`] handles that only read the shared cache.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::TileManagerConfig;
use super::error::{ManagerError, QueryError};
use super::query::TerrainQuery;
use crate::bucket::{address_for, neighborhood, BucketAddress, CoordError};
use crate::cache::{TileCache, TileStatus, NEVER_RETRY};
use crate::codec;
use crate::grid::{Plane, Vec3};
use crate::loader::{LoadError, TileLoader};
use crate::telemetry::TileMetrics;

/// Last reported viewer position and the bucket containing it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerPosition {
    pub lon: f64,
    pub lat: f64,
    pub bucket: BucketAddress,
}

/// Summary of one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Step id this report covers.
    pub step: u64,
    /// Viewer bucket, if a position has been set.
    pub center: Option<BucketAddress>,
    /// Size of the required set.
    pub required: usize,
    /// Loads issued this step (including retries).
    pub issued: usize,
    /// Loads issued this step for previously failed tiles.
    pub retried: usize,
    /// Grids inserted this step.
    pub completed: usize,
    /// Completions that ended in a failed entry.
    pub failed: usize,
    /// Entries evicted this step.
    pub evicted: usize,
    /// Loads still in flight after the step.
    pub pending: usize,
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let center = self
            .center
            .map_or_else(|| "-".to_string(), |bucket| bucket.key());
        write!(
            f,
            "step {} at {}: {} required, {} issued ({} retries), {} loaded, {} failed, {} evicted, {} pending",
            self.step,
            center,
            self.required,
            self.issued,
            self.retried,
            self.completed,
            self.failed,
            self.evicted,
            self.pending
        )
    }
}

/// Result of one loader call, sent back from the load task.
struct LoadCompletion {
    address: BucketAddress,
    result: Result<Bytes, LoadError>,
}

/// Keeps the tiles around a moving viewer resident.
///
/// Each call to [`TileManager::step_once`] recomputes the required set from
/// the last viewer position, issues loads for missing or retry-due tiles,
/// applies finished loads and evicts tiles that have gone unused for longer
/// than the grace period.
pub struct TileManager {
    config: TileManagerConfig,
    cache: Arc<TileCache>,
    loader: Arc<dyn TileLoader>,
    runtime: Handle,
    metrics: Arc<TileMetrics>,

    completions_tx: mpsc::UnboundedSender<LoadCompletion>,
    completions_rx: mpsc::UnboundedReceiver<LoadCompletion>,
    load_permits: Arc<Semaphore>,
    shutdown: CancellationToken,

    current_step: u64,
    viewer: Option<ViewerPosition>,
    required: HashSet<BucketAddress>,
    in_flight: HashSet<BucketAddress>,
    /// SHA-256 digests of payloads already rejected as corrupt.
    corrupt_digests: HashSet<[u8; 32]>,
}

impl TileManager {
    /// Creates a manager on the ambient Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::NoRuntime` when called outside a runtime.
    pub fn new(config: TileManagerConfig, loader: Arc<dyn TileLoader>) -> Result<Self, ManagerError> {
        let runtime = Handle::try_current().map_err(|_| ManagerError::NoRuntime)?;
        Ok(Self::with_runtime(config, loader, runtime))
    }

    /// Creates a manager that spawns its loads on `runtime`.
    pub fn with_runtime(config: TileManagerConfig, loader: Arc<dyn TileLoader>, runtime: Handle) -> Self {
        let config = config.normalized();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        info!(
            loader = loader.name(),
            radius = config.retention_radius_tiles,
            grace_steps = config.retention_grace_steps,
            max_concurrent_loads = config.max_concurrent_loads,
            "Tile manager started"
        );

        Self {
            load_permits: Arc::new(Semaphore::new(config.max_concurrent_loads)),
            config,
            cache: Arc::new(TileCache::new()),
            loader,
            runtime,
            metrics: Arc::new(TileMetrics::new()),
            completions_tx,
            completions_rx,
            shutdown: CancellationToken::new(),
            current_step: 0,
            viewer: None,
            required: HashSet::new(),
            in_flight: HashSet::new(),
            corrupt_digests: HashSet::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &TileManagerConfig {
        &self.config
    }

    /// Id of the next step to run.
    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    pub fn viewer(&self) -> Option<ViewerPosition> {
        self.viewer
    }

    /// Addresses required by the most recent step.
    pub fn required(&self) -> &HashSet<BucketAddress> {
        &self.required
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<TileMetrics> {
        &self.metrics
    }

    /// Loads issued and not yet applied.
    pub fn pending_loads(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// A query handle sharing this manager's cache.
    pub fn query(&self) -> TerrainQuery {
        TerrainQuery::new(Arc::clone(&self.cache), Arc::clone(&self.metrics))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn elevation_at(&self, lon: f64, lat: f64) -> Result<f64, QueryError> {
        self.query().elevation_at(lon, lat)
    }

    pub fn normal_near(&self, lon: f64, lat: f64, radius_m: f64) -> Result<Vec3, QueryError> {
        self.query().normal_near(lon, lat, radius_m)
    }

    pub fn plane_near(&self, lon: f64, lat: f64, max_samples: usize) -> Result<Plane, QueryError> {
        self.query().plane_near(lon, lat, max_samples)
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Records the viewer position used by the next step.
    ///
    /// Returns the bucket containing the position.
    pub fn set_viewer_position(&mut self, lon: f64, lat: f64) -> Result<BucketAddress, CoordError> {
        let bucket = address_for(lon, lat)?;
        let previous = self.viewer.map(|viewer| viewer.bucket);
        if previous != Some(bucket) {
            info!(bucket = %bucket, lon, lat, "Viewer entered bucket");
        }
        self.viewer = Some(ViewerPosition { lon, lat, bucket });
        Ok(bucket)
    }

    /// Runs one step. Never blocks.
    pub fn step_once(&mut self) -> StepReport {
        let step = self.current_step;
        let mut report = StepReport {
            step,
            center: self.viewer.map(|viewer| viewer.bucket),
            ..StepReport::default()
        };

        if self.shutdown.is_cancelled() {
            return report;
        }

        self.cache.set_current_step(step);

        match report.center {
            Some(center) => {
                let required = neighborhood(&center, self.config.retention_radius_tiles);
                self.required = required.iter().copied().collect();
                report.required = required.len();

                for address in required {
                    match self.cache.status(&address) {
                        None => {
                            self.issue_load(address, step, false);
                            report.issued += 1;
                        }
                        Some(status) if status.retry_due(step) => {
                            self.issue_load(address, step, true);
                            report.issued += 1;
                            report.retried += 1;
                        }
                        Some(_) => {
                            self.cache.touch(&address, step);
                        }
                    }
                }
            }
            None => self.required.clear(),
        }

        while let Ok(completion) = self.completions_rx.try_recv() {
            self.apply_completion(completion, step, &mut report);
        }

        let threshold = step.saturating_sub(self.config.retention_grace_steps);
        let eviction = self.cache.evict_untouched_since(threshold);
        report.evicted = eviction.count();
        self.metrics.tiles_evicted(eviction.count());

        report.pending = self.in_flight.len();
        self.current_step += 1;
        self.metrics.step_completed();

        debug!(%report, "Step complete");
        report
    }

    /// Waits for every in-flight load and applies it, without advancing the
    /// step. Returns the number of completions applied.
    pub async fn settle(&mut self) -> usize {
        let step = self.current_step.saturating_sub(1);
        let mut report = StepReport {
            step,
            ..StepReport::default()
        };
        let mut applied = 0;

        while !self.in_flight.is_empty() && !self.shutdown.is_cancelled() {
            match self.completions_rx.recv().await {
                Some(completion) => {
                    self.apply_completion(completion, step, &mut report);
                    applied += 1;
                }
                None => break,
            }
        }

        if applied > 0 {
            debug!(
                step,
                completed = report.completed,
                failed = report.failed,
                "Settled in-flight loads"
            );
        }
        applied
    }

    /// Cancels in-flight loads and drops every cached tile.
    ///
    /// Idempotent. Later steps do nothing.
    pub fn shutdown(&mut self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        self.load_permits.close();
        let pending = self.in_flight.len();
        self.in_flight.clear();
        self.required.clear();
        self.cache.clear();
        info!(pending, step = self.current_step, "Tile manager shut down");
    }

    // =========================================================================
    // Load handling
    // =========================================================================

    fn issue_load(&mut self, address: BucketAddress, step: u64, retry: bool) {
        self.cache.mark_loading(address, step);
        self.in_flight.insert(address);
        self.metrics.load_issued(retry);

        let key = address.key();
        debug!(key = %key, step, retry, "Requesting tile");

        let loader = Arc::clone(&self.loader);
        let permits = Arc::clone(&self.load_permits);
        let token = self.shutdown.clone();
        let metrics = Arc::clone(&self.metrics);
        let completions = self.completions_tx.clone();

        self.runtime.spawn(async move {
            let started = Instant::now();
            let load = async {
                let _permit = match permits.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return Err(LoadError::Cancelled),
                };
                loader.request(&key).await
            };

            let result = tokio::select! {
                _ = token.cancelled() => Err(LoadError::Cancelled),
                result = load => result,
            };

            metrics.load_finished(started.elapsed());
            // The receiver is gone only when the manager was dropped
            let _ = completions.send(LoadCompletion { address, result });
        });
    }

    fn apply_completion(&mut self, completion: LoadCompletion, step: u64, report: &mut StepReport) {
        let LoadCompletion { address, result } = completion;
        self.in_flight.remove(&address);

        // The entry may have been cleared while the load was in flight
        if self.cache.status(&address) != Some(TileStatus::Loading) {
            debug!(address = %address, "Dropping completion for entry no longer loading");
            return;
        }

        match result {
            Ok(payload) => self.apply_payload(address, payload, step, report),
            Err(LoadError::Cancelled) if self.shutdown.is_cancelled() => {
                debug!(address = %address, "Load cancelled");
            }
            Err(error) => {
                let failures = self.cache.failure_count(&address).saturating_add(1);
                let backoff = self.config.backoff_for(failures);
                let retry_after = step.saturating_add(backoff);
                self.cache
                    .mark_failed(address, retry_after, error.to_string());
                self.metrics.load_failed();
                report.failed += 1;
                warn!(
                    address = %address,
                    error = %error,
                    failures,
                    retry_after,
                    "Tile load failed"
                );
            }
        }
    }

    fn apply_payload(&mut self, address: BucketAddress, payload: Bytes, step: u64, report: &mut StepReport) {
        let digest: [u8; 32] = Sha256::digest(&payload).into();
        if self.corrupt_digests.contains(&digest) {
            self.cache
                .mark_failed(address, NEVER_RETRY, "payload previously rejected as corrupt");
            self.metrics.corrupt_payload_skipped();
            report.failed += 1;
            warn!(address = %address, "Skipping known corrupt payload");
            return;
        }

        let reason = match codec::decode(&payload) {
            Ok(grid) if grid.is_aligned_with(&address) => {
                // Tiles no longer required keep their old stamp so the next
                // eviction pass can reclaim them
                let stamp = if self.required.contains(&address) {
                    step
                } else {
                    self.cache.last_touched(&address).unwrap_or(step)
                };
                self.cache.insert(address, Arc::new(grid), stamp);
                self.metrics.load_succeeded(payload.len());
                report.completed += 1;
                debug!(address = %address, bytes = payload.len(), "Tile ready");
                return;
            }
            Ok(grid) => format!(
                "grid at {:?} does not cover bucket {}",
                grid.origin_arcsec(),
                address
            ),
            Err(e) => e.to_string(),
        };

        self.corrupt_digests.insert(digest);
        self.cache.mark_failed(address, NEVER_RETRY, reason.as_str());
        self.metrics.decode_failed();
        report.failed += 1;
        warn!(address = %address, reason = %reason, "Rejected corrupt tile payload");
    }
}

impl Drop for TileManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for TileManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileManager")
            .field("loader", &self.loader.name())
            .field("current_step", &self.current_step)
            .field("viewer", &self.viewer)
            .field("in_flight", &self.in_flight.len())
            .field("cache", &self.cache)
            .finish()
    }
}
