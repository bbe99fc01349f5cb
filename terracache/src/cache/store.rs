//! Concurrent keyed store of tile entries.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use super::entry::{TileCacheEntry, TileState, TileStatus};
use crate::bucket::BucketAddress;
use crate::grid::ElevationGrid;

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Total entries in any state.
    pub entries: usize,
    pub ready: usize,
    pub loading: usize,
    pub failed: usize,
    /// Query lookups that found a ready grid.
    pub hits: u64,
    /// Query lookups that did not.
    pub misses: u64,
    /// Entries removed by eviction since creation.
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries ({} ready, {} loading, {} failed), hit rate {:.1}%, {} evicted",
            self.entries,
            self.ready,
            self.loading,
            self.failed,
            self.hit_rate() * 100.0,
            self.evictions
        )
    }
}

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Addresses removed, in no particular order.
    pub evicted: Vec<BucketAddress>,
    /// How many of them held a ready grid.
    pub ready_evicted: usize,
    /// How many of them were failed entries.
    pub failed_evicted: usize,
}

impl EvictionReport {
    pub fn count(&self) -> usize {
        self.evicted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty()
    }
}

impl fmt::Display for EvictionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "evicted {} entries ({} ready, {} failed)",
            self.count(),
            self.ready_evicted,
            self.failed_evicted
        )
    }
}

/// Keyed store of tile entries shared between the manager and queries.
///
/// Reads and touches only take a shard read lock, so queries can run from
/// any thread while the manager steps. Every state change replaces an entry
/// under its shard write lock; readers never observe a half-updated entry.
pub struct TileCache {
    entries: DashMap<BucketAddress, TileCacheEntry>,
    current_step: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl TileCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            current_step: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Step stamped onto entries touched by [`TileCache::get`].
    pub fn current_step(&self) -> u64 {
        self.current_step.load(Ordering::Acquire)
    }

    pub fn set_current_step(&self, step: u64) {
        self.current_step.store(step, Ordering::Release);
    }

    /// Returns the grid for `address` if it is ready, touching the entry.
    pub fn get(&self, address: &BucketAddress) -> Option<Arc<ElevationGrid>> {
        let grid = self.entries.get(address).and_then(|entry| match &entry.state {
            TileState::Ready(grid) => {
                entry.touch(self.current_step());
                Some(Arc::clone(grid))
            }
            _ => None,
        });

        if grid.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        grid
    }

    /// Lifecycle state of `address`, or `None` if it is not cached.
    pub fn status(&self, address: &BucketAddress) -> Option<TileStatus> {
        self.entries.get(address).map(|entry| entry.status())
    }

    pub fn contains(&self, address: &BucketAddress) -> bool {
        self.entries.contains_key(address)
    }

    /// Stores a decoded grid, replacing any previous state.
    ///
    /// `last_touched` is raised to `step` (an existing later stamp is kept).
    /// Returns the grid that was replaced, if the entry was ready.
    pub fn insert(
        &self,
        address: BucketAddress,
        grid: Arc<ElevationGrid>,
        step: u64,
    ) -> Option<Arc<ElevationGrid>> {
        match self.entries.entry(address) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let previous = match std::mem::replace(&mut entry.state, TileState::Ready(grid)) {
                    TileState::Ready(old) => Some(old),
                    _ => None,
                };
                entry.failures = 0;
                entry.touch(step);
                previous
            }
            Entry::Vacant(vacant) => {
                vacant.insert(TileCacheEntry::new(TileState::Ready(grid), step));
                None
            }
        }
    }

    /// Marks `address` as loading and touches it at `step`.
    ///
    /// The consecutive failure count is kept so a retry that fails again
    /// backs off further.
    pub fn mark_loading(&self, address: BucketAddress, step: u64) {
        match self.entries.entry(address) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.state = TileState::Loading;
                entry.touch(step);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(TileCacheEntry::new(TileState::Loading, step));
            }
        }
    }

    /// Marks `address` as failed until `retry_after`.
    ///
    /// Returns the number of consecutive failures including this one.
    pub fn mark_failed(&self, address: BucketAddress, retry_after: u64, reason: impl Into<String>) -> u32 {
        let state = TileState::Failed {
            retry_after,
            reason: reason.into(),
        };
        match self.entries.entry(address) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.state = state;
                entry.failures = entry.failures.saturating_add(1);
                entry.failures
            }
            Entry::Vacant(vacant) => {
                let mut entry = TileCacheEntry::new(state, self.current_step());
                entry.failures = 1;
                vacant.insert(entry);
                1
            }
        }
    }

    /// Consecutive failures recorded for `address` (0 if absent).
    pub fn failure_count(&self, address: &BucketAddress) -> u32 {
        self.entries.get(address).map_or(0, |entry| entry.failures)
    }

    /// Raises the entry's `last_touched` to `step`. Returns `false` if absent.
    pub fn touch(&self, address: &BucketAddress, step: u64) -> bool {
        match self.entries.get(address) {
            Some(entry) => {
                entry.touch(step);
                trace!(address = %address, step, "Touched tile");
                true
            }
            None => false,
        }
    }

    pub fn last_touched(&self, address: &BucketAddress) -> Option<u64> {
        self.entries.get(address).map(|entry| entry.last_touched())
    }

    /// Removes every ready or failed entry last touched before `step`.
    ///
    /// Loading entries are never evicted; their completion decides their fate.
    pub fn evict_untouched_since(&self, step: u64) -> EvictionReport {
        let mut report = EvictionReport::default();

        self.entries.retain(|address, entry| {
            if entry.is_loading() || entry.last_touched() >= step {
                return true;
            }
            match entry.state {
                TileState::Ready(_) => report.ready_evicted += 1,
                TileState::Failed { .. } => report.failed_evicted += 1,
                TileState::Loading => {}
            }
            report.evicted.push(*address);
            false
        });

        if !report.is_empty() {
            self.evictions
                .fetch_add(report.count() as u64, Ordering::Relaxed);
            debug!(threshold = step, %report, "Evicted stale tiles");
        }
        report
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ready_count(&self) -> usize {
        self.count_where(|state| matches!(state, TileState::Ready(_)))
    }

    pub fn loading_count(&self) -> usize {
        self.count_where(|state| matches!(state, TileState::Loading))
    }

    pub fn failed_count(&self) -> usize {
        self.count_where(|state| matches!(state, TileState::Failed { .. }))
    }

    fn count_where(&self, predicate: impl Fn(&TileState) -> bool) -> usize {
        self.entries
            .iter()
            .filter(|entry| predicate(&entry.value().state))
            .count()
    }

    /// All cached addresses, sorted.
    pub fn addresses(&self) -> Vec<BucketAddress> {
        let mut addresses: Vec<_> = self.entries.iter().map(|entry| *entry.key()).collect();
        addresses.sort();
        addresses
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            ..CacheStats::default()
        };
        for entry in self.entries.iter() {
            stats.entries += 1;
            match entry.value().state {
                TileState::Loading => stats.loading += 1,
                TileState::Ready(_) => stats.ready += 1,
                TileState::Failed { .. } => stats.failed += 1,
            }
        }
        stats
    }

    /// Drops every entry. Used on teardown.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileCache")
            .field("entries", &self.entries.len())
            .field("current_step", &self.current_step())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::address_for;
    use crate::cache::NEVER_RETRY;
    use crate::grid::ResolutionClass;

    fn bucket(lon: f64, lat: f64) -> BucketAddress {
        address_for(lon, lat).unwrap()
    }

    fn grid_for(address: &BucketAddress) -> Arc<ElevationGrid> {
        Arc::new(ElevationGrid::for_bucket(
            address,
            ResolutionClass::ThirtyArcSecond,
            |_, _| 100,
        ))
    }

    #[test]
    fn test_get_returns_ready_only() {
        let cache = TileCache::new();
        let a = bucket(8.5, 47.3);

        assert!(cache.get(&a).is_none());
        cache.mark_loading(a, 0);
        assert!(cache.get(&a).is_none());
        assert_eq!(cache.status(&a), Some(TileStatus::Loading));

        cache.insert(a, grid_for(&a), 0);
        assert!(cache.get(&a).is_some());
        assert_eq!(cache.status(&a), Some(TileStatus::Ready));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn test_get_touches_at_current_step() {
        let cache = TileCache::new();
        let a = bucket(8.5, 47.3);
        cache.insert(a, grid_for(&a), 3);

        cache.set_current_step(9);
        cache.get(&a);
        assert_eq!(cache.last_touched(&a), Some(9));

        // Stamps never go backwards
        cache.set_current_step(4);
        cache.get(&a);
        assert_eq!(cache.last_touched(&a), Some(9));
    }

    #[test]
    fn test_insert_replaces_and_returns_previous() {
        let cache = TileCache::new();
        let a = bucket(8.5, 47.3);
        let first = grid_for(&a);

        assert!(cache.insert(a, Arc::clone(&first), 0).is_none());
        let previous = cache.insert(a, grid_for(&a), 1).unwrap();
        assert!(Arc::ptr_eq(&previous, &first));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_accumulate_and_reset_on_insert() {
        let cache = TileCache::new();
        let a = bucket(8.5, 47.3);

        cache.mark_loading(a, 0);
        assert_eq!(cache.mark_failed(a, 60, "timeout"), 1);
        cache.mark_loading(a, 60);
        assert_eq!(cache.mark_failed(a, 180, "timeout"), 2);
        assert_eq!(cache.failure_count(&a), 2);

        cache.mark_loading(a, 180);
        cache.insert(a, grid_for(&a), 181);
        assert_eq!(cache.failure_count(&a), 0);
    }

    #[test]
    fn test_evict_skips_loading_and_recent() {
        let cache = TileCache::new();
        let old_ready = bucket(8.5, 47.3);
        let old_failed = old_ready.offset(1, 0);
        let old_loading = old_ready.offset(2, 0);
        let recent = old_ready.offset(3, 0);

        cache.insert(old_ready, grid_for(&old_ready), 1);
        cache.mark_failed(old_failed, NEVER_RETRY, "corrupt");
        cache.mark_loading(old_loading, 1);
        cache.insert(recent, grid_for(&recent), 10);

        let report = cache.evict_untouched_since(10);
        assert_eq!(report.count(), 2);
        assert_eq!(report.ready_evicted, 1);
        assert_eq!(report.failed_evicted, 1);
        assert!(cache.contains(&old_loading));
        assert!(cache.contains(&recent));
        assert!(!cache.contains(&old_ready));
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn test_evict_threshold_is_strict() {
        let cache = TileCache::new();
        let a = bucket(8.5, 47.3);
        cache.insert(a, grid_for(&a), 5);

        assert!(cache.evict_untouched_since(5).is_empty());
        assert_eq!(cache.evict_untouched_since(6).count(), 1);
    }

    #[test]
    fn test_evicted_grid_outlives_reader() {
        let cache = TileCache::new();
        let a = bucket(8.5, 47.3);
        cache.insert(a, grid_for(&a), 0);

        let held = cache.get(&a).unwrap();
        cache.evict_untouched_since(100);
        assert!(cache.get(&a).is_none());
        assert_eq!(held.columns(), 16);
    }

    #[test]
    fn test_counts_and_addresses() {
        let cache = TileCache::new();
        let a = bucket(8.5, 47.3);
        let b = a.offset(1, 0);
        let c = a.offset(0, 1);

        cache.insert(a, grid_for(&a), 0);
        cache.mark_loading(b, 0);
        cache.mark_failed(c, 60, "not found");

        assert_eq!(cache.ready_count(), 1);
        assert_eq!(cache.loading_count(), 1);
        assert_eq!(cache.failed_count(), 1);
        assert_eq!(cache.addresses().len(), 3);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_readers_during_updates() {
        let cache = Arc::new(TileCache::new());
        let a = bucket(8.5, 47.3);
        cache.insert(a, grid_for(&a), 0);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        if let Some(grid) = cache.get(&a) {
                            assert_eq!(grid.rows(), 16);
                        }
                    }
                })
            })
            .collect();

        for step in 1..200 {
            cache.mark_loading(a, step);
            cache.insert(a, grid_for(&a), step);
        }
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(cache.ready_count(), 1);
    }
}
