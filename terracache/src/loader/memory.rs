//! In-memory loader with request accounting and injectable failures.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{BoxFuture, LoadError, TileLoader};
use crate::bucket::BucketAddress;
use crate::codec;
use crate::grid::ElevationGrid;

/// Serves payloads from a map keyed by canonical bucket key.
///
/// Queued failures for a key are returned before its payload. While the
/// loader is held, requests are counted but do not complete until
/// [`MemoryLoader::release`] is called.
pub struct MemoryLoader {
    payloads: DashMap<String, Bytes>,
    failures: Mutex<HashMap<String, VecDeque<LoadError>>>,
    requests: DashMap<String, usize>,
    total_requests: AtomicUsize,
    gate: watch::Sender<bool>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            payloads: DashMap::new(),
            failures: Mutex::new(HashMap::new()),
            requests: DashMap::new(),
            total_requests: AtomicUsize::new(0),
            gate,
        }
    }

    /// Stores a raw payload for `key`.
    pub fn insert(&self, key: impl Into<String>, payload: impl Into<Bytes>) {
        self.payloads.insert(key.into(), payload.into());
    }

    /// Encodes `grid` and stores it under the key of `address`.
    pub fn insert_grid(&self, address: &BucketAddress, grid: &ElevationGrid) {
        self.insert(address.key(), codec::encode(grid));
    }

    pub fn remove(&self, key: &str) -> Option<Bytes> {
        self.payloads.remove(key).map(|(_, payload)| payload)
    }

    /// Makes the next `times` requests for `key` fail with `error`.
    pub fn fail_next(&self, key: impl Into<String>, error: LoadError, times: usize) {
        let mut failures = self.failures.lock();
        let queue = failures.entry(key.into()).or_default();
        queue.extend(std::iter::repeat(error).take(times));
    }

    /// Number of requests issued for `key`.
    pub fn request_count(&self, key: &str) -> usize {
        self.requests.get(key).map_or(0, |count| *count)
    }

    pub fn total_requests(&self) -> usize {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Holds all requests (new and pending) until [`MemoryLoader::release`].
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    /// Lets held requests complete.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    fn respond(&self, key: &str) -> Result<Bytes, LoadError> {
        if let Some(error) = self
            .failures
            .lock()
            .get_mut(key)
            .and_then(|queue| queue.pop_front())
        {
            return Err(error);
        }
        self.payloads
            .get(key)
            .map(|payload| payload.clone())
            .ok_or_else(|| LoadError::NotFound(key.to_string()))
    }
}

impl Default for MemoryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TileLoader for MemoryLoader {
    fn request(&self, key: &str) -> BoxFuture<'_, Result<Bytes, LoadError>> {
        *self.requests.entry(key.to_string()).or_insert(0) += 1;
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let key = key.to_string();
        let mut gate = self.gate.subscribe();
        Box::pin(async move {
            // A dropped sender cannot happen while `self` is borrowed
            let _ = gate.wait_for(|open| *open).await;
            self.respond(&key)
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_serves_payload_and_counts() {
        let loader = MemoryLoader::new();
        loader.insert("k", Bytes::from_static(b"abc"));

        assert_eq!(loader.request("k").await.unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(loader.request("k").await.unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(loader.request_count("k"), 2);
        assert_eq!(loader.total_requests(), 2);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let loader = MemoryLoader::new();
        assert_eq!(
            loader.request("nope").await,
            Err(LoadError::NotFound("nope".to_string()))
        );
    }

    #[tokio::test]
    async fn test_queued_failures_precede_payload() {
        let loader = MemoryLoader::new();
        loader.insert("k", Bytes::from_static(b"abc"));
        loader.fail_next("k", LoadError::Io("disk".to_string()), 2);

        assert!(loader.request("k").await.is_err());
        assert!(loader.request("k").await.is_err());
        assert!(loader.request("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_hold_and_release() {
        let loader = std::sync::Arc::new(MemoryLoader::new());
        loader.insert("k", Bytes::from_static(b"abc"));
        loader.hold();

        let task = {
            let loader = std::sync::Arc::clone(&loader);
            tokio::spawn(async move { loader.request("k").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        loader.release();
        assert!(task.await.unwrap().is_ok());
    }
}
