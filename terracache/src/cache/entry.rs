//! Cache entries and their lifecycle state.
//!
//! ```text
//!  (absent) ──mark_loading──► Loading ──insert──────► Ready
//!                               │                      │
//!                               └──mark_failed──► Failed
//!                                                  │
//!            (retry deadline reached) mark_loading─┘
//! ```
//!
//! A `Failed` entry whose deadline is [`NEVER_RETRY`] stays failed until it
//! is evicted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::grid::ElevationGrid;

/// Retry deadline marking a permanent failure.
pub const NEVER_RETRY: u64 = u64::MAX;

/// Lifecycle state of one cached address.
#[derive(Debug, Clone)]
pub enum TileState {
    /// A load has been issued and has not completed.
    Loading,
    /// The grid is decoded and available to queries.
    Ready(Arc<ElevationGrid>),
    /// The last load failed; retry no earlier than `retry_after`.
    Failed { retry_after: u64, reason: String },
}

/// Snapshot of an entry's state without the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileStatus {
    Loading,
    Ready,
    Failed {
        retry_after: u64,
        failures: u32,
        reason: String,
    },
}

impl TileStatus {
    /// Whether a failed entry may be retried at `step`.
    pub fn retry_due(&self, step: u64) -> bool {
        matches!(self, TileStatus::Failed { retry_after, .. } if *retry_after != NEVER_RETRY && step >= *retry_after)
    }

    pub fn is_permanent_failure(&self) -> bool {
        matches!(self, TileStatus::Failed { retry_after, .. } if *retry_after == NEVER_RETRY)
    }
}

/// One slot of the tile cache.
#[derive(Debug)]
pub struct TileCacheEntry {
    pub(crate) state: TileState,
    last_touched: AtomicU64,
    pub(crate) failures: u32,
}

impl TileCacheEntry {
    pub(crate) fn new(state: TileState, step: u64) -> Self {
        Self {
            state,
            last_touched: AtomicU64::new(step),
            failures: 0,
        }
    }

    pub fn state(&self) -> &TileState {
        &self.state
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn last_touched(&self) -> u64 {
        self.last_touched.load(Ordering::Acquire)
    }

    /// Raises `last_touched` to `step`; never moves it backwards.
    pub(crate) fn touch(&self, step: u64) {
        self.last_touched.fetch_max(step, Ordering::AcqRel);
    }

    pub(crate) fn status(&self) -> TileStatus {
        match &self.state {
            TileState::Loading => TileStatus::Loading,
            TileState::Ready(_) => TileStatus::Ready,
            TileState::Failed {
                retry_after,
                reason,
            } => TileStatus::Failed {
                retry_after: *retry_after,
                failures: self.failures,
                reason: reason.clone(),
            },
        }
    }

    pub(crate) fn is_loading(&self) -> bool {
        matches!(self.state, TileState::Loading)
    }
}
