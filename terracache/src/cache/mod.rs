//! In-memory tile cache.
//!
//! Entries are keyed by [`BucketAddress`](crate::bucket::BucketAddress) and
//! carry a lifecycle state plus the step at which they were last needed.
//! Eviction is driven explicitly by the tile manager; the cache itself has no
//! size-based policy.

mod entry;
mod store;

pub use entry::{TileCacheEntry, TileState, TileStatus, NEVER_RETRY};
pub use store::{CacheStats, EvictionReport, TileCache};
