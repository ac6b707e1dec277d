//! Not-found cache (NFC) for Depot.
//!
//! Resolution walks consult many stores per request; a path confirmed
//! absent from a store should not trigger another upstream round-trip until
//! its negative entry expires. The NFC records those confirmed misses,
//! keyed per store location so the same path can be missing in one store
//! and present in another.
//!
//! Expiry is lazy and exact per read: entries are judged against their
//! deadline at lookup time, never by a background sweep, so a direct
//! [`NotFoundCache::is_missing`] check and the aggregate
//! [`NotFoundCache::snapshot`] always agree.
//!
//! The cache is in-memory by design. Losing it on restart is safe; it only
//! repopulates known misses.

pub mod cache;
pub mod location;

pub use cache::{MemoryNotFoundCache, NfcConfig};
pub use location::NfcLocation;

use std::collections::{BTreeSet, HashMap};

use depot_model::StoreKey;

/// Negative-result cache over (store location, path).
pub trait NotFoundCache: Send + Sync {
    /// Record a confirmed miss. Idempotent; re-marking resets the clock.
    /// A location with negative caching disabled is never recorded.
    fn add_missing(&self, location: &NfcLocation, path: &str);

    /// Whether an unexpired entry exists for this location and path.
    fn is_missing(&self, key: &StoreKey, path: &str) -> bool;

    /// Drop one entry, e.g. after content was written at that path.
    fn clear_missing(&self, key: &StoreKey, path: &str);

    /// Drop every entry for a store.
    fn clear_all_missing(&self, key: &StoreKey);

    /// Snapshot of all currently-unexpired entries, for diagnostics.
    fn snapshot(&self) -> HashMap<StoreKey, BTreeSet<String>>;

    /// Number of unexpired entries.
    fn size(&self) -> usize;
}
