use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use depot_model::StoreKey;

use crate::location::NfcLocation;
use crate::NotFoundCache;

/// Negative-cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NfcConfig {
    /// Default TTL for negative entries, seconds, applied when a store
    /// carries no override. Zero disables negative caching globally.
    pub default_timeout_secs: u64,
}

impl Default for NfcConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 3600,
        }
    }
}

impl NfcConfig {
    /// The default TTL as a `Duration`.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

/// In-memory expiring [`NotFoundCache`].
///
/// Each entry stores its own deadline, computed when the miss is recorded,
/// so later configuration changes never shift existing entries. The read
/// path takes only the shared lock; expired entries are dropped by the
/// mutating calls and by [`Self::purge_expired`].
pub struct MemoryNotFoundCache {
    default_timeout: Duration,
    entries: RwLock<HashMap<StoreKey, HashMap<String, Instant>>>,
}

impl MemoryNotFoundCache {
    pub fn new(config: &NfcConfig) -> Self {
        Self {
            default_timeout: config.default_timeout(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    ///
    /// Lazy per-read expiry keeps answers exact without this; calling it
    /// periodically merely bounds memory held by dead entries.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("nfc lock poisoned");
        let mut removed = 0;
        entries.retain(|_, paths| {
            let before = paths.len();
            paths.retain(|_, deadline| now < *deadline);
            removed += before - paths.len();
            !paths.is_empty()
        });
        removed
    }
}

impl Default for MemoryNotFoundCache {
    fn default() -> Self {
        Self::new(&NfcConfig::default())
    }
}

impl NotFoundCache for MemoryNotFoundCache {
    fn add_missing(&self, location: &NfcLocation, path: &str) {
        let ttl = location.effective_timeout(self.default_timeout);
        if ttl.is_zero() {
            // Negative caching disabled for this location; make sure no
            // stale entry lingers from an earlier configuration.
            self.clear_missing(&location.key, path);
            return;
        }
        let deadline = Instant::now() + ttl;
        debug!(store = %location.key, path, ttl_secs = ttl.as_secs(), "recording miss");
        self.entries
            .write()
            .expect("nfc lock poisoned")
            .entry(location.key.clone())
            .or_default()
            .insert(path.to_string(), deadline);
    }

    fn is_missing(&self, key: &StoreKey, path: &str) -> bool {
        let entries = self.entries.read().expect("nfc lock poisoned");
        match entries.get(key).and_then(|paths| paths.get(path)) {
            Some(deadline) => Instant::now() < *deadline,
            None => false,
        }
    }

    fn clear_missing(&self, key: &StoreKey, path: &str) {
        let mut entries = self.entries.write().expect("nfc lock poisoned");
        if let Some(paths) = entries.get_mut(key) {
            paths.remove(path);
            if paths.is_empty() {
                entries.remove(key);
            }
        }
    }

    fn clear_all_missing(&self, key: &StoreKey) {
        self.entries.write().expect("nfc lock poisoned").remove(key);
    }

    fn snapshot(&self) -> HashMap<StoreKey, BTreeSet<String>> {
        let now = Instant::now();
        let entries = self.entries.read().expect("nfc lock poisoned");
        entries
            .iter()
            .filter_map(|(key, paths)| {
                let live: BTreeSet<String> = paths
                    .iter()
                    .filter(|(_, deadline)| now < **deadline)
                    .map(|(path, _)| path.clone())
                    .collect();
                if live.is_empty() {
                    None
                } else {
                    Some((key.clone(), live))
                }
            })
            .collect()
    }

    fn size(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().expect("nfc lock poisoned");
        entries
            .values()
            .map(|paths| paths.values().filter(|deadline| now < **deadline).count())
            .sum()
    }
}
