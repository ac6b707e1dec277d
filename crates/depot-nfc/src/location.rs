use std::time::Duration;

use depot_model::{ArtifactStore, StoreKey};

/// Store-specific location identity for negative caching.
///
/// Carries the store key plus that store's negative-cache TTL override, if
/// any. Remote stores may shorten or lengthen the configured default; a
/// zero or negative override disables negative caching for the store
/// entirely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NfcLocation {
    pub key: StoreKey,
    /// `None`: use the configured default. `Some(ZERO)`: disabled.
    pub timeout_override: Option<Duration>,
}

impl NfcLocation {
    /// A location with no per-store override.
    pub fn new(key: StoreKey) -> Self {
        Self {
            key,
            timeout_override: None,
        }
    }

    /// Derive the location for a store definition, honoring the remote
    /// NFC timeout override.
    pub fn for_store(store: &ArtifactStore) -> Self {
        let timeout_override = match store {
            ArtifactStore::Remote(r) => r
                .nfc_timeout_secs
                .map(|secs| Duration::from_secs(secs.max(0) as u64)),
            _ => None,
        };
        Self {
            key: store.key().clone(),
            timeout_override,
        }
    }

    /// The TTL to apply for this location given the configured default.
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout_override.unwrap_or(default)
    }
}
