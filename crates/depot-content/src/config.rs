use std::time::Duration;

use serde::{Deserialize, Serialize};

use depot_model::path;

/// Content-engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentConfig {
    /// File names treated as aggregable metadata: a group resolution
    /// merges these across all members instead of stopping at the first
    /// hit.
    pub mergable_names: Vec<String>,
    /// Checksum sidecar suffixes. A sidecar of a mergable name still
    /// resolves as plain content (merged-metadata checksums are produced
    /// outside the core).
    pub checksum_suffixes: Vec<String>,
    /// Default per-upstream-call timeout, seconds, when a remote store
    /// carries no override.
    pub upstream_timeout_secs: u64,
    /// Global cap on concurrent upstream calls, across all requests.
    pub max_inflight_upstream: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            mergable_names: vec![
                "maven-metadata.xml".to_string(),
                "archetype-catalog.xml".to_string(),
            ],
            checksum_suffixes: vec![
                ".md5".to_string(),
                ".sha1".to_string(),
                ".sha256".to_string(),
            ],
            upstream_timeout_secs: 30,
            max_inflight_upstream: 64,
        }
    }
}

impl ContentConfig {
    /// Whether a path names aggregable metadata.
    pub fn is_mergable(&self, content_path: &str) -> bool {
        let Some(name) = path::file_name(content_path) else {
            return false;
        };
        if self.checksum_suffixes.iter().any(|s| name.ends_with(s)) {
            return false;
        }
        self.mergable_names.iter().any(|m| m == name)
    }

    /// Default upstream call timeout as a `Duration`.
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}
