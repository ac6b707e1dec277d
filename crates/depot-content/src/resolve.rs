use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

use depot_model::{ArtifactStore, StoreKey};
use depot_nfc::{NfcLocation, NotFoundCache};
use depot_registry::StoreRegistry;

use crate::config::ContentConfig;
use crate::error::{ContentError, ContentResult};
use crate::merge::MetadataMerger;
use crate::transfer::{ListEntry, Transfer, TransferError};

/// Content found by a walk, with the candidates that contributed to it.
///
/// `sources` has one element for a first-hit resolution and one per
/// contributing member for merged metadata, in priority order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoundContent {
    pub content: Vec<u8>,
    pub sources: Vec<StoreKey>,
}

/// The outcome of resolving one path.
///
/// `NotFound` is a normal outcome, not an error. `Timeout` means the
/// request deadline expired with candidates still unconsulted; absence was
/// not confirmed, so nothing was negatively cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Found(FoundContent),
    NotFound,
    Timeout,
}

/// A transport failure from one candidate during a walk. Diagnostic only;
/// the walk continued past it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateFailure {
    pub store: StoreKey,
    pub error: TransferError,
}

/// Resolution plus per-candidate diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveOutcome {
    pub resolution: Resolution,
    pub failures: Vec<CandidateFailure>,
}

/// The outcome of a directory listing against a store or group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Listing {
    Found {
        entries: Vec<ListEntry>,
        sources: Vec<StoreKey>,
    },
    NotFound,
    Timeout,
}

/// Listing plus per-candidate diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingOutcome {
    pub listing: Listing,
    pub failures: Vec<CandidateFailure>,
}

enum CallResult<T> {
    Answered(T),
    Failed(TransferError),
    DeadlineExceeded,
}

/// The content resolution engine.
///
/// Expands the requested store into its ordered candidate list and walks
/// it: NFC-known misses are skipped without an upstream call, confirmed
/// misses are recorded, the first hit wins for plain content, and mergable
/// metadata and listings aggregate across all members. One broken upstream
/// never blocks the rest of a group.
pub struct ContentResolver {
    registry: Arc<dyn StoreRegistry>,
    nfc: Arc<dyn NotFoundCache>,
    transfer: Arc<dyn Transfer>,
    merger: Arc<dyn MetadataMerger>,
    config: ContentConfig,
    inflight: Arc<Semaphore>,
}

impl ContentResolver {
    pub fn new(
        registry: Arc<dyn StoreRegistry>,
        nfc: Arc<dyn NotFoundCache>,
        transfer: Arc<dyn Transfer>,
        merger: Arc<dyn MetadataMerger>,
        config: ContentConfig,
    ) -> Self {
        let inflight = Arc::new(Semaphore::new(config.max_inflight_upstream.max(1)));
        Self {
            registry,
            nfc,
            transfer,
            merger,
            config,
            inflight,
        }
    }

    /// Resolve a path against a store or group.
    ///
    /// Returns `Err` only when the request is structurally bad (unknown
    /// store, merge failure); misses, timeouts, and broken candidates are
    /// all represented in the outcome.
    pub async fn resolve(
        &self,
        key: &StoreKey,
        path: &str,
        deadline: Option<Instant>,
    ) -> ContentResult<ResolveOutcome> {
        let path = depot_model::path::normalize(path);
        let snapshot = self.registry.snapshot();
        if !snapshot.contains_key(key) {
            return Err(ContentError::NoSuchStore(key.clone()));
        }

        let candidates = self.registry.members_of(key);
        let mergable = self.config.is_mergable(&path);
        let mut failures = Vec::new();
        let mut hits: Vec<(StoreKey, Vec<u8>)> = Vec::new();

        for candidate in candidates {
            if deadline_passed(deadline) {
                return Ok(ResolveOutcome {
                    resolution: Resolution::Timeout,
                    failures,
                });
            }
            if self.nfc.is_missing(&candidate, &path) {
                debug!(store = %candidate, %path, "skipping NFC-known miss");
                continue;
            }

            let answer = self
                .call(&candidate, &path, deadline, self.transfer.fetch(&candidate, &path))
                .await;
            match answer {
                CallResult::Answered(Some(bytes)) => {
                    if !mergable {
                        debug!(store = %candidate, %path, "first hit wins");
                        return Ok(ResolveOutcome {
                            resolution: Resolution::Found(FoundContent {
                                content: bytes,
                                sources: vec![candidate],
                            }),
                            failures,
                        });
                    }
                    hits.push((candidate, bytes));
                }
                CallResult::Answered(None) => self.record_miss(&snapshot, &candidate, &path),
                CallResult::Failed(error) => {
                    warn!(store = %candidate, %path, %error, "candidate failed, continuing");
                    failures.push(CandidateFailure {
                        store: candidate,
                        error,
                    });
                }
                CallResult::DeadlineExceeded => {
                    return Ok(ResolveOutcome {
                        resolution: Resolution::Timeout,
                        failures,
                    });
                }
            }
        }

        let resolution = if hits.is_empty() {
            Resolution::NotFound
        } else {
            let sources: Vec<StoreKey> = hits.iter().map(|(k, _)| k.clone()).collect();
            let content = self.merger.merge(&path, &hits)?;
            Resolution::Found(FoundContent { content, sources })
        };
        Ok(ResolveOutcome {
            resolution,
            failures,
        })
    }

    /// List a directory against a store or group.
    ///
    /// A group's listing is the union of its members' listings; entries
    /// de-duplicate by name, first-listed member first.
    pub async fn list(
        &self,
        key: &StoreKey,
        path: &str,
        deadline: Option<Instant>,
    ) -> ContentResult<ListingOutcome> {
        let path = depot_model::path::normalize(path);
        let snapshot = self.registry.snapshot();
        if !snapshot.contains_key(key) {
            return Err(ContentError::NoSuchStore(key.clone()));
        }

        let candidates = self.registry.members_of(key);
        let mut failures = Vec::new();
        let mut entries: Vec<ListEntry> = Vec::new();
        let mut seen = HashSet::new();
        let mut sources = Vec::new();

        for candidate in candidates {
            if deadline_passed(deadline) {
                return Ok(ListingOutcome {
                    listing: Listing::Timeout,
                    failures,
                });
            }
            if self.nfc.is_missing(&candidate, &path) {
                continue;
            }

            let answer = self
                .call(&candidate, &path, deadline, self.transfer.list(&candidate, &path))
                .await;
            match answer {
                CallResult::Answered(listed) if !listed.is_empty() => {
                    sources.push(candidate);
                    for entry in listed {
                        if seen.insert(entry.name.clone()) {
                            entries.push(entry);
                        }
                    }
                }
                CallResult::Answered(_) => self.record_miss(&snapshot, &candidate, &path),
                CallResult::Failed(error) => failures.push(CandidateFailure {
                    store: candidate,
                    error,
                }),
                CallResult::DeadlineExceeded => {
                    return Ok(ListingOutcome {
                        listing: Listing::Timeout,
                        failures,
                    });
                }
            }
        }

        let listing = if sources.is_empty() {
            Listing::NotFound
        } else {
            Listing::Found { entries, sources }
        };
        Ok(ListingOutcome { listing, failures })
    }

    /// Write content through a store.
    ///
    /// A concrete target must itself be writable; a group routes to its
    /// first writable member. Negative-cache entries for the written path
    /// are cleared for the receiving store and every group it surfaces
    /// through, so the new content is immediately visible.
    pub async fn store(
        &self,
        key: &StoreKey,
        path: &str,
        bytes: Vec<u8>,
    ) -> ContentResult<StoreKey> {
        let path = depot_model::path::normalize(path);
        let snapshot = self.registry.snapshot();
        if !snapshot.contains_key(key) {
            return Err(ContentError::NoSuchStore(key.clone()));
        }

        let target = self
            .registry
            .members_of(key)
            .into_iter()
            .find(|k| snapshot.get(k).map(ArtifactStore::is_writable).unwrap_or(false))
            .ok_or_else(|| ContentError::NotWritable(key.clone()))?;

        self.transfer.put(&target, &path, bytes).await?;
        debug!(store = %target, %path, "content stored");

        self.clear_negative_entries(&target, &path);
        Ok(target)
    }

    /// Drop negative-cache entries for a path in a store and in every
    /// group whose resolution could traverse it.
    pub fn clear_negative_entries(&self, key: &StoreKey, path: &str) {
        self.nfc.clear_missing(key, path);
        for group in self.registry.groups_affected_by(key) {
            self.nfc.clear_missing(&group, path);
        }
    }

    fn record_miss(
        &self,
        snapshot: &std::collections::HashMap<StoreKey, ArtifactStore>,
        candidate: &StoreKey,
        path: &str,
    ) {
        let location = snapshot
            .get(candidate)
            .map(NfcLocation::for_store)
            .unwrap_or_else(|| NfcLocation::new(candidate.clone()));
        self.nfc.add_missing(&location, path);
    }

    /// Run one upstream call under the global in-flight cap, bounded by
    /// the per-store call timeout and the request deadline.
    ///
    /// A per-store timeout expiry is a transport failure (inconclusive,
    /// walk continues); the request deadline expiring is a request-level
    /// timeout.
    async fn call<T>(
        &self,
        candidate: &StoreKey,
        path: &str,
        deadline: Option<Instant>,
        fut: impl std::future::Future<Output = Result<T, TransferError>>,
    ) -> CallResult<T> {
        let call_limit = self.call_timeout(candidate);
        let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
        if matches!(remaining, Some(r) if r.is_zero()) {
            return CallResult::DeadlineExceeded;
        }
        let deadline_bound = matches!(remaining, Some(r) if r < call_limit);
        let effective = match remaining {
            Some(r) if deadline_bound => r,
            _ => call_limit,
        };

        let _permit = self
            .inflight
            .acquire()
            .await
            .expect("inflight semaphore closed");
        match tokio::time::timeout(effective, fut).await {
            Ok(Ok(value)) => CallResult::Answered(value),
            Ok(Err(error)) => CallResult::Failed(error),
            Err(_) if deadline_bound => CallResult::DeadlineExceeded,
            Err(_) => CallResult::Failed(TransferError::TimedOut {
                store: candidate.clone(),
                path: path.to_string(),
            }),
        }
    }

    fn call_timeout(&self, candidate: &StoreKey) -> Duration {
        match self.registry.get(candidate) {
            Some(ArtifactStore::Remote(remote)) => remote
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| self.config.upstream_timeout()),
            _ => self.config.upstream_timeout(),
        }
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    matches!(deadline, Some(d) if Instant::now() >= d)
}
