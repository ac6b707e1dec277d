//! In-memory [`Transfer`] implementation.
//!
//! Backs stores with plain byte maps. Suitable for tests, embedding, and
//! as the reference for what the core expects from a real transport:
//! `None`/empty answers are confirmed misses, injected faults surface as
//! [`TransferError`]s, and latency is honored before every answer.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use depot_model::{path, StoreKey};

use crate::transfer::{ListEntry, Transfer, TransferError};

#[derive(Default)]
struct State {
    content: HashMap<StoreKey, BTreeMap<String, Vec<u8>>>,
    broken_stores: HashSet<StoreKey>,
    broken_paths: HashSet<(StoreKey, String)>,
    latency: HashMap<StoreKey, Duration>,
}

/// A byte store over in-memory maps, with fault and latency injection.
#[derive(Default)]
pub struct MemoryTransfer {
    state: RwLock<State>,
}

impl MemoryTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed content directly, bypassing the transfer API.
    pub fn seed(&self, store: &StoreKey, content_path: &str, bytes: impl Into<Vec<u8>>) {
        let mut state = self.state.write().expect("transfer lock poisoned");
        state
            .content
            .entry(store.clone())
            .or_default()
            .insert(path::normalize(content_path), bytes.into());
    }

    /// Every call against this store fails with an upstream error.
    pub fn break_store(&self, store: &StoreKey) {
        let mut state = self.state.write().expect("transfer lock poisoned");
        state.broken_stores.insert(store.clone());
    }

    /// Calls for one specific path fail with an upstream error.
    pub fn break_path(&self, store: &StoreKey, content_path: &str) {
        let mut state = self.state.write().expect("transfer lock poisoned");
        state
            .broken_paths
            .insert((store.clone(), path::normalize(content_path)));
    }

    /// Delay every answer from this store.
    pub fn set_latency(&self, store: &StoreKey, latency: Duration) {
        let mut state = self.state.write().expect("transfer lock poisoned");
        state.latency.insert(store.clone(), latency);
    }

    /// All paths currently held for a store, in order.
    pub fn paths(&self, store: &StoreKey) -> Vec<String> {
        let state = self.state.read().expect("transfer lock poisoned");
        state
            .content
            .get(store)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn checkpoint(&self, store: &StoreKey, content_path: &str) -> Result<(), TransferError> {
        let (latency, broken) = {
            let state = self.state.read().expect("transfer lock poisoned");
            let broken = state.broken_stores.contains(store)
                || state
                    .broken_paths
                    .contains(&(store.clone(), path::normalize(content_path)));
            (state.latency.get(store).copied(), broken)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if broken {
            return Err(TransferError::Upstream {
                store: store.clone(),
                path: content_path.to_string(),
                reason: "injected fault".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transfer for MemoryTransfer {
    async fn exists(&self, store: &StoreKey, content_path: &str) -> Result<bool, TransferError> {
        Ok(self.fetch(store, content_path).await?.is_some())
    }

    async fn fetch(
        &self,
        store: &StoreKey,
        content_path: &str,
    ) -> Result<Option<Vec<u8>>, TransferError> {
        self.checkpoint(store, content_path).await?;
        let state = self.state.read().expect("transfer lock poisoned");
        Ok(state
            .content
            .get(store)
            .and_then(|m| m.get(&path::normalize(content_path)))
            .cloned())
    }

    async fn list(
        &self,
        store: &StoreKey,
        content_path: &str,
    ) -> Result<Vec<ListEntry>, TransferError> {
        self.checkpoint(store, content_path).await?;
        let dir = path::normalize(content_path);
        let prefix = if dir == "/" { "/".to_string() } else { format!("{dir}/") };

        let state = self.state.read().expect("transfer lock poisoned");
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        if let Some(content) = state.content.get(store) {
            for stored in content.keys() {
                if let Some(rest) = stored.strip_prefix(&prefix) {
                    let (name, directory) = match rest.split_once('/') {
                        Some((head, _)) => (head, true),
                        None => (rest, false),
                    };
                    if seen.insert(name.to_string()) {
                        entries.push(ListEntry {
                            name: name.to_string(),
                            directory,
                        });
                    }
                }
            }
        }
        Ok(entries)
    }

    async fn put(
        &self,
        store: &StoreKey,
        content_path: &str,
        bytes: Vec<u8>,
    ) -> Result<(), TransferError> {
        self.checkpoint(store, content_path).await?;
        let mut state = self.state.write().expect("transfer lock poisoned");
        state
            .content
            .entry(store.clone())
            .or_default()
            .insert(path::normalize(content_path), bytes);
        Ok(())
    }

    async fn delete(&self, store: &StoreKey, content_path: &str) -> Result<bool, TransferError> {
        self.checkpoint(store, content_path).await?;
        let mut state = self.state.write().expect("transfer lock poisoned");
        Ok(state
            .content
            .get_mut(store)
            .map(|m| m.remove(&path::normalize(content_path)).is_some())
            .unwrap_or(false))
    }
}
