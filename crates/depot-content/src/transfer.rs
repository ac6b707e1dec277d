use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use depot_model::StoreKey;

/// A transport-level failure talking to a store's backing storage or
/// upstream. Always inconclusive: the path may or may not exist, so these
/// never populate the not-found cache and never abort a multi-candidate
/// walk.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("upstream error for {store} {path}: {reason}")]
    Upstream {
        store: StoreKey,
        path: String,
        reason: String,
    },

    #[error("storage error for {store} {path}: {reason}")]
    Storage {
        store: StoreKey,
        path: String,
        reason: String,
    },

    #[error("store {0} is read-only")]
    ReadOnly(StoreKey),

    #[error("upstream call to {store} for {path} timed out")]
    TimedOut { store: StoreKey, path: String },
}

/// One entry in a directory listing.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListEntry {
    /// Entry name relative to the listed path.
    pub name: String,
    /// Whether the entry is itself listable.
    pub directory: bool,
}

impl ListEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directory: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directory: true,
        }
    }
}

/// The byte-transfer collaborator: the only party that actually moves
/// content. Implemented outside the core (HTTP client, disk store, ...).
///
/// A clean `false` / `None` / empty listing is a *confirmed miss* and is
/// eligible for negative caching; a [`TransferError`] is not.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Whether the store has content at the path.
    async fn exists(&self, store: &StoreKey, path: &str) -> Result<bool, TransferError>;

    /// The content at the path, or `None` for a confirmed miss.
    async fn fetch(&self, store: &StoreKey, path: &str) -> Result<Option<Vec<u8>>, TransferError>;

    /// Directory listing at the path. Empty means confirmed absent.
    async fn list(&self, store: &StoreKey, path: &str) -> Result<Vec<ListEntry>, TransferError>;

    /// Write content at the path.
    async fn put(&self, store: &StoreKey, path: &str, bytes: Vec<u8>) -> Result<(), TransferError>;

    /// Delete content at the path. Returns `true` if something was there.
    async fn delete(&self, store: &StoreKey, path: &str) -> Result<bool, TransferError>;
}
