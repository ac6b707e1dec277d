use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::{StoreKey, StoreType};

/// Attributes shared by every store variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMeta {
    /// The store's identity. Immutable once the store is created.
    pub key: StoreKey,
    /// Disabled stores are never consulted during resolution.
    pub disabled: bool,
    /// Free-form description.
    pub description: String,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last-modification timestamp.
    pub modified: DateTime<Utc>,
    /// Who last changed this definition.
    pub modified_by: String,
}

impl StoreMeta {
    /// Fresh metadata for a newly-defined store.
    pub fn new(key: StoreKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            disabled: false,
            description: String::new(),
            created: now,
            modified: now,
            modified_by: String::new(),
        }
    }

    /// Stamp a modification by the given actor.
    pub fn touch(&mut self, actor: &str) {
        self.modified = Utc::now();
        self.modified_by = actor.to_string();
    }
}

/// A hosted store: writable, locally-originated content, no upstream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedStore {
    pub meta: StoreMeta,
    /// Whether release-versioned content may be deployed here.
    pub allow_releases: bool,
    /// Whether snapshot-versioned content may be deployed here.
    pub allow_snapshots: bool,
    /// Frozen stores reject all writes, including promotion copies.
    pub readonly: bool,
}

impl HostedStore {
    pub fn new(key: StoreKey) -> Self {
        Self {
            meta: StoreMeta::new(key),
            allow_releases: true,
            allow_snapshots: false,
            readonly: false,
        }
    }
}

/// A remote store: read-through proxy over an upstream URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStore {
    pub meta: StoreMeta,
    /// Upstream base URL.
    pub url: String,
    /// Per-request upstream timeout, seconds. `None` means the engine default.
    pub timeout_secs: Option<u64>,
    /// Not-found-cache TTL override, seconds. `None` means the configured
    /// default; zero disables negative caching for this store.
    pub nfc_timeout_secs: Option<i64>,
    /// Passthrough stores bypass the local cache entirely.
    pub passthrough: bool,
    /// Upstream credentials, opaque to the core.
    pub user: Option<String>,
    pub password: Option<String>,
}

impl RemoteStore {
    pub fn new(key: StoreKey, url: impl Into<String>) -> Self {
        Self {
            meta: StoreMeta::new(key),
            url: url.into(),
            timeout_secs: None,
            nfc_timeout_secs: None,
            passthrough: false,
            user: None,
            password: None,
        }
    }
}

/// A group store: an ordered sequence of constituent store keys.
///
/// Order is resolution priority; the first-listed constituent is consulted
/// first. A group holds no content of its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStore {
    pub meta: StoreMeta,
    pub constituents: Vec<StoreKey>,
}

impl GroupStore {
    pub fn new(key: StoreKey, constituents: Vec<StoreKey>) -> Self {
        Self {
            meta: StoreMeta::new(key),
            constituents,
        }
    }

    /// Insert a constituent at highest priority, if not already a member.
    pub fn prepend_constituent(&mut self, key: StoreKey) -> bool {
        if self.constituents.contains(&key) {
            return false;
        }
        self.constituents.insert(0, key);
        true
    }

    /// Append a constituent at lowest priority, if not already a member.
    pub fn append_constituent(&mut self, key: StoreKey) -> bool {
        if self.constituents.contains(&key) {
            return false;
        }
        self.constituents.push(key);
        true
    }

    /// Remove a constituent. Returns `true` if it was a member.
    pub fn remove_constituent(&mut self, key: &StoreKey) -> bool {
        let before = self.constituents.len();
        self.constituents.retain(|c| c != key);
        self.constituents.len() != before
    }
}

/// A store definition: one of the three variants, matched exhaustively at
/// resolution and validation sites.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ArtifactStore {
    Hosted(HostedStore),
    Remote(RemoteStore),
    Group(GroupStore),
}

impl ArtifactStore {
    /// The shared metadata of any variant.
    pub fn meta(&self) -> &StoreMeta {
        match self {
            Self::Hosted(s) => &s.meta,
            Self::Remote(s) => &s.meta,
            Self::Group(s) => &s.meta,
        }
    }

    /// Mutable access to the shared metadata.
    pub fn meta_mut(&mut self) -> &mut StoreMeta {
        match self {
            Self::Hosted(s) => &mut s.meta,
            Self::Remote(s) => &mut s.meta,
            Self::Group(s) => &mut s.meta,
        }
    }

    /// The store's identity key.
    pub fn key(&self) -> &StoreKey {
        &self.meta().key
    }

    /// Whether this store is disabled.
    pub fn is_disabled(&self) -> bool {
        self.meta().disabled
    }

    /// The store type of this definition.
    pub fn store_type(&self) -> StoreType {
        match self {
            Self::Hosted(_) => StoreType::Hosted,
            Self::Remote(_) => StoreType::Remote,
            Self::Group(_) => StoreType::Group,
        }
    }

    /// Constituent list, for groups; empty for concrete stores.
    pub fn constituents(&self) -> &[StoreKey] {
        match self {
            Self::Group(g) => &g.constituents,
            _ => &[],
        }
    }

    /// Whether content may currently be written to this store.
    ///
    /// Only enabled, non-readonly hosted stores accept writes.
    pub fn is_writable(&self) -> bool {
        match self {
            Self::Hosted(h) => !h.meta.disabled && !h.readonly,
            _ => false,
        }
    }
}

impl From<HostedStore> for ArtifactStore {
    fn from(s: HostedStore) -> Self {
        Self::Hosted(s)
    }
}

impl From<RemoteStore> for ArtifactStore {
    fn from(s: RemoteStore) -> Self {
        Self::Remote(s)
    }
}

impl From<GroupStore> for ArtifactStore {
    fn from(s: GroupStore) -> Self {
        Self::Group(s)
    }
}
