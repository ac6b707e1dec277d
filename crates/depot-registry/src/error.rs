use depot_model::StoreKey;
use thiserror::Error;

/// Errors produced by registry operations.
///
/// The first group of variants are validation failures: the write is
/// rejected before any state change. `StillReferenced` is the one conflict
/// failure, raised by a non-cascade delete of a store some live group still
/// lists.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("store already exists: {0}")]
    DuplicateStore(StoreKey),

    #[error("no such store: {0}")]
    NoSuchStore(StoreKey),

    #[error("group {group} would contain itself via {via}")]
    MembershipCycle { group: StoreKey, via: StoreKey },

    #[error("group {group} references missing store {constituent}")]
    MissingConstituent {
        group: StoreKey,
        constituent: StoreKey,
    },

    #[error("group {group} ({group_package}) cannot contain {constituent}: package types differ")]
    PackageTypeMismatch {
        group: StoreKey,
        group_package: String,
        constituent: StoreKey,
    },

    #[error("store {key} is still referenced by groups: {}", referents.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", "))]
    StillReferenced {
        key: StoreKey,
        referents: Vec<StoreKey>,
    },
}

impl RegistryError {
    /// Whether this is a write-validation failure (as opposed to a
    /// delete conflict).
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::StillReferenced { .. })
    }
}

/// Convenience alias for registry results.
pub type RegistryResult<T> = Result<T, RegistryError>;
