use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use depot_model::{ArtifactStore, StoreKey, StoreType};

use crate::error::RegistryResult;

/// The store registry: durable mapping of store identity to definition.
///
/// Implementations must satisfy:
/// - Writes are validated in full before any state change; a rejected
///   write leaves the registry exactly as it was.
/// - The affected-by index is recomputed inside the same write that
///   changes a group, never lagging the definitions.
/// - Readers obtain immutable snapshots; a concurrent write never exposes
///   a half-applied group membership list.
pub trait StoreRegistry: Send + Sync {
    /// Define a new store. Fails if the key already exists or a group
    /// definition is invalid (cycle, dangling constituent, package mix).
    fn create(&self, store: ArtifactStore) -> RegistryResult<StoreKey>;

    /// Replace an existing store's definition. The key itself is
    /// immutable: updating a key that does not exist is an error.
    fn update(&self, store: ArtifactStore) -> RegistryResult<()>;

    /// Remove a store. Returns `false` if the key did not exist.
    ///
    /// Without `cascade`, deleting a store still listed by a live group is
    /// a conflict. With `cascade`, the key is first removed from every
    /// referencing group (each rewrite validated and published) and then
    /// deleted.
    fn delete(&self, key: &StoreKey, cascade: bool) -> RegistryResult<bool>;

    /// Look up a single store definition.
    fn get(&self, key: &StoreKey) -> Option<ArtifactStore>;

    /// All stores of a package type, optionally narrowed by store type,
    /// ordered by key. Disabled stores are included: disablement affects
    /// resolution, not registry queries.
    fn list(&self, package_type: &str, store_type: Option<StoreType>) -> Vec<ArtifactStore>;

    /// The current immutable definition snapshot.
    fn snapshot(&self) -> Arc<HashMap<StoreKey, ArtifactStore>>;

    /// Ordered, flattened, de-duplicated resolution list for `key`.
    fn members_of(&self, key: &StoreKey) -> Vec<StoreKey>;

    /// All groups whose resolution could traverse `key`, transitively.
    fn groups_affected_by(&self, key: &StoreKey) -> BTreeSet<StoreKey>;
}
