//! In-memory registry with copy-on-write snapshots.
//!
//! [`MemoryStoreRegistry`] keeps the full definition map in an `Arc` behind
//! a `RwLock`. Writers build the next map and swap it in; readers clone the
//! `Arc` and continue lock-free on the old snapshot. The affected-by index
//! is updated under the same write guard, so membership queries can never
//! run ahead of (or behind) the definitions they derive from.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use depot_graph::{members_of, would_cycle, AffectedByIndex};
use depot_model::{ArtifactStore, StoreKey, StoreType};

use crate::error::{RegistryError, RegistryResult};
use crate::event::{EventSink, StoreEvent};
use crate::traits::StoreRegistry;

type Snapshot = Arc<HashMap<StoreKey, ArtifactStore>>;

struct Inner {
    stores: Snapshot,
    index: AffectedByIndex,
}

/// An in-memory [`StoreRegistry`].
///
/// Persistence is the embedder's concern: the snapshot is serde-
/// serializable, so it can be flushed and reloaded in whatever format the
/// surrounding system uses.
pub struct MemoryStoreRegistry {
    inner: RwLock<Inner>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl MemoryStoreRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                stores: Arc::new(HashMap::new()),
                index: AffectedByIndex::new(),
            }),
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// Load a registry from previously-persisted definitions.
    ///
    /// Definitions are applied as a batch without validation; the index is
    /// rebuilt from the result. Callers own the integrity of persisted
    /// state.
    pub fn with_stores(stores: impl IntoIterator<Item = ArtifactStore>) -> Self {
        let map: HashMap<StoreKey, ArtifactStore> = stores
            .into_iter()
            .map(|s| (s.key().clone(), s))
            .collect();
        let index = AffectedByIndex::rebuild(&map);
        Self {
            inner: RwLock::new(Inner {
                stores: Arc::new(map),
                index,
            }),
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// Register an event sink. Sinks receive every subsequent change,
    /// synchronously, in commit order.
    pub fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().expect("sink lock poisoned").push(sink);
    }

    fn publish(&self, events: &[StoreEvent]) {
        let sinks = self.sinks.read().expect("sink lock poisoned");
        for event in events {
            debug!(%event, "publishing store event");
            for sink in sinks.iter() {
                sink.on_event(event);
            }
        }
    }

    /// Validate a group definition against the map it would join.
    fn validate_group(
        next: &HashMap<StoreKey, ArtifactStore>,
        store: &ArtifactStore,
    ) -> RegistryResult<()> {
        let ArtifactStore::Group(group) = store else {
            return Ok(());
        };
        let key = &group.meta.key;

        for constituent in &group.constituents {
            if constituent.package_type != key.package_type {
                return Err(RegistryError::PackageTypeMismatch {
                    group: key.clone(),
                    group_package: key.package_type.clone(),
                    constituent: constituent.clone(),
                });
            }
            if constituent != key && !next.contains_key(constituent) {
                return Err(RegistryError::MissingConstituent {
                    group: key.clone(),
                    constituent: constituent.clone(),
                });
            }
        }

        if let Some(via) = would_cycle(next, key, &group.constituents) {
            return Err(RegistryError::MembershipCycle {
                group: key.clone(),
                via,
            });
        }
        Ok(())
    }

    fn store_write(&self, store: ArtifactStore, expect_existing: bool) -> RegistryResult<StoreEvent> {
        let key = store.key().clone();
        let mut inner = self.inner.write().expect("registry lock poisoned");

        let exists = inner.stores.contains_key(&key);
        if expect_existing && !exists {
            return Err(RegistryError::NoSuchStore(key));
        }
        if !expect_existing && exists {
            return Err(RegistryError::DuplicateStore(key));
        }

        let mut next: HashMap<StoreKey, ArtifactStore> = (*inner.stores).clone();
        next.insert(key.clone(), store.clone());
        Self::validate_group(&next, &store)?;

        if let ArtifactStore::Group(g) = &store {
            inner.index.set_group(key.clone(), g.constituents.clone());
        }
        inner.stores = Arc::new(next);

        let event = if exists {
            StoreEvent::Updated(key)
        } else {
            StoreEvent::Created(key)
        };
        info!(%event, "store definition written");
        Ok(event)
    }
}

impl Default for MemoryStoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreRegistry for MemoryStoreRegistry {
    fn create(&self, store: ArtifactStore) -> RegistryResult<StoreKey> {
        let key = store.key().clone();
        let event = self.store_write(store, false)?;
        self.publish(&[event]);
        Ok(key)
    }

    fn update(&self, store: ArtifactStore) -> RegistryResult<()> {
        let event = self.store_write(store, true)?;
        self.publish(&[event]);
        Ok(())
    }

    fn delete(&self, key: &StoreKey, cascade: bool) -> RegistryResult<bool> {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.write().expect("registry lock poisoned");
            if !inner.stores.contains_key(key) {
                return Ok(false);
            }

            let referents: Vec<StoreKey> = inner.index.direct_parents(key).into_iter().collect();
            if !referents.is_empty() {
                if !cascade {
                    return Err(RegistryError::StillReferenced {
                        key: key.clone(),
                        referents,
                    });
                }

                // Rewrite every referencing group without the doomed key.
                // Constituent removal cannot introduce a cycle or a package
                // mismatch, so these rewrites always validate.
                let mut next: HashMap<StoreKey, ArtifactStore> = (*inner.stores).clone();
                let mut rewritten = Vec::with_capacity(referents.len());
                for group_key in &referents {
                    if let Some(ArtifactStore::Group(group)) = next.get_mut(group_key) {
                        group.remove_constituent(key);
                        rewritten.push((group_key.clone(), group.constituents.clone()));
                    }
                }
                next.remove(key);
                inner.stores = Arc::new(next);
                for (group_key, constituents) in rewritten {
                    inner.index.set_group(group_key.clone(), constituents);
                    events.push(StoreEvent::Updated(group_key));
                }
                inner.index.remove_group(key);
            } else {
                let mut next: HashMap<StoreKey, ArtifactStore> = (*inner.stores).clone();
                next.remove(key);
                inner.index.remove_group(key);
                inner.stores = Arc::new(next);
            }
        }
        events.push(StoreEvent::Deleted(key.clone()));
        info!(store = %key, cascade, "store deleted");
        self.publish(&events);
        Ok(true)
    }

    fn get(&self, key: &StoreKey) -> Option<ArtifactStore> {
        self.snapshot().get(key).cloned()
    }

    fn list(&self, package_type: &str, store_type: Option<StoreType>) -> Vec<ArtifactStore> {
        let snapshot = self.snapshot();
        let mut out: Vec<ArtifactStore> = snapshot
            .values()
            .filter(|s| s.key().package_type == package_type)
            .filter(|s| store_type.map_or(true, |t| s.store_type() == t))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.key().cmp(b.key()));
        out
    }

    fn snapshot(&self) -> Snapshot {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .stores
            .clone()
    }

    fn members_of(&self, key: &StoreKey) -> Vec<StoreKey> {
        members_of(&self.snapshot(), key)
    }

    fn groups_affected_by(&self, key: &StoreKey) -> BTreeSet<StoreKey> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .index
            .affected_by(key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use depot_model::{GroupStore, HostedStore, RemoteStore};

    fn hosted(name: &str) -> ArtifactStore {
        HostedStore::new(StoreKey::hosted("maven", name)).into()
    }

    fn remote(name: &str) -> ArtifactStore {
        RemoteStore::new(StoreKey::remote("maven", name), "https://upstream/").into()
    }

    fn group(name: &str, members: &[StoreKey]) -> ArtifactStore {
        GroupStore::new(StoreKey::group("maven", name), members.to_vec()).into()
    }

    #[test]
    fn create_and_get() {
        let registry = MemoryStoreRegistry::new();
        let key = registry.create(hosted("builds")).unwrap();
        assert_eq!(key, StoreKey::hosted("maven", "builds"));
        assert!(registry.get(&key).is_some());
        assert!(registry.get(&StoreKey::hosted("maven", "nope")).is_none());
    }

    #[test]
    fn create_duplicate_rejected() {
        let registry = MemoryStoreRegistry::new();
        registry.create(hosted("builds")).unwrap();
        let err = registry.create(hosted("builds")).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateStore(_)));
        assert!(err.is_validation());
    }

    #[test]
    fn update_missing_rejected() {
        let registry = MemoryStoreRegistry::new();
        let err = registry.update(hosted("ghost")).unwrap_err();
        assert!(matches!(err, RegistryError::NoSuchStore(_)));
    }

    #[test]
    fn group_with_dangling_constituent_rejected() {
        let registry = MemoryStoreRegistry::new();
        let err = registry
            .create(group("g", &[StoreKey::hosted("maven", "missing")]))
            .unwrap_err();
        assert!(matches!(err, RegistryError::MissingConstituent { .. }));
        // Rejected writes leave no trace.
        assert!(registry.get(&StoreKey::group("maven", "g")).is_none());
    }

    #[test]
    fn group_with_mixed_package_types_rejected() {
        let registry = MemoryStoreRegistry::new();
        registry
            .create(HostedStore::new(StoreKey::hosted("npm", "js")).into())
            .unwrap();
        let err = registry
            .create(group("g", &[StoreKey::hosted("npm", "js")]))
            .unwrap_err();
        assert!(matches!(err, RegistryError::PackageTypeMismatch { .. }));
    }

    #[test]
    fn cycle_introducing_write_rejected() {
        let registry = MemoryStoreRegistry::new();
        registry.create(hosted("a")).unwrap();
        registry
            .create(group("g1", &[StoreKey::hosted("maven", "a")]))
            .unwrap();
        registry
            .create(group("g2", &[StoreKey::group("maven", "g1")]))
            .unwrap();

        // g1 -> [a, g2] would close g1 -> g2 -> g1.
        let err = registry
            .update(group(
                "g1",
                &[StoreKey::hosted("maven", "a"), StoreKey::group("maven", "g2")],
            ))
            .unwrap_err();
        assert!(matches!(err, RegistryError::MembershipCycle { .. }));

        // Original definition untouched.
        let g1 = registry.get(&StoreKey::group("maven", "g1")).unwrap();
        assert_eq!(g1.constituents(), &[StoreKey::hosted("maven", "a")]);
    }

    #[test]
    fn self_cycle_rejected() {
        let registry = MemoryStoreRegistry::new();
        let err = registry
            .create(group("g", &[StoreKey::group("maven", "g")]))
            .unwrap_err();
        assert!(matches!(err, RegistryError::MembershipCycle { .. }));
    }

    #[test]
    fn delete_referenced_conflicts_without_cascade() {
        let registry = MemoryStoreRegistry::new();
        registry.create(hosted("a")).unwrap();
        registry
            .create(group("g", &[StoreKey::hosted("maven", "a")]))
            .unwrap();

        let err = registry
            .delete(&StoreKey::hosted("maven", "a"), false)
            .unwrap_err();
        assert!(matches!(err, RegistryError::StillReferenced { .. }));
        assert!(!err.is_validation());
        assert!(registry.get(&StoreKey::hosted("maven", "a")).is_some());
    }

    #[test]
    fn cascade_delete_rewrites_groups() {
        let registry = MemoryStoreRegistry::new();
        registry.create(hosted("a")).unwrap();
        registry.create(remote("b")).unwrap();
        registry
            .create(group(
                "g",
                &[StoreKey::hosted("maven", "a"), StoreKey::remote("maven", "b")],
            ))
            .unwrap();

        assert!(registry.delete(&StoreKey::hosted("maven", "a"), true).unwrap());
        assert!(registry.get(&StoreKey::hosted("maven", "a")).is_none());
        let g = registry.get(&StoreKey::group("maven", "g")).unwrap();
        assert_eq!(g.constituents(), &[StoreKey::remote("maven", "b")]);
        assert!(registry
            .groups_affected_by(&StoreKey::hosted("maven", "a"))
            .is_empty());
    }

    #[test]
    fn delete_missing_returns_false() {
        let registry = MemoryStoreRegistry::new();
        assert!(!registry.delete(&StoreKey::hosted("maven", "ghost"), false).unwrap());
    }

    #[test]
    fn list_is_sorted_and_filtered() {
        let registry = MemoryStoreRegistry::new();
        registry.create(hosted("b")).unwrap();
        registry.create(hosted("a")).unwrap();
        registry.create(remote("r")).unwrap();
        registry
            .create(HostedStore::new(StoreKey::hosted("npm", "js")).into())
            .unwrap();

        let maven = registry.list("maven", None);
        let names: Vec<&str> = maven.iter().map(|s| s.key().name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "r"]);

        let hosted_only = registry.list("maven", Some(StoreType::Hosted));
        assert_eq!(hosted_only.len(), 2);
    }

    #[test]
    fn events_published_in_commit_order() {
        let registry = MemoryStoreRegistry::new();
        let seen: Arc<Mutex<Vec<StoreEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        registry.subscribe(Arc::new(move |e: &StoreEvent| {
            sink.lock().unwrap().push(e.clone());
        }));

        registry.create(hosted("a")).unwrap();
        registry
            .create(group("g", &[StoreKey::hosted("maven", "a")]))
            .unwrap();
        registry.delete(&StoreKey::hosted("maven", "a"), true).unwrap();

        let events = seen.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                StoreEvent::Created(StoreKey::hosted("maven", "a")),
                StoreEvent::Created(StoreKey::group("maven", "g")),
                StoreEvent::Updated(StoreKey::group("maven", "g")),
                StoreEvent::Deleted(StoreKey::hosted("maven", "a")),
            ]
        );
    }

    #[test]
    fn rejected_writes_publish_nothing() {
        let registry = MemoryStoreRegistry::new();
        let count = Arc::new(Mutex::new(0usize));
        let sink = count.clone();
        registry.subscribe(Arc::new(move |_: &StoreEvent| {
            *sink.lock().unwrap() += 1;
        }));

        let _ = registry.create(group("g", &[StoreKey::hosted("maven", "missing")]));
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let registry = MemoryStoreRegistry::new();
        registry.create(hosted("a")).unwrap();

        let snapshot = registry.snapshot();
        registry.create(hosted("b")).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn membership_queries_follow_writes() {
        let registry = MemoryStoreRegistry::new();
        registry.create(hosted("a")).unwrap();
        registry.create(remote("b")).unwrap();
        registry
            .create(group(
                "g",
                &[StoreKey::remote("maven", "b"), StoreKey::hosted("maven", "a")],
            ))
            .unwrap();

        assert_eq!(
            registry.members_of(&StoreKey::group("maven", "g")),
            vec![StoreKey::remote("maven", "b"), StoreKey::hosted("maven", "a")]
        );
        assert_eq!(
            registry.groups_affected_by(&StoreKey::hosted("maven", "a")),
            [StoreKey::group("maven", "g")].into()
        );

        // Removing `b` from the group is visible immediately.
        registry
            .update(group("g", &[StoreKey::hosted("maven", "a")]))
            .unwrap();
        assert_eq!(
            registry.members_of(&StoreKey::group("maven", "g")),
            vec![StoreKey::hosted("maven", "a")]
        );
        assert!(registry
            .groups_affected_by(&StoreKey::remote("maven", "b"))
            .is_empty());
    }

    #[test]
    fn with_stores_rebuilds_index() {
        let registry = MemoryStoreRegistry::with_stores(vec![
            hosted("a"),
            group("g", &[StoreKey::hosted("maven", "a")]),
        ]);
        assert_eq!(
            registry.groups_affected_by(&StoreKey::hosted("maven", "a")),
            [StoreKey::group("maven", "g")].into()
        );
    }
}
