use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use tracing::debug;

use depot_model::{ArtifactStore, StoreKey};

/// Reverse membership index: store -> the groups that directly list it.
///
/// Direct containment edges are maintained incrementally as group
/// definitions change; [`Self::affected_by`] walks them transitively, so a
/// group containing another group is affected by everything affecting the
/// inner one. The registry updates this index inside the same write that
/// changes a group, keeping reads coherent with store definitions.
#[derive(Clone, Debug, Default)]
pub struct AffectedByIndex {
    /// constituent -> groups that list it directly.
    direct: HashMap<StoreKey, BTreeSet<StoreKey>>,
    /// group -> its current constituent list, for edge removal on update.
    constituents: HashMap<StoreKey, Vec<StoreKey>>,
}

impl AffectedByIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from a full store snapshot.
    pub fn rebuild(snapshot: &HashMap<StoreKey, ArtifactStore>) -> Self {
        let mut index = Self::new();
        for store in snapshot.values() {
            if let ArtifactStore::Group(g) = store {
                index.set_group(g.meta.key.clone(), g.constituents.clone());
            }
        }
        index
    }

    /// Record (or replace) the constituent list of a group.
    pub fn set_group(&mut self, group: StoreKey, constituents: Vec<StoreKey>) {
        self.unlink(&group);
        for constituent in &constituents {
            self.direct
                .entry(constituent.clone())
                .or_default()
                .insert(group.clone());
        }
        debug!(group = %group, members = constituents.len(), "affected-by index updated");
        self.constituents.insert(group, constituents);
    }

    /// Drop a group's edges entirely (group deleted).
    pub fn remove_group(&mut self, group: &StoreKey) {
        self.unlink(group);
        self.constituents.remove(group);
    }

    fn unlink(&mut self, group: &StoreKey) {
        if let Some(old) = self.constituents.get(group) {
            for constituent in old {
                if let Some(parents) = self.direct.get_mut(constituent) {
                    parents.remove(group);
                    if parents.is_empty() {
                        self.direct.remove(constituent);
                    }
                }
            }
        }
    }

    /// Groups that list `key` directly.
    pub fn direct_parents(&self, key: &StoreKey) -> BTreeSet<StoreKey> {
        self.direct.get(key).cloned().unwrap_or_default()
    }

    /// All groups whose expansion could traverse `key`, transitively.
    pub fn affected_by(&self, key: &StoreKey) -> BTreeSet<StoreKey> {
        let mut result = BTreeSet::new();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&StoreKey> = VecDeque::new();
        queue.push_back(key);
        seen.insert(key.clone());

        while let Some(current) = queue.pop_front() {
            if let Some(parents) = self.direct.get(current) {
                for parent in parents {
                    if seen.insert(parent.clone()) {
                        result.insert(parent.clone());
                        queue.push_back(parent);
                    }
                }
            }
        }
        result
    }
}
