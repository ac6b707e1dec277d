use std::collections::{HashMap, HashSet};

use tracing::warn;

use depot_model::{ArtifactStore, StoreKey};

/// The ordered, flattened, de-duplicated resolution list for `key`.
///
/// Concrete (hosted/remote) stores are appended in first-seen order; a key
/// already emitted is never re-emitted, so the first occurrence keeps its
/// highest-priority position. Disabled stores are excluded: a disabled
/// member never receives traffic, and a disabled group expands to nothing.
///
/// A group already on the current expansion path is skipped rather than
/// followed. The registry rejects cycle-introducing writes, so hitting this
/// guard means the snapshot predates that validation; it is logged and
/// tolerated.
///
/// A concrete `key` expands to itself (if present and enabled), so callers
/// can treat every resolution target uniformly.
pub fn members_of(snapshot: &HashMap<StoreKey, ArtifactStore>, key: &StoreKey) -> Vec<StoreKey> {
    let mut emitted = HashSet::new();
    let mut out = Vec::new();
    let mut on_path = HashSet::new();
    expand(snapshot, key, &mut on_path, &mut emitted, &mut out);
    out
}

fn expand(
    snapshot: &HashMap<StoreKey, ArtifactStore>,
    key: &StoreKey,
    on_path: &mut HashSet<StoreKey>,
    emitted: &mut HashSet<StoreKey>,
    out: &mut Vec<StoreKey>,
) {
    let Some(store) = snapshot.get(key) else {
        return;
    };
    if store.is_disabled() {
        return;
    }

    match store {
        ArtifactStore::Group(group) => {
            if !on_path.insert(key.clone()) {
                warn!(group = %key, "membership cycle encountered during expansion, skipping");
                return;
            }
            for constituent in &group.constituents {
                expand(snapshot, constituent, on_path, emitted, out);
            }
            on_path.remove(key);
        }
        _ => {
            if emitted.insert(key.clone()) {
                out.push(key.clone());
            }
        }
    }
}

/// Check whether redefining `group` with `constituents` would let any
/// expansion path lead back to `group` itself.
///
/// Returns the first constituent key through which the cycle closes, or
/// `None` if the definition is acyclic. The proposed constituent list is
/// used in place of whatever the snapshot currently records for `group`.
pub fn would_cycle(
    snapshot: &HashMap<StoreKey, ArtifactStore>,
    group: &StoreKey,
    constituents: &[StoreKey],
) -> Option<StoreKey> {
    for constituent in constituents {
        if reaches(snapshot, constituent, group, &mut HashSet::new()) {
            return Some(constituent.clone());
        }
    }
    None
}

fn reaches(
    snapshot: &HashMap<StoreKey, ArtifactStore>,
    from: &StoreKey,
    target: &StoreKey,
    visited: &mut HashSet<StoreKey>,
) -> bool {
    if from == target {
        return true;
    }
    if !visited.insert(from.clone()) {
        return false;
    }
    match snapshot.get(from) {
        Some(ArtifactStore::Group(g)) => g
            .constituents
            .iter()
            .any(|c| reaches(snapshot, c, target, visited)),
        _ => false,
    }
}
