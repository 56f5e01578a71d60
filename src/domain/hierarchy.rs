use crate::domain::node::NodeId;
use crate::domain::property::Properties;
use crate::domain::view::ViewState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Ancestor chain of one node, nearest ancestor first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyEntry {
    #[serde(default)]
    pub ancestors: Vec<NodeId>,
    #[serde(default)]
    pub properties: Properties,
}

impl HierarchyEntry {
    pub fn new(ancestors: impl IntoIterator<Item = impl Into<NodeId>>) -> Self {
        Self {
            ancestors: ancestors.into_iter().map(Into::into).collect(),
            properties: Properties::new(),
        }
    }
}

/// Session-wide cache of ancestor chains for nodes that may not be in view.
///
/// Append-only: a chain is recorded once and never replaced, since ancestry
/// in the source graph does not change. Cloning shares the cache, so the
/// playback prefetcher and the projection read the same entries.
#[derive(Debug, Clone, Default)]
pub struct HierarchyIndex {
    inner: Arc<RwLock<HashMap<NodeId, HierarchyEntry>>>,
}

impl HierarchyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read(|m| m.contains_key(id))
    }

    pub fn ancestors(&self, id: &str) -> Option<Vec<NodeId>> {
        self.read(|m| m.get(id).map(|e| e.ancestors.clone()))
    }

    pub fn len(&self) -> usize {
        self.read(HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids among `ids` without an entry, deduplicated, first occurrence order.
    pub fn missing<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Vec<NodeId> {
        self.read(|m| {
            let mut out: Vec<NodeId> = Vec::new();
            for id in ids {
                if !m.contains_key(id) && !out.iter().any(|o| o == id) {
                    out.push(id.to_string());
                }
            }
            out
        })
    }

    /// Merge a batch response. Existing entries win. Returns how many ids were
    /// newly recorded.
    pub fn merge(&self, entries: HashMap<NodeId, HierarchyEntry>) -> usize {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = map.len();
        for (id, entry) in entries {
            map.entry(id).or_insert(entry);
        }
        map.len() - before
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<NodeId, HierarchyEntry>) -> T) -> T {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&map)
    }
}

/// Nearest id that is actually shown for `target_id`: the id itself when it is
/// in view, otherwise the first visible entry of its cached ancestor chain.
/// `None` when nothing in the chain is visible or no chain is cached yet.
pub fn resolve_visible(target_id: &str, view: &ViewState, index: &HierarchyIndex) -> Option<NodeId> {
    if view.contains(target_id) {
        return Some(target_id.to_string());
    }
    index.read(|m| {
        m.get(target_id)?
            .ancestors
            .iter()
            .find(|a| view.contains(a))
            .cloned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::Subgraph;
    use crate::domain::node::GraphNode;

    fn view() -> ViewState {
        ViewState::from_roots(Subgraph::new(
            vec![GraphNode::new("root"), GraphNode::new("F").with_parent("root")],
            vec![],
        ))
    }

    #[test]
    fn hidden_target_resolves_to_nearest_visible_ancestor() {
        let index = HierarchyIndex::new();
        index.merge(HashMap::from([("X".to_string(), HierarchyEntry::new(["F", "root"]))]));
        assert_eq!(resolve_visible("X", &view(), &index).as_deref(), Some("F"));
    }

    #[test]
    fn visible_target_resolves_to_itself_without_lookup() {
        let index = HierarchyIndex::new();
        assert_eq!(resolve_visible("F", &view(), &index).as_deref(), Some("F"));
    }

    #[test]
    fn unknown_or_fully_hidden_chain_is_unresolvable() {
        let index = HierarchyIndex::new();
        index.merge(HashMap::from([("Y".to_string(), HierarchyEntry::new(["Q", "P"]))]));
        assert_eq!(resolve_visible("Y", &view(), &index), None);
        assert_eq!(resolve_visible("never-fetched", &view(), &index), None);
    }

    #[test]
    fn merge_is_append_only_and_idempotent() {
        let index = HierarchyIndex::new();
        let added = index.merge(HashMap::from([("X".to_string(), HierarchyEntry::new(["F"]))]));
        assert_eq!(added, 1);
        let added = index.merge(HashMap::from([
            ("X".to_string(), HierarchyEntry::new(["other"])),
            ("W".to_string(), HierarchyEntry::new(["F"])),
        ]));
        assert_eq!(added, 1);
        assert_eq!(index.ancestors("X"), Some(vec!["F".to_string()]));

        let shared = index.clone();
        assert_eq!(shared.len(), 2);
    }

    #[test]
    fn missing_dedups_in_order() {
        let index = HierarchyIndex::new();
        index.merge(HashMap::from([("b".to_string(), HierarchyEntry::default())]));
        assert_eq!(index.missing(["c", "b", "a", "c"]), vec!["c".to_string(), "a".to_string()]);
    }
}
