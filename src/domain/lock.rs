use crate::domain::descendants::closure_of;
use crate::domain::node::NodeId;
use crate::domain::view::ViewState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// User-pinned focus roots. Only the roots are stored; the descendant closure
/// is derived against whatever view it is applied to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedScope {
    roots: BTreeSet<NodeId>,
}

impl LockedScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_roots(roots: impl IntoIterator<Item = impl Into<NodeId>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// Lock `id` if it is unlocked, unlock it otherwise. Returns whether it is
    /// locked afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.roots.remove(id) {
            false
        } else {
            self.roots.insert(id.to_string());
            true
        }
    }

    pub fn clear(&mut self) {
        self.roots.clear();
    }

    /// Drop roots rejected by `keep`. Returns how many were dropped.
    pub fn retain(&mut self, keep: impl Fn(&str) -> bool) -> usize {
        let before = self.roots.len();
        self.roots.retain(|id| keep(id));
        before - self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn roots(&self) -> &BTreeSet<NodeId> {
        &self.roots
    }
}

/// Restrict `view` to the locked roots and their descendants.
///
/// Identity for an empty scope. Otherwise keeps the nodes inside the scope and
/// the edges (real or synthesized) with both endpoints inside it. The input
/// is never modified, so unlocking restores everything without refetching.
pub fn apply_lock(view: &ViewState, locked: &LockedScope) -> ViewState {
    if locked.is_empty() {
        return view.clone();
    }
    let scope = closure_of(locked.roots(), view);
    view.filtered(|id| scope.contains(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::edge::{AggregatedEdge, GraphEdge, label};
    use crate::domain::graph::Subgraph;
    use crate::domain::node::GraphNode;
    use std::collections::BTreeMap;

    fn view() -> ViewState {
        let view = ViewState::from_roots(Subgraph::new(
            vec![GraphNode::new("P"), GraphNode::new("Q"), GraphNode::new("R")],
            vec![GraphEdge::new("e_pr", "P", "R", label::USES)],
        ));
        let (view, _) = view
            .with_expansion(
                "P",
                Subgraph::new(vec![GraphNode::new("p1").with_parent("P")], vec![]),
            )
            .unwrap();
        let (view, _) = view
            .with_expansion(
                "Q",
                Subgraph::new(
                    vec![GraphNode::new("q1").with_parent("Q")],
                    vec![GraphEdge::new("e_q1p1", "q1", "p1", label::INVOKES)],
                ),
            )
            .unwrap();
        view.with_aggregates(vec![AggregatedEdge::summarize(
            "q1",
            "R",
            label::AGGREGATED,
            BTreeMap::from([("invokes".to_string(), 2)]),
        )])
    }

    #[test]
    fn empty_lock_is_identity() {
        let v = view();
        assert!(apply_lock(&v, &LockedScope::new()).same_content(&v));
    }

    #[test]
    fn two_disjoint_roots_keep_their_union_only() {
        let v = view();
        let locked = apply_lock(&v, &LockedScope::from_roots(["P", "Q"]));

        let ids: BTreeSet<&str> = locked.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, BTreeSet::from(["P", "Q", "p1", "q1"]));
        // q1 -> p1 lies wholly inside; P -> R and q1 -> R cross the boundary.
        assert_eq!(locked.edges().len(), 1);
        assert_eq!(locked.edges()[0].id, "e_q1p1");
        assert!(locked.aggregates().is_empty());
    }

    #[test]
    fn unlock_restores_full_view() {
        let v = view();
        let mut scope = LockedScope::new();
        assert!(scope.toggle("P"));
        let focused = apply_lock(&v, &scope);
        assert!(focused.node_count() < v.node_count());
        assert!(!scope.toggle("P"));
        assert!(apply_lock(&v, &scope).same_content(&v));
    }
}
