use crate::domain::descendants::descendants_of;
use crate::domain::edge::{AggregatedEdge, GraphEdge};
use crate::domain::error::ViewError;
use crate::domain::graph::Subgraph;
use crate::domain::node::{GraphNode, NodeId};
use std::collections::{HashMap, HashSet};

/// The materialized subset of the source graph: everything the user can see.
///
/// A view state is never patched in place across a transition. Each
/// transition builds a new state from the old one plus freshly fetched data,
/// so a reader holding a snapshot always observes a consistent whole.
///
/// Besides the ordered element lists it keeps a parent -> children adjacency
/// index, which makes descendant lookups linear in the size of the result
/// rather than in the number of visible elements.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    revision: u64,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    aggregates: Vec<AggregatedEdge>,
    node_index: HashMap<NodeId, usize>,
    children: HashMap<NodeId, Vec<NodeId>>,
}

/// What an expansion added to the view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionDelta {
    pub added_nodes: Vec<NodeId>,
    pub added_edges: usize,
    pub suppressed_edges: usize,
    /// Returned children that name some other node as their parent.
    pub misplaced_children: Vec<NodeId>,
}

impl ViewState {
    /// Initial state from the project roots. Roots always start collapsed.
    pub fn from_roots(roots: Subgraph) -> Self {
        let nodes = roots
            .nodes
            .into_iter()
            .map(|mut n| {
                n.expanded = false;
                n
            })
            .collect();
        Self::assemble(0, nodes, roots.edges, Vec::new())
    }

    /// Build a state and its indexes, dropping duplicate ids, self-loops and
    /// any edge whose endpoints are not both present.
    fn assemble(
        revision: u64,
        nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
        aggregates: Vec<AggregatedEdge>,
    ) -> Self {
        let mut state = ViewState {
            revision,
            ..Default::default()
        };

        for node in nodes {
            if state.node_index.contains_key(&node.id) {
                continue;
            }
            if let Some(parent) = &node.parent_id {
                state
                    .children
                    .entry(parent.clone())
                    .or_default()
                    .push(node.id.clone());
            }
            state.node_index.insert(node.id.clone(), state.nodes.len());
            state.nodes.push(node);
        }

        let mut edge_ids = HashSet::new();
        for edge in edges {
            if edge.source_id == edge.target_id
                || !state.contains(&edge.source_id)
                || !state.contains(&edge.target_id)
                || !edge_ids.insert(edge.id.clone())
            {
                continue;
            }
            state.edges.push(edge);
        }

        state.aggregates = state.retain_attached(aggregates);
        state
    }

    fn retain_attached(&self, aggregates: Vec<AggregatedEdge>) -> Vec<AggregatedEdge> {
        let mut ids = HashSet::new();
        aggregates
            .into_iter()
            .filter(|a| {
                a.source != a.target
                    && self.contains(&a.source)
                    && self.contains(&a.target)
                    && ids.insert(a.id.clone())
            })
            .collect()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn aggregates(&self) -> &[AggregatedEdge] {
        &self.aggregates
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    /// Visible children of `id`, in the order they entered the view.
    pub fn children_of(&self, id: &str) -> &[NodeId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids of all visible nodes, in view order.
    pub fn visible_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Real plus synthesized edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len() + self.aggregates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Apply a children fetch for `node_id`.
    ///
    /// Fails with [`ViewError::StaleResponse`] when the node has left the view
    /// or was expanded in the meantime. An empty fetch leaves the state as it
    /// is. Edges joining `node_id` to one of its new children are suppressed:
    /// containment already shows that relationship. Children claiming a
    /// different parent are skipped. Previously synthesized
    /// aggregates are dropped; the caller installs fresh ones.
    pub fn with_expansion(
        &self,
        node_id: &str,
        children: Subgraph,
    ) -> Result<(ViewState, ExpansionDelta), ViewError> {
        let stale = || ViewError::StaleResponse {
            node_id: node_id.to_string(),
        };
        let target = self.node(node_id).ok_or_else(stale)?;
        if target.expanded {
            return Err(stale());
        }
        if children.is_empty() {
            return Ok((self.clone(), ExpansionDelta::default()));
        }

        let mut delta = ExpansionDelta::default();
        let mut nodes = self.nodes.clone();
        nodes[self.node_index[node_id]].expanded = true;

        for mut child in children.nodes {
            if self.contains(&child.id) || child.id == node_id {
                continue;
            }
            match child.parent_id.as_deref() {
                None => child.parent_id = Some(node_id.to_string()),
                Some(parent) if parent != node_id => {
                    delta.misplaced_children.push(child.id);
                    continue;
                }
                Some(_) => {}
            }
            child.expanded = false;
            delta.added_nodes.push(child.id.clone());
            nodes.push(child);
        }

        let new_children: HashSet<&str> = delta.added_nodes.iter().map(String::as_str).collect();
        let mut edges = self.edges.clone();
        for edge in children.edges {
            let vertical = (edge.source_id == node_id && new_children.contains(edge.target_id.as_str()))
                || (edge.target_id == node_id && new_children.contains(edge.source_id.as_str()));
            if vertical {
                delta.suppressed_edges += 1;
                continue;
            }
            edges.push(edge);
        }

        let next = Self::assemble(self.revision + 1, nodes, edges, Vec::new());
        delta.added_edges = next.edges.len() - self.edges.len();
        Ok((next, delta))
    }

    /// Remove every descendant of `node_id` and every edge touching one.
    ///
    /// Fails with [`ViewError::StaleResponse`] when the node is gone or not
    /// expanded. Returns the removed ids alongside the new state.
    pub fn with_collapse(&self, node_id: &str) -> Result<(ViewState, HashSet<NodeId>), ViewError> {
        match self.node(node_id) {
            Some(n) if n.expanded => {}
            _ => {
                return Err(ViewError::StaleResponse {
                    node_id: node_id.to_string(),
                });
            }
        }

        let removed = descendants_of(node_id, self);
        let nodes = self
            .nodes
            .iter()
            .filter(|n| !removed.contains(&n.id))
            .map(|n| {
                let mut n = n.clone();
                if n.id == node_id {
                    n.expanded = false;
                }
                n
            })
            .collect();
        let edges = self
            .edges
            .iter()
            .filter(|e| !removed.contains(&e.source_id) && !removed.contains(&e.target_id))
            .cloned()
            .collect();

        let next = Self::assemble(self.revision + 1, nodes, edges, Vec::new());
        Ok((next, removed))
    }

    /// Replace all synthesized edges. Aggregates are never patched
    /// incrementally.
    pub fn with_aggregates(mut self, aggregates: Vec<AggregatedEdge>) -> Self {
        self.aggregates = self.retain_attached(aggregates);
        self
    }

    /// Display-only subset: nodes accepted by `keep`, and edges whose two
    /// endpoints are both kept. The revision is carried over unchanged.
    pub fn filtered(&self, keep: impl Fn(&str) -> bool) -> ViewState {
        let nodes = self.nodes.iter().filter(|n| keep(&n.id)).cloned().collect();
        let edges = self
            .edges
            .iter()
            .filter(|e| keep(&e.source_id) && keep(&e.target_id))
            .cloned()
            .collect();
        let aggregates = self
            .aggregates
            .iter()
            .filter(|a| keep(&a.source) && keep(&a.target))
            .cloned()
            .collect();
        Self::assemble(self.revision, nodes, edges, aggregates)
    }

    /// Same nodes, edges and aggregates regardless of order and revision.
    pub fn same_content(&self, other: &ViewState) -> bool {
        fn sorted<T: Clone, K: Ord>(items: &[T], key: impl Fn(&T) -> K) -> Vec<T> {
            let mut v = items.to_vec();
            v.sort_by_key(|x| key(x));
            v
        }
        sorted(&self.nodes, |n| n.id.clone()) == sorted(&other.nodes, |n| n.id.clone())
            && sorted(&self.edges, |e| e.id.clone()) == sorted(&other.edges, |e| e.id.clone())
            && sorted(&self.aggregates, |a| a.id.clone())
                == sorted(&other.aggregates, |a| a.id.clone())
    }

    /// Structural invariants every committed state must satisfy. Returns a
    /// human-readable description of each violation.
    pub fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        for node in &self.nodes {
            let visible_children = self.children_of(&node.id).len();
            if !node.expanded && visible_children > 0 {
                out.push(format!(
                    "collapsed node {} has {} visible children",
                    node.id, visible_children
                ));
            }
            if node.expanded && visible_children == 0 {
                out.push(format!("expanded node {} shows no children", node.id));
            }
            if let Some(parent) = &node.parent_id
                && !self.contains(parent)
            {
                out.push(format!("node {} is orphaned from {}", node.id, parent));
            }
        }
        for edge in &self.edges {
            if edge.source_id == edge.target_id {
                out.push(format!("edge {} is a self-loop", edge.id));
            }
            if !self.contains(&edge.source_id) || !self.contains(&edge.target_id) {
                out.push(format!("edge {} dangles", edge.id));
            }
        }
        for agg in &self.aggregates {
            if agg.source == agg.target {
                out.push(format!("aggregate {} is a self-loop", agg.id));
            }
            if self.is_vertical(&agg.source, &agg.target) {
                out.push(format!("aggregate {} joins parent and child", agg.id));
            }
        }
        out
    }

    /// True when one of the two visible nodes is the direct parent of the other.
    pub fn is_vertical(&self, a: &str, b: &str) -> bool {
        let parent_of = |x: &str, y: &str| self.node(y).is_some_and(|n| n.is_child_of(x));
        parent_of(a, b) || parent_of(b, a)
    }
}
