use crate::domain::edge::GraphEdge;
use crate::domain::node::{GraphNode, NodeId, kind};
use anyhow::{Result, anyhow, bail};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// The complete source graph of one project.
///
/// Containment lives in `GraphNode::parent_id` and is indexed separately;
/// the petgraph edges are the relationships only.
#[derive(Debug, Default)]
pub struct SourceGraph {
    pub graph: DiGraph<GraphNode, GraphEdge>,
    id_to_index: HashMap<NodeId, NodeIndex>,
    children: HashMap<NodeId, Vec<NodeId>>,
    roots: Vec<NodeId>,
}

impl SourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, mut node: GraphNode) -> Result<NodeIndex> {
        if self.id_to_index.contains_key(&node.id) {
            bail!("Duplicate node id: {}", node.id);
        }
        node.expanded = false;
        match &node.parent_id {
            Some(parent) => self
                .children
                .entry(parent.clone())
                .or_default()
                .push(node.id.clone()),
            None => self.roots.push(node.id.clone()),
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.id_to_index.insert(id, idx);
        Ok(idx)
    }

    pub fn add_edge(&mut self, edge: GraphEdge) -> Result<()> {
        let source = self
            .index_of(&edge.source_id)
            .ok_or_else(|| anyhow!("Edge {} has unknown source {}", edge.id, edge.source_id))?;
        let target = self
            .index_of(&edge.target_id)
            .ok_or_else(|| anyhow!("Edge {} has unknown target {}", edge.id, edge.target_id))?;
        self.graph.add_edge(source, target, edge);
        Ok(())
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.id_to_index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index_of(id).map(|idx| &self.graph[idx])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.graph.edge_weights()
    }

    /// Top-level nodes, variables excluded.
    pub fn roots(&self) -> Vec<GraphNode> {
        self.listed(&self.roots)
    }

    /// Immediate children of `parent_id`, variables excluded.
    pub fn children(&self, parent_id: &str) -> Vec<GraphNode> {
        self.children
            .get(parent_id)
            .map(|ids| self.listed(ids))
            .unwrap_or_default()
    }

    /// Relationship edges whose endpoints are both in `ids`.
    pub fn edges_within(&self, ids: &HashSet<&str>) -> Vec<GraphEdge> {
        self.edges()
            .filter(|e| ids.contains(e.source_id.as_str()) && ids.contains(e.target_id.as_str()))
            .cloned()
            .collect()
    }

    /// Ancestor chain of `id`, nearest first. `None` for an unknown id.
    pub fn ancestors(&self, id: &str) -> Option<Vec<NodeId>> {
        let mut current = self.node(id)?;
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        while let Some(parent) = current.parent_id.as_deref() {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent.to_string());
            match self.node(parent) {
                Some(next) => current = next,
                None => break,
            }
        }
        Some(chain)
    }

    fn listed(&self, ids: &[NodeId]) -> Vec<GraphNode> {
        ids.iter()
            .filter_map(|id| self.node(id))
            .filter(|n| !n.has_label(kind::VARIABLE))
            .map(|n| {
                let mut n = n.clone();
                n.has_children = self.has_listed_children(&n.id);
                n
            })
            .collect()
    }

    fn has_listed_children(&self, id: &str) -> bool {
        self.children.get(id).is_some_and(|ids| {
            ids.iter()
                .filter_map(|c| self.node(c))
                .any(|c| !c.has_label(kind::VARIABLE))
        })
    }
}
