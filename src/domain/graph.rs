use crate::domain::edge::GraphEdge;
use crate::domain::node::GraphNode;
use serde::{Deserialize, Serialize};

/// A fragment of the source graph as handed out by the store: the roots of a
/// project, or the immediate children of one node, with the real edges among
/// them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl Subgraph {
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
