use crate::domain::node::{FeatureId, NodeId};
use crate::domain::view::ViewState;
use std::collections::{BTreeSet, HashSet};

/// Emphasis a rendered element receives from the active feature set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    Highlighted,
    /// Expanded containers of highlighted members: neither lit nor dimmed.
    Backdrop,
    Dimmed,
}

/// Node and edge emphasis for one active-feature set over one view.
#[derive(Debug, Clone, Default)]
pub struct FeatureHighlight {
    active: bool,
    highlighted_nodes: HashSet<NodeId>,
    dimmed_nodes: HashSet<NodeId>,
    highlighted_edges: HashSet<String>,
}

impl FeatureHighlight {
    /// Classify `view` against `active`.
    ///
    /// A node is highlighted when it participates in an active feature and is
    /// not an expanded container. Expanded containers are never dimmed. Every
    /// other node is dimmed. An edge (real or synthesized) is highlighted only
    /// when neither endpoint is dimmed.
    pub fn resolve(view: &ViewState, active: &BTreeSet<FeatureId>) -> Self {
        let mut out = FeatureHighlight::default();
        if active.is_empty() {
            return out;
        }
        out.active = true;

        for node in view.nodes() {
            if node.expanded {
                continue;
            }
            let participates = node
                .participating_feature_ids
                .iter()
                .any(|f| active.contains(f));
            if participates {
                out.highlighted_nodes.insert(node.id.clone());
            } else {
                out.dimmed_nodes.insert(node.id.clone());
            }
        }

        let lit = |a: &str, b: &str| !out.dimmed_nodes.contains(a) && !out.dimmed_nodes.contains(b);
        let edges: Vec<String> = view
            .edges()
            .iter()
            .filter(|e| lit(&e.source_id, &e.target_id))
            .map(|e| e.id.clone())
            .chain(
                view.aggregates()
                    .iter()
                    .filter(|a| lit(&a.source, &a.target))
                    .map(|a| a.id.clone()),
            )
            .collect();
        out.highlighted_edges.extend(edges);
        out
    }

    /// Whether any feature is active at all.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// `None` when no feature is active.
    pub fn node(&self, id: &str) -> Option<Emphasis> {
        if !self.is_active() {
            return None;
        }
        Some(if self.highlighted_nodes.contains(id) {
            Emphasis::Highlighted
        } else if self.dimmed_nodes.contains(id) {
            Emphasis::Dimmed
        } else {
            Emphasis::Backdrop
        })
    }

    pub fn edge(&self, id: &str) -> Option<Emphasis> {
        if !self.is_active() {
            return None;
        }
        Some(if self.highlighted_edges.contains(id) {
            Emphasis::Highlighted
        } else {
            Emphasis::Dimmed
        })
    }
}
