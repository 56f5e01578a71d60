use crate::domain::node::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relationship types carried by real edges.
pub mod label {
    pub const INVOKES: &str = "invokes";
    pub const DECLARES: &str = "declares";
    pub const REQUIRES: &str = "requires";
    pub const SPECIALIZES: &str = "specializes";
    pub const INSTANTIATES: &str = "instantiates";
    pub const USES: &str = "uses";
    pub const TYPED: &str = "typed";
    /// Group label of synthesized summaries.
    pub const AGGREGATED: &str = "aggregated";
    /// Label of the synthetic trace playback edge.
    pub const EXECUTES: &str = "executes";
}

/// A real relationship between two nodes of the source graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    #[serde(alias = "source_id", alias = "source")]
    pub source_id: NodeId,
    #[serde(alias = "target_id", alias = "target")]
    pub target_id: NodeId,
    pub label: String,
}

impl GraphEdge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source.into(),
            target_id: target.into(),
            label: label.into(),
        }
    }
}

/// Synthetic summary of real edges running between the descendant sets of two
/// visible nodes.
///
/// `weight` counts the summarized edges and `breakdown` splits that count by
/// relationship type. When every summarized edge directly joins the two
/// visible nodes the store reports the real relationship type as `label` and
/// `is_aggregated` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedEdge {
    pub id: String,
    #[serde(alias = "sourceId")]
    pub source: NodeId,
    #[serde(alias = "targetId")]
    pub target: NodeId,
    pub weight: u64,
    #[serde(default)]
    pub breakdown: BTreeMap<String, u64>,
    #[serde(default = "default_aggregate_label")]
    pub label: String,
    #[serde(default = "default_true", alias = "is_aggregated")]
    pub is_aggregated: bool,
}

fn default_aggregate_label() -> String {
    label::AGGREGATED.to_string()
}

fn default_true() -> bool {
    true
}

impl AggregatedEdge {
    /// Build a summary with the canonical `agg_{source}_{target}_{label}` id.
    pub fn summarize(
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        group_label: impl Into<String>,
        breakdown: BTreeMap<String, u64>,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        let group_label = group_label.into();
        let weight = breakdown.values().sum();
        Self {
            id: format!("agg_{source}_{target}_{group_label}"),
            is_aggregated: group_label == label::AGGREGATED,
            source,
            target,
            weight,
            breakdown,
            label: group_label,
        }
    }

    /// Bring `breakdown` and `weight` into agreement. Servers occasionally omit
    /// the breakdown; in that case the whole weight is attributed to `label`.
    pub fn normalized(mut self) -> Self {
        if self.breakdown.is_empty() {
            if self.weight > 0 {
                self.breakdown.insert(self.label.clone(), self.weight);
            }
        } else {
            self.weight = self.breakdown.values().sum();
        }
        self
    }
}
