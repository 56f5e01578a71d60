use crate::domain::property::Properties;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Node identifier, unique within a project.
pub type NodeId = String;

/// Feature identifier (recovered functional unit).
pub type FeatureId = i64;

/// Project identifier.
pub type ProjectId = i64;

/// Well-known primary kinds (first entry of `labels`).
pub mod kind {
    pub const FOLDER: &str = "Folder";
    pub const FILE: &str = "File";
    pub const OPERATION: &str = "Operation";
    pub const VARIABLE: &str = "Variable";
    pub const ACTION: &str = "Action";
}

/// A node of the containment tree.
///
/// `parent_id` is the containment edge: the parent owns the child for layout
/// and visibility purposes. `expanded` is view-local and only ever set by the
/// view state when the children are actually materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: NodeId,
    #[serde(default, alias = "parent_id", alias = "parent")]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, alias = "has_children")]
    pub has_children: bool,
    #[serde(default)]
    pub expanded: bool,
    #[serde(
        default,
        alias = "participating_features",
        alias = "participating_feature_ids"
    )]
    pub participating_feature_ids: BTreeSet<FeatureId>,
}

impl GraphNode {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            labels: Vec::new(),
            properties: Properties::new(),
            has_children: false,
            expanded: false,
            participating_feature_ids: BTreeSet::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn with_children(mut self, has_children: bool) -> Self {
        self.has_children = has_children;
        self
    }

    pub fn with_features(mut self, features: impl IntoIterator<Item = FeatureId>) -> Self {
        self.participating_feature_ids.extend(features);
        self
    }

    /// Primary kind, i.e. the first label.
    pub fn primary_kind(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Human-facing name: `properties.simpleName`, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.properties
            .get("simpleName")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.id)
    }

    pub fn is_child_of(&self, parent: &str) -> bool {
        self.parent_id.as_deref() == Some(parent)
    }
}
