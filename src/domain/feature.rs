use crate::domain::node::FeatureId;
use serde::{Deserialize, Serialize};

/// Category the decomposition assigns to cross-cutting features.
pub const INFRASTRUCTURE: &str = "Infrastructure";

/// A functional unit recovered from runtime behavior. Participation is
/// recorded on the nodes (`participating_feature_ids`), not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl Feature {
    pub fn is_infrastructure(&self) -> bool {
        self.category == INFRASTRUCTURE
    }
}
