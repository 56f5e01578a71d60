use crate::app::controller::TransitionOutcome;
use crate::app::projection::RenderFrame;
use crate::domain::node::{FeatureId, NodeId, ProjectId};
use crate::domain::trace::{StepDirection, TraceId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub project_id: ProjectId,
    pub node_count: usize,
    pub edge_count: usize,
    pub feature_count: usize,
    pub hierarchy_entries: usize,
    pub trace_loaded: Option<TraceId>,
    pub closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRequest {
    pub node_id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeFilterRequest {
    pub label: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureToggleRequest {
    pub feature_id: FeatureId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSelectRequest {
    pub trace_id: TraceId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeekRequest {
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRequest {
    pub direction: StepDirection,
}

/// Outcome of a node toggle together with the frame it produced.
#[derive(Debug, Clone, Serialize)]
pub struct ToggleResponse {
    pub outcome: TransitionOutcome,
    pub frame: RenderFrame,
}
