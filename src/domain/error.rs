use crate::domain::node::{FeatureId, NodeId};
use thiserror::Error;

/// Failures surfaced by view-state transitions and playback.
///
/// None of these is fatal to a session: a failed transition leaves the
/// previous view state in place and can simply be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// A collaborator call failed (network, server or decoding error).
    #[error("{operation} failed: {message}")]
    FetchFailed {
        operation: &'static str,
        message: String,
    },

    /// A response arrived for a node whose state has since changed.
    #[error("stale response for node {node_id}")]
    StaleResponse { node_id: NodeId },

    #[error("node not in view: {0}")]
    UnknownNode(NodeId),

    #[error("unknown feature: {0}")]
    UnknownFeature(FeatureId),

    #[error("no trace loaded")]
    NoTraceLoaded,

    #[error("session closed")]
    SessionClosed,
}

impl ViewError {
    /// Wrap a collaborator failure, keeping the full context chain.
    pub fn fetch(operation: &'static str, err: anyhow::Error) -> Self {
        ViewError::FetchFailed {
            operation,
            message: format!("{err:#}"),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, ViewError::StaleResponse { .. })
    }
}
