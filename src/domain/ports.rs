use crate::domain::edge::AggregatedEdge;
use crate::domain::feature::Feature;
use crate::domain::graph::Subgraph;
use crate::domain::hierarchy::HierarchyEntry;
use crate::domain::node::{NodeId, ProjectId};
use crate::domain::trace::{TraceFile, TraceId, TraceSummary};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Backing graph store port (implemented by adapters).
///
/// The store holds the full source graph; the core only ever sees the
/// fragments returned here. Every call may fail, and callers treat a failure
/// as "nothing happened".
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Top-level nodes of a project and the edges among them.
    async fn fetch_roots(&self, project: ProjectId) -> Result<Subgraph>;

    /// Immediate children of `parent_id` and the edges among them (which may
    /// include edges touching the parent itself).
    async fn fetch_children(&self, project: ProjectId, parent_id: &str) -> Result<Subgraph>;

    /// Summaries of connectivity between the descendant sets of the given
    /// visible nodes.
    async fn fetch_aggregated_edges(
        &self,
        project: ProjectId,
        visible_ids: &[NodeId],
    ) -> Result<Vec<AggregatedEdge>>;

    /// Ancestor chains (nearest first) for the requested ids. Unknown ids are
    /// simply absent from the result.
    async fn fetch_ancestor_chains(
        &self,
        project: ProjectId,
        ids: &[NodeId],
    ) -> Result<HashMap<NodeId, HierarchyEntry>>;

    async fn fetch_trace_file(&self, trace: TraceId) -> Result<TraceFile>;

    async fn fetch_features(&self, project: ProjectId) -> Result<Vec<Feature>>;

    /// Trace catalogue of a project.
    async fn list_traces(&self, project: ProjectId) -> Result<Vec<TraceSummary>>;
}
