use crate::adapters::memory::graph::SourceGraph;
use crate::domain::edge::{AggregatedEdge, label};
use crate::domain::feature::Feature;
use crate::domain::graph::Subgraph;
use crate::domain::hierarchy::HierarchyEntry;
use crate::domain::node::{NodeId, ProjectId};
use crate::domain::ports::GraphStore;
use crate::domain::trace::{TraceFile, TraceId, TraceSummary};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use petgraph::graph::NodeIndex;
use std::collections::{BTreeMap, HashMap, HashSet};

/// One project held entirely in memory.
#[derive(Debug, Default)]
pub struct ProjectData {
    pub graph: SourceGraph,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone)]
struct StoredTrace {
    summary: TraceSummary,
    file: TraceFile,
}

/// A [`GraphStore`] over fully loaded source graphs.
///
/// Answers every query the way the backing service does, including the
/// nearest-visible aggregation, so the view layer can run without a server.
#[derive(Debug)]
pub struct MemoryStore {
    projects: HashMap<ProjectId, ProjectData>,
    traces: BTreeMap<TraceId, StoredTrace>,
    aggregate_label: String,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            projects: HashMap::new(),
            traces: BTreeMap::new(),
            aggregate_label: label::AGGREGATED.to_string(),
        }
    }

    pub fn with_aggregate_label(mut self, label: impl Into<String>) -> Self {
        self.aggregate_label = label.into();
        self
    }

    pub fn insert_project(&mut self, id: ProjectId, data: ProjectData) {
        self.projects.insert(id, data);
    }

    pub fn insert_trace(&mut self, summary: TraceSummary, file: TraceFile) {
        self.traces.insert(summary.id, StoredTrace { summary, file });
    }

    pub fn project(&self, id: ProjectId) -> Result<&ProjectData> {
        self.projects
            .get(&id)
            .ok_or_else(|| anyhow!("Project not found: {id}"))
    }

    /// Summaries between the given visible ids.
    ///
    /// Every relationship edge is resolved endpoint by endpoint to the
    /// nearest visible node (itself or its closest visible ancestor). Edges
    /// resolving to the same node are internal and skipped. The rest are
    /// grouped per (source, target, group label): the real label when the
    /// edge joins the two visible nodes directly, the aggregate label
    /// otherwise.
    pub fn aggregate(&self, project: ProjectId, visible_ids: &[NodeId]) -> Result<Vec<AggregatedEdge>> {
        let graph = &self.project(project)?.graph;
        let visible: HashSet<&str> = visible_ids.iter().map(String::as_str).collect();
        let mut resolved: HashMap<NodeIndex, Option<NodeId>> = HashMap::new();
        let mut groups: BTreeMap<(NodeId, NodeId, String), BTreeMap<String, u64>> = BTreeMap::new();

        for edge_ref in graph.graph.edge_indices() {
            let Some((s_idx, t_idx)) = graph.graph.edge_endpoints(edge_ref) else {
                continue;
            };
            let edge = &graph.graph[edge_ref];
            let source = resolved
                .entry(s_idx)
                .or_insert_with(|| nearest_visible(graph, &edge.source_id, &visible))
                .clone();
            let target = resolved
                .entry(t_idx)
                .or_insert_with(|| nearest_visible(graph, &edge.target_id, &visible))
                .clone();
            let (Some(source), Some(target)) = (source, target) else {
                continue;
            };
            if source == target {
                continue;
            }
            let direct = source == edge.source_id && target == edge.target_id;
            let group = if direct {
                edge.label.clone()
            } else {
                self.aggregate_label.clone()
            };
            *groups
                .entry((source, target, group))
                .or_default()
                .entry(edge.label.clone())
                .or_default() += 1;
        }

        Ok(groups
            .into_iter()
            .map(|((source, target, group), breakdown)| {
                let indirect = group == self.aggregate_label;
                let mut agg = AggregatedEdge::summarize(source, target, group, breakdown);
                agg.is_aggregated = indirect;
                agg
            })
            .collect())
    }
}

fn nearest_visible(graph: &SourceGraph, id: &str, visible: &HashSet<&str>) -> Option<NodeId> {
    if visible.contains(id) {
        return Some(id.to_string());
    }
    graph
        .ancestors(id)?
        .into_iter()
        .find(|a| visible.contains(a.as_str()))
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn fetch_roots(&self, project: ProjectId) -> Result<Subgraph> {
        let graph = &self.project(project)?.graph;
        let nodes = graph.roots();
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let edges = graph.edges_within(&ids);
        Ok(Subgraph::new(nodes, edges))
    }

    async fn fetch_children(&self, project: ProjectId, parent_id: &str) -> Result<Subgraph> {
        let graph = &self.project(project)?.graph;
        if graph.node(parent_id).is_none() {
            return Err(anyhow!("Node not found: {parent_id}"));
        }
        let nodes = graph.children(parent_id);
        let mut ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        ids.insert(parent_id);
        let edges = graph.edges_within(&ids);
        Ok(Subgraph::new(nodes, edges))
    }

    async fn fetch_aggregated_edges(
        &self,
        project: ProjectId,
        visible_ids: &[NodeId],
    ) -> Result<Vec<AggregatedEdge>> {
        if visible_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.aggregate(project, visible_ids)
    }

    async fn fetch_ancestor_chains(
        &self,
        project: ProjectId,
        ids: &[NodeId],
    ) -> Result<HashMap<NodeId, HierarchyEntry>> {
        let graph = &self.project(project)?.graph;
        Ok(ids
            .iter()
            .filter_map(|id| {
                let ancestors = graph.ancestors(id)?;
                let properties = graph.node(id)?.properties.clone();
                Some((id.clone(), HierarchyEntry { ancestors, properties }))
            })
            .collect())
    }

    async fn fetch_trace_file(&self, trace: TraceId) -> Result<TraceFile> {
        self.traces
            .get(&trace)
            .map(|t| t.file.clone())
            .ok_or_else(|| anyhow!("Trace not found: {trace}"))
    }

    async fn fetch_features(&self, project: ProjectId) -> Result<Vec<Feature>> {
        Ok(self.project(project)?.features.clone())
    }

    async fn list_traces(&self, project: ProjectId) -> Result<Vec<TraceSummary>> {
        self.project(project)?;
        Ok(self
            .traces
            .values()
            .filter(|t| t.summary.project_id.is_none_or(|p| p == project))
            .map(|t| t.summary.clone())
            .collect())
    }
}
