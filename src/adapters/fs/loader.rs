use crate::adapters::memory::graph::SourceGraph;
use crate::adapters::memory::store::{MemoryStore, ProjectData};
use crate::domain::edge::GraphEdge;
use crate::domain::feature::Feature;
use crate::domain::node::{GraphNode, ProjectId};
use crate::domain::trace::{TraceFile, TraceSummary};
use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// A project dump: the labelled property graph as exported by the analysis
/// pipeline, optionally bundled with its features and recorded traces.
#[derive(Debug, Deserialize)]
struct ProjectDump {
    #[serde(default = "default_project")]
    project: ProjectId,
    #[serde(default)]
    elements: LpgElements,
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(default)]
    traces: Vec<TraceDump>,
}

fn default_project() -> ProjectId {
    1
}

#[derive(Debug, Default, Deserialize)]
struct LpgElements {
    #[serde(default)]
    nodes: Vec<LpgNode>,
    #[serde(default)]
    edges: Vec<LpgEdge>,
}

/// Elements may come wrapped in `{"data": ...}` or flat.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LpgNode {
    Wrapped { data: GraphNode },
    Flat(GraphNode),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LpgEdge {
    Wrapped { data: LpgEdgeData },
    Flat(LpgEdgeData),
}

#[derive(Debug, Deserialize)]
struct LpgEdgeData {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    db_id: Option<i64>,
    #[serde(alias = "source_id")]
    source: String,
    #[serde(alias = "target_id")]
    target: String,
    #[serde(default)]
    label: String,
}

#[derive(Debug, Deserialize)]
struct TraceDump {
    #[serde(flatten)]
    summary: TraceSummary,
    file: TraceFile,
}

/// A memory store holding the dumped project.
pub struct LoadedProject {
    pub project: ProjectId,
    pub store: MemoryStore,
}

pub fn load_project(path: &Path) -> Result<LoadedProject> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read project dump: {}", path.display()))?;
    let loaded = parse_project(&content)
        .with_context(|| format!("Failed to load project dump: {}", path.display()))?;
    info!(
        path = %path.display(),
        project = loaded.project,
        "project dump loaded"
    );
    Ok(loaded)
}

pub fn parse_project(json: &str) -> Result<LoadedProject> {
    let dump: ProjectDump = serde_json::from_str(json).context("Failed to parse project dump JSON")?;

    let mut graph = SourceGraph::new();
    for node in dump.elements.nodes {
        let node = match node {
            LpgNode::Wrapped { data } | LpgNode::Flat(data) => data,
        };
        graph.add_node(node)?;
    }
    for (position, edge) in dump.elements.edges.into_iter().enumerate() {
        let data = match edge {
            LpgEdge::Wrapped { data } | LpgEdge::Flat(data) => data,
        };
        let id = data
            .id
            .or_else(|| data.db_id.map(|db| format!("e_{db}")))
            .unwrap_or_else(|| format!("e_{position}"));
        graph.add_edge(GraphEdge::new(id, data.source, data.target, data.label))?;
    }

    let project = dump.project;
    let mut store = MemoryStore::new();
    store.insert_project(
        project,
        ProjectData {
            graph,
            features: dump.features,
        },
    );
    for trace in dump.traces {
        let mut summary = trace.summary;
        summary.project_id.get_or_insert(project);
        store.insert_trace(summary, trace.file);
    }
    Ok(LoadedProject { project, store })
}
