//! Graph and trace fixtures for integration tests.
#![allow(dead_code)]

use hierview::adapters::memory::{MemoryStore, ProjectData, SourceGraph};
use hierview::domain::edge::{GraphEdge, label};
use hierview::domain::feature::Feature;
use hierview::domain::node::{GraphNode, ProjectId, kind};
use hierview::domain::trace::{TraceFile, TraceSummary};

pub const PROJECT: ProjectId = 1;
pub const TRACE: i64 = 10;

pub fn feature(id: i64, name: &str, category: &str) -> Feature {
    Feature {
        id,
        name: name.to_string(),
        category: category.to_string(),
        score: 1.0,
        description: None,
    }
}

pub fn store_with(graph: SourceGraph, features: Vec<Feature>) -> MemoryStore {
    let mut store = MemoryStore::new();
    store.insert_project(PROJECT, ProjectData { graph, features });
    store
}

fn build(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> SourceGraph {
    let mut graph = SourceGraph::new();
    for node in nodes {
        graph.add_node(node).unwrap();
    }
    for edge in edges {
        graph.add_edge(edge).unwrap();
    }
    graph
}

/// ```text
/// A ── B ─invokes→ C
///   └─ C
/// ```
pub fn abc_graph() -> SourceGraph {
    build(
        vec![
            GraphNode::new("A").with_label(kind::FILE),
            GraphNode::new("B").with_parent("A").with_label(kind::OPERATION),
            GraphNode::new("C").with_parent("A").with_label(kind::OPERATION),
        ],
        vec![GraphEdge::new("e_1", "B", "C", label::INVOKES)],
    )
}

/// ```text
/// src ── a.cpp ── f ─invokes→ g
///    │         └─ cfg (Variable)
///    └─ b.cpp ── g ─uses→ h
///              └─ h
/// ```
/// `f` and `g` take part in feature 1 ("Login"), `h` in feature 2.
pub fn source_tree() -> SourceGraph {
    build(
        vec![
            GraphNode::new("src").with_label(kind::FOLDER),
            GraphNode::new("a.cpp").with_parent("src").with_label(kind::FILE),
            GraphNode::new("b.cpp").with_parent("src").with_label(kind::FILE),
            GraphNode::new("f")
                .with_parent("a.cpp")
                .with_label(kind::OPERATION)
                .with_features([1]),
            GraphNode::new("cfg").with_parent("a.cpp").with_label(kind::VARIABLE),
            GraphNode::new("g")
                .with_parent("b.cpp")
                .with_label(kind::OPERATION)
                .with_features([1]),
            GraphNode::new("h")
                .with_parent("b.cpp")
                .with_label(kind::OPERATION)
                .with_features([2]),
        ],
        vec![
            GraphEdge::new("e_1", "f", "g", label::INVOKES),
            GraphEdge::new("e_2", "g", "h", label::USES),
            GraphEdge::new("e_3", "a.cpp", "b.cpp", label::REQUIRES),
            GraphEdge::new("e_4", "f", "cfg", label::USES),
        ],
    )
}

pub fn source_tree_features() -> Vec<Feature> {
    vec![
        feature(1, "Login", "Domain"),
        feature(2, "Logging", "Infrastructure"),
    ]
}

/// Three roots P, Q, R; P holds p1 and p2, Q holds q1.
///
/// Edges: p1→p2 (uses), p1→q1 (invokes), q1→R (uses).
pub fn lock_graph() -> SourceGraph {
    build(
        vec![
            GraphNode::new("P").with_label(kind::FILE),
            GraphNode::new("Q").with_label(kind::FILE),
            GraphNode::new("R").with_label(kind::FILE),
            GraphNode::new("p1").with_parent("P").with_label(kind::OPERATION),
            GraphNode::new("p2").with_parent("P").with_label(kind::OPERATION),
            GraphNode::new("q1").with_parent("Q").with_label(kind::OPERATION),
        ],
        vec![
            GraphEdge::new("e_pp", "p1", "p2", label::USES),
            GraphEdge::new("e_pq", "p1", "q1", label::INVOKES),
            GraphEdge::new("e_qr", "q1", "R", label::USES),
        ],
    )
}

/// ```text
/// root ── F ── X
///      └─ G ── Y
/// ```
pub fn trace_graph() -> SourceGraph {
    build(
        vec![
            GraphNode::new("root").with_label(kind::FOLDER),
            GraphNode::new("F").with_parent("root").with_label(kind::FILE),
            GraphNode::new("G").with_parent("root").with_label(kind::FILE),
            GraphNode::new("X").with_parent("F").with_label(kind::OPERATION),
            GraphNode::new("Y").with_parent("G").with_label(kind::OPERATION),
        ],
        vec![GraphEdge::new("e_yx", "Y", "X", label::INVOKES)],
    )
}

fn action(step: i64, source: Option<&str>, target: &str, message: &str) -> serde_json::Value {
    serde_json::json!({
        "data": {
            "id": format!("Action_{step}"),
            "labels": ["Action"],
            "properties": {
                "step": step,
                "sourceId": source,
                "targetId": target,
                "timestamp": format!("10:00:00,{step:03}"),
                "type": "call",
                "parameters": "",
                "simpleName": format!("{step}: {target}"),
                "message": message
            }
        }
    })
}

/// Five steps over [`trace_graph`]; step index 3 fails and step index 4
/// targets an id the store has never heard of.
pub fn trace_file() -> TraceFile {
    serde_json::from_value(serde_json::json!({
        "elements": {
            "nodes": [
                {"data": {"id": "Trace_1", "labels": ["Trace"], "properties": {"name": "run"}}},
                action(1, None, "Y", "> Y()"),
                action(2, Some("Y"), "X", "> X()"),
                action(3, Some("X"), "Y", "< X = 0"),
                action(4, Some("Y"), "X", "< Y = \"FAILED\""),
                action(5, Some("X"), "ghost", "> ghost()"),
            ],
            "edges": []
        }
    }))
    .unwrap()
}

pub fn trace_store() -> MemoryStore {
    let mut store = store_with(trace_graph(), vec![]);
    store.insert_trace(
        TraceSummary {
            id: TRACE,
            project_id: Some(PROJECT),
            name: "run".to_string(),
            description: None,
            created_at: None,
        },
        trace_file(),
    );
    store
}
