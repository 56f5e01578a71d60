//! Pure projection from session state to the element set handed to a renderer.
//!
//! Order of application: lock filter, then structural edge filter, then
//! feature emphasis, then the trace overlay (which wins over dimming).

use crate::domain::edge::{AggregatedEdge, GraphEdge};
use crate::domain::highlight::{Emphasis, FeatureHighlight};
use crate::domain::lock::{LockedScope, apply_lock};
use crate::domain::node::{FeatureId, GraphNode, NodeId};
use crate::domain::trace::{ExecutionOverlay, TraceId, TraceStep};
use crate::domain::view::ViewState;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub mod class {
    pub const EXPANDED: &str = "expanded";
    pub const COLLAPSED: &str = "collapsed";
    pub const LEAF: &str = "leaf";
    pub const LOCKED: &str = "locked";
    pub const AGGREGATED: &str = "aggregated";
    pub const FEATURE_HIGHLIGHT: &str = "feature-highlight";
    pub const FEATURE_DIM: &str = "feature-dim";
    pub const TRACE_ACTIVE: &str = "trace-active";
    pub const TRACE_PATH: &str = "trace-path";
    pub const TRACE_SOURCE: &str = "trace-source";
    pub const TRACE_GHOST: &str = "trace-ghost";
}

/// Everything the projection reads. Borrowed, never modified.
pub struct FrameInputs<'a> {
    pub view: &'a ViewState,
    pub locked: &'a LockedScope,
    pub hidden_labels: &'a BTreeSet<String>,
    pub aggregate_label: &'a str,
    pub active_features: &'a BTreeSet<FeatureId>,
    pub trace: Option<TraceFrame>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFrame {
    pub revision: u64,
    pub elements: Vec<RenderElement>,
    pub stats: ViewStats,
    pub locked: Vec<NodeId>,
    pub active_features: Vec<FeatureId>,
    pub hidden_edge_labels: Vec<String>,
    pub trace: Option<TraceFrame>,
}

/// Counts over the full view, plus what survived filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub displayed_nodes: usize,
    pub displayed_edges: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "group", rename_all = "lowercase")]
pub enum RenderElement {
    Nodes { data: NodeData, classes: Vec<String> },
    Edges { data: EdgeData, classes: Vec<String> },
}

impl RenderElement {
    pub fn id(&self) -> &str {
        match self {
            RenderElement::Nodes { data, .. } => &data.id,
            RenderElement::Edges { data, .. } => &data.id,
        }
    }

    pub fn classes(&self) -> &[String] {
        match self {
            RenderElement::Nodes { classes, .. } | RenderElement::Edges { classes, .. } => classes,
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().iter().any(|c| c == class)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    pub label: String,
    pub kind: Option<String>,
    pub has_children: bool,
    pub expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeData {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<BTreeMap<String, u64>>,
    pub is_aggregated: bool,
}

/// Playback position and the active step's resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceFrame {
    pub trace_id: TraceId,
    pub cursor: usize,
    pub length: usize,
    pub playing: bool,
    pub failure_indices: Vec<usize>,
    pub prefetch_frontier: usize,
    pub step: Option<TraceStep>,
    pub visible_source: Option<NodeId>,
    pub visible_target: Option<NodeId>,
}

impl TraceFrame {
    pub fn with_overlay(mut self, overlay: Option<&ExecutionOverlay>) -> Self {
        if let Some(o) = overlay {
            self.step = Some(o.step.clone());
            self.visible_source = o.visible_source.clone();
            self.visible_target = o.visible_target.clone();
        }
        self
    }

    fn ghost_edge(&self) -> Option<GraphEdge> {
        let overlay = ExecutionOverlay {
            index: self.cursor,
            step: self.step.clone()?,
            visible_source: self.visible_source.clone(),
            visible_target: self.visible_target.clone(),
        };
        overlay.edge()
    }
}

pub fn render(inputs: FrameInputs<'_>) -> RenderFrame {
    let full = inputs.view;
    let shown = apply_lock(full, inputs.locked);
    let highlight = FeatureHighlight::resolve(&shown, inputs.active_features);
    let trace_marks = TraceMarks::resolve(&shown, inputs.trace.as_ref());

    let mut elements = Vec::with_capacity(shown.node_count() + shown.edge_count() + 1);
    for node in shown.nodes() {
        elements.push(node_element(node, &shown, inputs.locked, &highlight, &trace_marks));
    }

    let edge_visible = |label: &str| !inputs.hidden_labels.contains(label);
    for edge in shown.edges().iter().filter(|e| edge_visible(&e.label)) {
        elements.push(edge_element(edge, &highlight));
    }
    for agg in shown.aggregates() {
        let key = if agg.is_aggregated {
            inputs.aggregate_label
        } else {
            agg.label.as_str()
        };
        if edge_visible(key) {
            elements.push(aggregate_element(agg, &highlight));
        }
    }

    if let Some(ghost) = inputs.trace.as_ref().and_then(TraceFrame::ghost_edge)
        && shown.contains(&ghost.source_id)
        && shown.contains(&ghost.target_id)
    {
        let classes = vec![ghost.label.clone(), class::TRACE_GHOST.to_string()];
        elements.push(RenderElement::Edges {
            data: EdgeData {
                id: ghost.id,
                source: ghost.source_id,
                target: ghost.target_id,
                label: ghost.label,
                weight: None,
                breakdown: None,
                is_aggregated: false,
            },
            classes,
        });
    }

    let displayed_nodes = shown.node_count();
    let displayed_edges = elements
        .iter()
        .filter(|e| matches!(e, RenderElement::Edges { .. }))
        .count();

    RenderFrame {
        revision: full.revision(),
        elements,
        stats: ViewStats {
            node_count: full.node_count(),
            edge_count: full.edge_count(),
            displayed_nodes,
            displayed_edges,
        },
        locked: inputs.locked.roots().iter().cloned().collect(),
        active_features: inputs.active_features.iter().copied().collect(),
        hidden_edge_labels: inputs.hidden_labels.iter().cloned().collect(),
        trace: inputs.trace,
    }
}

/// Node ids touched by the active trace step.
#[derive(Default)]
struct TraceMarks {
    active: Option<NodeId>,
    source: Option<NodeId>,
    path: HashSet<NodeId>,
}

impl TraceMarks {
    fn resolve(view: &ViewState, trace: Option<&TraceFrame>) -> Self {
        let Some(trace) = trace else {
            return Self::default();
        };
        let in_view = |id: &Option<NodeId>| id.clone().filter(|i| view.contains(i));
        let active = in_view(&trace.visible_target);
        let source = in_view(&trace.visible_source);

        let mut path = HashSet::new();
        let mut cursor = active.as_deref().and_then(|id| view.node(id)?.parent_id.clone());
        while let Some(id) = cursor {
            let Some(node) = view.node(&id) else { break };
            if !path.insert(id) {
                break;
            }
            cursor = node.parent_id.clone();
        }
        Self {
            active,
            source,
            path,
        }
    }

    fn classes_for(&self, id: &str) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.active.as_deref() == Some(id) {
            out.push(class::TRACE_ACTIVE);
        }
        if self.path.contains(id) {
            out.push(class::TRACE_PATH);
        }
        if self.source.as_deref() == Some(id) {
            out.push(class::TRACE_SOURCE);
        }
        out
    }
}

fn node_element(
    node: &GraphNode,
    view: &ViewState,
    locked: &LockedScope,
    highlight: &FeatureHighlight,
    trace: &TraceMarks,
) -> RenderElement {
    let mut classes: Vec<String> = Vec::new();
    if let Some(kind) = node.primary_kind() {
        classes.push(kind.to_lowercase());
    }
    classes.push(
        if node.expanded {
            class::EXPANDED
        } else if node.has_children {
            class::COLLAPSED
        } else {
            class::LEAF
        }
        .to_string(),
    );
    if locked.roots().contains(&node.id) {
        classes.push(class::LOCKED.to_string());
    }

    let trace_classes = trace.classes_for(&node.id);
    match highlight.node(&node.id) {
        Some(Emphasis::Highlighted) => classes.push(class::FEATURE_HIGHLIGHT.to_string()),
        Some(Emphasis::Dimmed) if trace_classes.is_empty() => {
            classes.push(class::FEATURE_DIM.to_string())
        }
        _ => {}
    }
    classes.extend(trace_classes.into_iter().map(String::from));

    RenderElement::Nodes {
        data: NodeData {
            id: node.id.clone(),
            parent: node.parent_id.clone().filter(|p| view.contains(p)),
            label: node.display_name().to_string(),
            kind: node.primary_kind().map(str::to_string),
            has_children: node.has_children,
            expanded: node.expanded,
        },
        classes,
    }
}

fn emphasis_class(emphasis: Option<Emphasis>) -> Option<String> {
    match emphasis {
        Some(Emphasis::Highlighted) => Some(class::FEATURE_HIGHLIGHT.to_string()),
        Some(Emphasis::Dimmed) => Some(class::FEATURE_DIM.to_string()),
        _ => None,
    }
}

fn edge_element(edge: &GraphEdge, highlight: &FeatureHighlight) -> RenderElement {
    let mut classes = vec![edge.label.clone()];
    classes.extend(emphasis_class(highlight.edge(&edge.id)));
    RenderElement::Edges {
        data: EdgeData {
            id: edge.id.clone(),
            source: edge.source_id.clone(),
            target: edge.target_id.clone(),
            label: edge.label.clone(),
            weight: None,
            breakdown: None,
            is_aggregated: false,
        },
        classes,
    }
}

fn aggregate_element(agg: &AggregatedEdge, highlight: &FeatureHighlight) -> RenderElement {
    let mut classes = vec![agg.label.clone()];
    if agg.is_aggregated && agg.label != class::AGGREGATED {
        classes.push(class::AGGREGATED.to_string());
    }
    classes.extend(emphasis_class(highlight.edge(&agg.id)));
    RenderElement::Edges {
        data: EdgeData {
            id: agg.id.clone(),
            source: agg.source.clone(),
            target: agg.target.clone(),
            label: agg.label.clone(),
            weight: Some(agg.weight),
            breakdown: Some(agg.breakdown.clone()),
            is_aggregated: agg.is_aggregated,
        },
        classes,
    }
}
