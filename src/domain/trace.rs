use crate::domain::edge::{GraphEdge, label};
use crate::domain::hierarchy::{HierarchyIndex, resolve_visible};
use crate::domain::node::{NodeId, ProjectId, kind};
use crate::domain::property::{Properties, PropertyValue};
use crate::domain::view::ViewState;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub type TraceId = i64;

/// Id of the synthetic playback edge. There is at most one at any time.
pub const EXECUTION_EDGE_ID: &str = "trace-ghost-edge";

/// Catalogue entry for a recorded trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSummary {
    pub id: TraceId,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A trace file as stored: a small graph whose `Action` nodes are the steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceFile {
    #[serde(default)]
    pub elements: TraceElements,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceElements {
    #[serde(default)]
    pub nodes: Vec<TraceNode>,
    #[serde(default)]
    pub edges: Vec<TraceEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceNode {
    pub data: TraceNodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceNodeData {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "label")]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEdge {
    pub data: TraceEdgeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEdgeData {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: String,
}

/// One recorded action. `source_id`/`target_id` refer to the full graph and
/// may be absent (a call from the outermost frame has no source).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    pub id: String,
    pub step: i64,
    pub source_id: Option<NodeId>,
    pub target_id: Option<NodeId>,
    #[serde(rename = "type")]
    pub step_type: String,
    pub message: String,
    pub timestamp: String,
    pub parameters: PropertyValue,
    pub name: String,
}

impl TraceFile {
    /// The `Action` nodes as steps, ascending by `step`. Actions without a
    /// numeric step are ordered after the numbered ones, in file order.
    pub fn steps(&self) -> Vec<TraceStep> {
        let mut steps: Vec<TraceStep> = self
            .elements
            .nodes
            .iter()
            .filter(|n| n.data.labels.iter().any(|l| l == kind::ACTION))
            .map(|n| step_from_node(&n.data))
            .collect();
        steps.sort_by_key(|s| s.step);
        steps
    }
}

fn step_from_node(data: &TraceNodeData) -> TraceStep {
    let props = &data.properties;
    let text = |key: &str| props.get(key).and_then(PropertyValue::to_text).unwrap_or_default();
    let endpoint = |key: &str| {
        props
            .get(key)
            .and_then(PropertyValue::to_text)
            .filter(|s| !s.is_empty())
    };
    TraceStep {
        id: data.id.clone(),
        step: props
            .get("step")
            .and_then(PropertyValue::as_i64)
            .unwrap_or(i64::MAX),
        source_id: endpoint("sourceId"),
        target_id: endpoint("targetId"),
        step_type: text("type"),
        message: text("message"),
        timestamp: text("timestamp"),
        parameters: props.get("parameters").cloned().unwrap_or_default(),
        name: text("simpleName"),
    }
}

/// Indices of steps whose message carries a failure indicator.
pub fn failure_indices(steps: &[TraceStep], pattern: &Regex) -> Vec<usize> {
    steps
        .iter()
        .enumerate()
        .filter(|(_, s)| pattern.is_match(&s.message))
        .map(|(i, _)| i)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDirection {
    First,
    Previous,
    Next,
    Last,
}

/// Cursor over an ordered trace, with the auto-advance flag and the prefetch
/// frontier (the furthest step index ever scanned for ancestor lookups).
#[derive(Debug, Clone)]
pub struct TracePlayer {
    steps: Vec<TraceStep>,
    cursor: usize,
    frontier: usize,
    playing: bool,
    failures: Vec<usize>,
}

impl TracePlayer {
    pub fn new(file: &TraceFile, failure_pattern: &Regex) -> Self {
        let steps = file.steps();
        let failures = failure_indices(&steps, failure_pattern);
        Self {
            steps,
            cursor: 0,
            frontier: 0,
            playing: false,
            failures,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn active_step(&self) -> Option<&TraceStep> {
        self.steps.get(self.cursor)
    }

    pub fn failure_indices(&self) -> &[usize] {
        &self.failures
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn prefetch_frontier(&self) -> usize {
        self.frontier
    }

    fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    /// Move the cursor, clamped to the trace. Returns whether it moved.
    pub fn seek(&mut self, index: usize) -> bool {
        let target = index.min(self.last_index());
        let moved = target != self.cursor;
        self.cursor = target;
        moved
    }

    pub fn step(&mut self, direction: StepDirection) -> bool {
        let target = match direction {
            StepDirection::First => 0,
            StepDirection::Previous => self.cursor.saturating_sub(1),
            StepDirection::Next => self.cursor + 1,
            StepDirection::Last => self.last_index(),
        };
        self.seek(target)
    }

    /// Start auto-advance. Refused (returns false) on the last step.
    pub fn play(&mut self) -> bool {
        self.playing = self.cursor < self.last_index();
        self.playing
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// One auto-advance tick. Stops playing on reaching the last step.
    /// Returns whether the cursor moved.
    pub fn tick(&mut self) -> bool {
        if !self.playing {
            return false;
        }
        let moved = self.seek(self.cursor + 1);
        if self.cursor >= self.last_index() {
            self.playing = false;
        }
        moved
    }

    /// Ids referenced by the next `window` steps (current one included) that
    /// have no ancestor chain cached yet. Advances the prefetch frontier.
    pub fn prefetch_candidates(&mut self, window: usize, index: &HierarchyIndex) -> Vec<NodeId> {
        let end = self.cursor.saturating_add(window).min(self.steps.len());
        self.frontier = self.frontier.max(end);
        let ids = self.steps[self.cursor.min(end)..end]
            .iter()
            .flat_map(|s| [s.source_id.as_deref(), s.target_id.as_deref()])
            .flatten();
        index.missing(ids)
    }

    /// Playback overlay of the active step against what is currently shown.
    pub fn overlay(&self, view: &ViewState, index: &HierarchyIndex) -> Option<ExecutionOverlay> {
        let step = self.active_step()?;
        let resolve = |id: &Option<NodeId>| {
            id.as_deref()
                .and_then(|id| resolve_visible(id, view, index))
        };
        Some(ExecutionOverlay {
            index: self.cursor,
            step: step.clone(),
            visible_source: resolve(&step.source_id),
            visible_target: resolve(&step.target_id),
        })
    }
}

/// The active step resolved onto visible nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOverlay {
    pub index: usize,
    pub step: TraceStep,
    pub visible_source: Option<NodeId>,
    pub visible_target: Option<NodeId>,
}

impl ExecutionOverlay {
    /// The synthetic execution edge, when both endpoints resolve to distinct
    /// visible nodes.
    pub fn edge(&self) -> Option<GraphEdge> {
        let source = self.visible_source.as_ref()?;
        let target = self.visible_target.as_ref()?;
        if source == target {
            return None;
        }
        Some(GraphEdge::new(EXECUTION_EDGE_ID, source, target, label::EXECUTES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::Subgraph;
    use crate::domain::hierarchy::HierarchyEntry;
    use crate::domain::node::GraphNode;
    use std::collections::HashMap;

    fn action(step: i64, source: Option<&str>, target: &str, message: &str) -> serde_json::Value {
        serde_json::json!({
            "data": {
                "id": format!("Action_{step}"),
                "labels": ["Action"],
                "properties": {
                    "step": step,
                    "sourceId": source,
                    "targetId": target,
                    "timestamp": "10:00:00,001",
                    "type": "call",
                    "parameters": "x=1",
                    "simpleName": format!("{step}: call f"),
                    "message": message
                }
            }
        })
    }

    fn file() -> TraceFile {
        serde_json::from_value(serde_json::json!({
            "elements": {
                "nodes": [
                    {"data": {"id": "Trace_1", "label": ["Trace"], "properties": {"name": "Execution Trace"}}},
                    action(2, Some("op:a"), "op:b", "> b()"),
                    action(1, None, "op:a", "> a()"),
                    action(3, Some("op:b"), "op:c", "< c = \"FAIL\""),
                ],
                "edges": [
                    {"data": {"source": "Trace_1", "target": "Action_1", "label": "contains"}}
                ]
            }
        }))
        .unwrap()
    }

    fn pattern() -> Regex {
        Regex::new(r"(?i)\b(ERROR|FAIL|NOK)\b").unwrap()
    }

    #[test]
    fn steps_are_actions_sorted_by_step() {
        let steps = file().steps();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps.iter().map(|s| s.step).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(steps[0].source_id, None);
        assert_eq!(steps[0].target_id.as_deref(), Some("op:a"));
        assert_eq!(steps[1].step_type, "call");
    }

    #[test]
    fn failure_markers_follow_messages() {
        let player = TracePlayer::new(&file(), &pattern());
        assert_eq!(player.failure_indices(), &[2]);
    }

    #[test]
    fn cursor_is_clamped() {
        let mut player = TracePlayer::new(&file(), &pattern());
        assert_eq!(player.cursor(), 0);
        assert!(player.seek(99));
        assert_eq!(player.cursor(), 2);
        assert!(!player.step(StepDirection::Next));
        assert!(player.step(StepDirection::First));
        assert!(!player.step(StepDirection::Previous));
        assert_eq!(player.cursor(), 0);
    }

    #[test]
    fn playback_stops_at_last_step() {
        let mut player = TracePlayer::new(&file(), &pattern());
        assert!(player.play());
        assert!(player.tick());
        assert!(player.is_playing());
        assert!(player.tick());
        assert!(!player.is_playing());
        assert!(!player.tick());
        assert!(!player.play());
    }

    #[test]
    fn empty_trace_has_no_active_step() {
        let mut player = TracePlayer::new(&TraceFile::default(), &pattern());
        assert!(player.is_empty());
        assert!(!player.seek(5));
        assert!(player.active_step().is_none());
        assert!(!player.play());
    }

    #[test]
    fn prefetch_candidates_skip_cached_ids_and_advance_frontier() {
        let mut player = TracePlayer::new(&file(), &pattern());
        let index = HierarchyIndex::new();
        index.merge(HashMap::from([("op:a".to_string(), HierarchyEntry::new(["F"]))]));

        let ids = player.prefetch_candidates(2, &index);
        assert_eq!(ids, vec!["op:b".to_string()]);
        assert_eq!(player.prefetch_frontier(), 2);

        player.seek(2);
        let ids = player.prefetch_candidates(100, &index);
        assert_eq!(ids, vec!["op:b".to_string(), "op:c".to_string()]);
        assert_eq!(player.prefetch_frontier(), 3);

        player.seek(0);
        player.prefetch_candidates(1, &index);
        assert_eq!(player.prefetch_frontier(), 3);
    }

    #[test]
    fn unbounded_prefetch_window_reaches_the_last_step() {
        let mut player = TracePlayer::new(&file(), &pattern());
        player.seek(1);
        let ids = player.prefetch_candidates(usize::MAX, &HierarchyIndex::new());
        assert_eq!(ids, vec!["op:a".to_string(), "op:b".to_string(), "op:c".to_string()]);
        assert_eq!(player.prefetch_frontier(), 3);
    }

    #[test]
    fn overlay_resolves_hidden_endpoints() {
        let view = ViewState::from_roots(Subgraph::new(
            vec![GraphNode::new("F"), GraphNode::new("G")],
            vec![],
        ));
        let index = HierarchyIndex::new();
        index.merge(HashMap::from([
            ("op:a".to_string(), HierarchyEntry::new(["F"])),
            ("op:b".to_string(), HierarchyEntry::new(["G"])),
        ]));
        let mut player = TracePlayer::new(&file(), &pattern());

        let first = player.overlay(&view, &index).unwrap();
        assert_eq!(first.visible_source, None);
        assert_eq!(first.visible_target.as_deref(), Some("F"));
        assert!(first.edge().is_none());

        player.seek(1);
        let second = player.overlay(&view, &index).unwrap();
        let edge = second.edge().unwrap();
        assert_eq!((edge.source_id.as_str(), edge.target_id.as_str()), ("F", "G"));
        assert_eq!(edge.id, EXECUTION_EDGE_ID);

        player.seek(2);
        let third = player.overlay(&view, &index).unwrap();
        assert_eq!(third.visible_source.as_deref(), Some("G"));
        assert_eq!(third.visible_target, None);
    }
}
