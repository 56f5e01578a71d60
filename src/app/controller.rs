use crate::domain::aggregation::filter_aggregates;
use crate::domain::edge::AggregatedEdge;
use crate::domain::error::ViewError;
use crate::domain::node::{NodeId, ProjectId};
use crate::domain::ports::GraphStore;
use crate::domain::view::ViewState;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a successful expand/collapse request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Expanded {
        node_id: NodeId,
        added_nodes: usize,
        added_edges: usize,
        aggregates: usize,
    },
    Collapsed {
        node_id: NodeId,
        removed_nodes: usize,
        aggregates: usize,
    },
    /// The store reported no children: the node stays collapsed and behaves
    /// as a leaf.
    EmptyExpansion { node_id: NodeId },
    /// The node was already in the requested state.
    Unchanged { node_id: NodeId },
}

/// A transition whose fetches have completed but which has not been
/// committed yet. Dropping it leaves the view untouched.
#[derive(Debug)]
pub struct PlannedTransition {
    next: Option<ViewState>,
    outcome: TransitionOutcome,
}

impl PlannedTransition {
    fn unchanged(outcome: TransitionOutcome) -> Self {
        Self { next: None, outcome }
    }
}

/// Expand/collapse state machine over one project's view.
///
/// Every transition fetches what it needs first and only then commits a
/// freshly built [`ViewState`], so a failed fetch leaves the current state
/// exactly as it was. Planning borrows the controller shared; only
/// [`ViewController::apply`] mutates it.
pub struct ViewController {
    store: Arc<dyn GraphStore>,
    project: ProjectId,
    state: ViewState,
}

impl ViewController {
    /// Fetch the project roots and their initial aggregates.
    pub async fn load(store: Arc<dyn GraphStore>, project: ProjectId) -> Result<Self, ViewError> {
        let roots = store
            .fetch_roots(project)
            .await
            .map_err(|e| ViewError::fetch("fetch_roots", e))?;
        let mut controller = Self {
            store,
            project,
            state: ViewState::from_roots(roots),
        };
        controller.refresh_aggregates().await?;
        info!(
            project,
            nodes = controller.state.node_count(),
            edges = controller.state.edge_count(),
            "view loaded"
        );
        Ok(controller)
    }

    pub fn project(&self) -> ProjectId {
        self.project
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Expand a collapsed node, collapse an expanded one.
    pub async fn toggle(&mut self, node_id: &str) -> Result<TransitionOutcome, ViewError> {
        let planned = self.plan_toggle(node_id).await?;
        Ok(self.apply(planned))
    }

    pub async fn expand(&mut self, node_id: &str) -> Result<TransitionOutcome, ViewError> {
        let planned = self.plan_expand(node_id).await?;
        Ok(self.apply(planned))
    }

    pub async fn collapse(&mut self, node_id: &str) -> Result<TransitionOutcome, ViewError> {
        let planned = self.plan_collapse(node_id).await?;
        Ok(self.apply(planned))
    }

    pub async fn plan_toggle(&self, node_id: &str) -> Result<PlannedTransition, ViewError> {
        let expanded = self
            .state
            .node(node_id)
            .ok_or_else(|| ViewError::UnknownNode(node_id.to_string()))?
            .expanded;
        if expanded {
            self.plan_collapse(node_id).await
        } else {
            self.plan_expand(node_id).await
        }
    }

    /// Fetch the children of `node_id` and the aggregates of the resulting
    /// view without touching the current state.
    pub async fn plan_expand(&self, node_id: &str) -> Result<PlannedTransition, ViewError> {
        let node = self
            .state
            .node(node_id)
            .ok_or_else(|| ViewError::UnknownNode(node_id.to_string()))?;
        if node.expanded {
            return Ok(PlannedTransition::unchanged(TransitionOutcome::Unchanged {
                node_id: node_id.to_string(),
            }));
        }

        let children = self
            .store
            .fetch_children(self.project, node_id)
            .await
            .map_err(|e| {
                warn!(node_id, error = %format!("{e:#}"), "children fetch failed");
                ViewError::fetch("fetch_children", e)
            })?;

        let (next, delta) = self.state.with_expansion(node_id, children).inspect_err(|e| {
            warn!(node_id, error = %e, "discarding children response");
        })?;
        if !delta.misplaced_children.is_empty() {
            warn!(
                node_id,
                skipped = ?delta.misplaced_children,
                "store returned children of another parent"
            );
        }
        if delta.added_nodes.is_empty() {
            debug!(node_id, "store returned no new children");
            return Ok(PlannedTransition::unchanged(TransitionOutcome::EmptyExpansion {
                node_id: node_id.to_string(),
            }));
        }
        if delta.suppressed_edges > 0 {
            debug!(node_id, suppressed_edges = delta.suppressed_edges, "dropped dangling child edges");
        }

        let aggregates = self.aggregates_for(&next).await?;
        let outcome = TransitionOutcome::Expanded {
            node_id: node_id.to_string(),
            added_nodes: delta.added_nodes.len(),
            added_edges: delta.added_edges,
            aggregates: aggregates.len(),
        };
        Ok(PlannedTransition {
            next: Some(next.with_aggregates(aggregates)),
            outcome,
        })
    }

    pub async fn plan_collapse(&self, node_id: &str) -> Result<PlannedTransition, ViewError> {
        let node = self
            .state
            .node(node_id)
            .ok_or_else(|| ViewError::UnknownNode(node_id.to_string()))?;
        if !node.expanded {
            return Ok(PlannedTransition::unchanged(TransitionOutcome::Unchanged {
                node_id: node_id.to_string(),
            }));
        }

        let (next, removed) = self.state.with_collapse(node_id)?;
        let aggregates = self.aggregates_for(&next).await?;
        let outcome = TransitionOutcome::Collapsed {
            node_id: node_id.to_string(),
            removed_nodes: removed.len(),
            aggregates: aggregates.len(),
        };
        Ok(PlannedTransition {
            next: Some(next.with_aggregates(aggregates)),
            outcome,
        })
    }

    /// Commit a planned transition. Plans are built against the state they
    /// were fetched for; apply them before any other transition.
    pub fn apply(&mut self, planned: PlannedTransition) -> TransitionOutcome {
        let PlannedTransition { next, outcome } = planned;
        if let Some(next) = next {
            self.commit(next);
        }
        match &outcome {
            TransitionOutcome::Expanded {
                node_id,
                added_nodes,
                added_edges,
                aggregates,
            } => info!(node_id = node_id.as_str(), added_nodes, added_edges, aggregates, "expanded"),
            TransitionOutcome::Collapsed {
                node_id,
                removed_nodes,
                aggregates,
            } => info!(node_id = node_id.as_str(), removed = removed_nodes, aggregates, "collapsed"),
            TransitionOutcome::EmptyExpansion { .. } | TransitionOutcome::Unchanged { .. } => {}
        }
        outcome
    }

    /// Recompute the synthesized edges for the current state.
    pub async fn refresh_aggregates(&mut self) -> Result<(), ViewError> {
        let aggregates = self.aggregates_for(&self.state).await?;
        let next = self.state.clone().with_aggregates(aggregates);
        self.commit(next);
        Ok(())
    }

    async fn aggregates_for(&self, view: &ViewState) -> Result<Vec<AggregatedEdge>, ViewError> {
        if view.is_empty() {
            return Ok(Vec::new());
        }
        let visible = view.visible_ids();
        let raw = self
            .store
            .fetch_aggregated_edges(self.project, &visible)
            .await
            .map_err(|e| {
                warn!(visible = visible.len(), error = %format!("{e:#}"), "aggregate fetch failed");
                ViewError::fetch("fetch_aggregated_edges", e)
            })?;
        let (kept, report) = filter_aggregates(raw, view);
        if !report.rejected.is_empty() {
            debug!(
                kept = report.kept,
                rejected = report.rejected.len(),
                "filtered aggregate results"
            );
        }
        Ok(kept)
    }

    fn commit(&mut self, next: ViewState) {
        for violation in next.violations() {
            warn!(revision = next.revision(), "{violation}");
        }
        self.state = next;
    }
}
