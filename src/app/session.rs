use crate::app::controller::{TransitionOutcome, ViewController};
use crate::app::dto::HealthResponse;
use crate::app::playback::Prefetcher;
use crate::app::projection::{FrameInputs, RenderFrame, TraceFrame, render};
use crate::config::SessionConfig;
use crate::domain::error::ViewError;
use crate::domain::feature::Feature;
use crate::domain::hierarchy::HierarchyIndex;
use crate::domain::lock::{LockedScope, apply_lock};
use crate::domain::node::{FeatureId, NodeId, ProjectId};
use crate::domain::ports::GraphStore;
use crate::domain::trace::{StepDirection, TraceId, TracePlayer, TraceSummary};
use anyhow::Result;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Everything that belongs to one open project.
///
/// Cloning shares the session. The view, lock, filters and playback cursor
/// sit behind one async mutex so transitions are applied one at a time; the
/// hierarchy index and the feature catalogue are append-only and read
/// without it. Closing the session stops playback, and nothing fetched for a
/// closed session is applied afterwards.
#[derive(Clone)]
pub struct GraphSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    project: ProjectId,
    config: SessionConfig,
    failure_pattern: Regex,
    store: Arc<dyn GraphStore>,
    hierarchy: HierarchyIndex,
    prefetcher: Prefetcher,
    features: Vec<Feature>,
    closed: AtomicBool,
    state: Mutex<SessionState>,
}

struct SessionState {
    controller: ViewController,
    locked: LockedScope,
    active_features: BTreeSet<FeatureId>,
    hidden_labels: BTreeSet<String>,
    catalogue: Option<Vec<TraceSummary>>,
    trace: Option<LoadedTrace>,
    /// Bumped whenever playback is started, paused or replaced; a timer only
    /// ticks while its epoch is current.
    playback_epoch: u64,
    pending_prefetch: Option<JoinHandle<Result<usize, ViewError>>>,
}

struct LoadedTrace {
    id: TraceId,
    player: TracePlayer,
}

impl GraphSession {
    /// Load roots, their aggregates and the feature catalogue of `project`.
    pub async fn open(
        store: Arc<dyn GraphStore>,
        project: ProjectId,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let failure_pattern = config.failure_regex()?;
        let controller = ViewController::load(store.clone(), project).await?;
        let features = store
            .fetch_features(project)
            .await
            .map_err(|e| ViewError::fetch("fetch_features", e))?;

        let hierarchy = HierarchyIndex::new();
        let prefetcher = Prefetcher::new(store.clone(), project, hierarchy.clone());
        info!(project, features = features.len(), "session opened");

        Ok(Self {
            inner: Arc::new(SessionInner {
                project,
                config,
                failure_pattern,
                store,
                hierarchy,
                prefetcher,
                features,
                closed: AtomicBool::new(false),
                state: Mutex::new(SessionState {
                    controller,
                    locked: LockedScope::new(),
                    active_features: BTreeSet::new(),
                    hidden_labels: BTreeSet::new(),
                    catalogue: None,
                    trace: None,
                    playback_epoch: 0,
                    pending_prefetch: None,
                }),
            }),
        })
    }

    pub fn project(&self) -> ProjectId {
        self.inner.project
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn features(&self) -> &[Feature] {
        &self.inner.features
    }

    pub fn hierarchy(&self) -> &HierarchyIndex {
        &self.inner.hierarchy
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.inner.state.lock().await;
        let view = state.controller.state();
        HealthResponse {
            project_id: self.inner.project,
            node_count: view.node_count(),
            edge_count: view.edge_count(),
            feature_count: self.inner.features.len(),
            hierarchy_entries: self.inner.hierarchy.len(),
            trace_loaded: state.trace.as_ref().map(|t| t.id),
            closed: self.is_closed(),
        }
    }

    pub async fn frame(&self) -> RenderFrame {
        let state = self.inner.state.lock().await;
        self.build_frame(&state)
    }

    pub async fn toggle_node(&self, node_id: &str) -> Result<TransitionOutcome, ViewError> {
        self.transition(node_id, Transition::Toggle).await
    }

    pub async fn expand(&self, node_id: &str) -> Result<TransitionOutcome, ViewError> {
        self.transition(node_id, Transition::Expand).await
    }

    pub async fn collapse(&self, node_id: &str) -> Result<TransitionOutcome, ViewError> {
        self.transition(node_id, Transition::Collapse).await
    }

    async fn transition(&self, node_id: &str, kind: Transition) -> Result<TransitionOutcome, ViewError> {
        self.ensure_open()?;
        let mut state = self.inner.state.lock().await;
        let planned = match kind {
            Transition::Toggle => state.controller.plan_toggle(node_id).await?,
            Transition::Expand => state.controller.plan_expand(node_id).await?,
            Transition::Collapse => state.controller.plan_collapse(node_id).await?,
        };
        // Closed while the fetch was outstanding: drop the plan.
        self.ensure_open()?;
        let outcome = state.controller.apply(planned);

        if matches!(outcome, TransitionOutcome::Collapsed { .. }) {
            let SessionState {
                controller, locked, ..
            } = &mut *state;
            let view = controller.state();
            let dropped = locked.retain(|id| view.contains(id));
            if dropped > 0 {
                debug!(dropped, "lock roots left the view");
            }
        }
        Ok(outcome)
    }

    /// Lock or unlock a visible node. Returns whether it is locked afterwards.
    pub async fn toggle_lock(&self, node_id: &str) -> Result<bool, ViewError> {
        self.ensure_open()?;
        let mut state = self.inner.state.lock().await;
        if !state.controller.state().contains(node_id) {
            return Err(ViewError::UnknownNode(node_id.to_string()));
        }
        let locked = state.locked.toggle(node_id);
        info!(node_id, locked, roots = state.locked.roots().len(), "lock toggled");
        Ok(locked)
    }

    pub async fn clear_lock(&self) -> Result<(), ViewError> {
        self.ensure_open()?;
        self.inner.state.lock().await.locked.clear();
        Ok(())
    }

    /// Show or hide edges of one relationship type.
    pub async fn set_edge_visibility(&self, label: &str, visible: bool) -> Result<(), ViewError> {
        self.ensure_open()?;
        let mut state = self.inner.state.lock().await;
        if visible {
            state.hidden_labels.remove(label);
        } else {
            state.hidden_labels.insert(label.to_string());
        }
        Ok(())
    }

    /// Add a feature to the active set or remove it. Returns whether it is
    /// active afterwards.
    pub async fn toggle_feature(&self, feature_id: FeatureId) -> Result<bool, ViewError> {
        self.ensure_open()?;
        if !self.inner.features.iter().any(|f| f.id == feature_id) {
            return Err(ViewError::UnknownFeature(feature_id));
        }
        let mut state = self.inner.state.lock().await;
        let active = if state.active_features.remove(&feature_id) {
            false
        } else {
            state.active_features.insert(feature_id)
        };
        Ok(active)
    }

    /// The trace catalogue, fetched once per session.
    pub async fn traces(&self) -> Result<Vec<TraceSummary>, ViewError> {
        self.ensure_open()?;
        let mut state = self.inner.state.lock().await;
        if let Some(catalogue) = &state.catalogue {
            return Ok(catalogue.clone());
        }
        let catalogue = self
            .inner
            .store
            .list_traces(self.inner.project)
            .await
            .map_err(|e| ViewError::fetch("list_traces", e))?;
        state.catalogue = Some(catalogue.clone());
        Ok(catalogue)
    }

    /// Load a trace, put the cursor on its first step and start filling the
    /// hierarchy index. Returns the number of steps. A failed fetch keeps
    /// the previously selected trace.
    pub async fn select_trace(&self, trace_id: TraceId) -> Result<usize, ViewError> {
        self.ensure_open()?;
        let file = self
            .inner
            .store
            .fetch_trace_file(trace_id)
            .await
            .map_err(|e| {
                warn!(trace_id, error = %format!("{e:#}"), "trace fetch failed");
                ViewError::fetch("fetch_trace_file", e)
            })?;
        let player = TracePlayer::new(&file, &self.inner.failure_pattern);
        let steps = player.len();

        let mut state = self.inner.state.lock().await;
        self.ensure_open()?;
        state.playback_epoch += 1;
        state.trace = Some(LoadedTrace {
            id: trace_id,
            player,
        });
        info!(
            trace_id,
            steps,
            failures = state.trace.as_ref().map_or(0, |t| t.player.failure_indices().len()),
            "trace selected"
        );
        self.schedule_prefetch(&mut state);
        Ok(steps)
    }

    /// Move the cursor (clamped). Returns the new cursor.
    pub async fn seek(&self, index: usize) -> Result<usize, ViewError> {
        self.move_cursor(|player| player.seek(index)).await
    }

    pub async fn step(&self, direction: StepDirection) -> Result<usize, ViewError> {
        self.move_cursor(|player| player.step(direction)).await
    }

    async fn move_cursor(&self, f: impl FnOnce(&mut TracePlayer) -> bool) -> Result<usize, ViewError> {
        self.ensure_open()?;
        let mut state = self.inner.state.lock().await;
        let trace = state.trace.as_mut().ok_or(ViewError::NoTraceLoaded)?;
        let moved = f(&mut trace.player);
        let cursor = trace.player.cursor();
        if moved {
            debug!(cursor, "cursor moved");
            self.schedule_prefetch(&mut state);
        }
        Ok(cursor)
    }

    /// Start auto-advance. Returns false when already on the last step.
    pub async fn play(&self) -> Result<bool, ViewError> {
        self.ensure_open()?;
        let mut state = self.inner.state.lock().await;
        let trace = state.trace.as_mut().ok_or(ViewError::NoTraceLoaded)?;
        if !trace.player.play() {
            return Ok(false);
        }
        state.playback_epoch += 1;
        self.spawn_playback(state.playback_epoch);
        info!(interval_ms = self.inner.config.playback_interval_ms, "playback started");
        Ok(true)
    }

    pub async fn pause(&self) -> Result<(), ViewError> {
        self.ensure_open()?;
        let mut state = self.inner.state.lock().await;
        let trace = state.trace.as_mut().ok_or(ViewError::NoTraceLoaded)?;
        trace.player.pause();
        state.playback_epoch += 1;
        Ok(())
    }

    /// Wait for the most recently scheduled ancestor lookup, if any.
    pub async fn wait_prefetch(&self) -> Option<Result<usize, ViewError>> {
        let handle = self.inner.state.lock().await.pending_prefetch.take()?;
        Some(handle.await.unwrap_or_else(|e| {
            Err(ViewError::FetchFailed {
                operation: "fetch_ancestor_chains",
                message: e.to_string(),
            })
        }))
    }

    /// Stop playback and discard the view. Later calls fail with
    /// [`ViewError::SessionClosed`].
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut state = self.inner.state.lock().await;
        state.playback_epoch += 1;
        state.trace = None;
        state.pending_prefetch = None;
        state.locked.clear();
        state.active_features.clear();
        info!(project = self.inner.project, "session closed");
    }

    fn ensure_open(&self) -> Result<(), ViewError> {
        if self.is_closed() {
            Err(ViewError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn schedule_prefetch(&self, state: &mut SessionState) {
        let Some(trace) = state.trace.as_mut() else {
            return;
        };
        let ids = trace
            .player
            .prefetch_candidates(self.inner.config.prefetch_window, &self.inner.hierarchy);
        if ids.is_empty() {
            return;
        }
        debug!(missing = ids.len(), frontier = trace.player.prefetch_frontier(), "prefetching ancestors");
        if let Some(handle) = self.inner.prefetcher.schedule(ids) {
            state.pending_prefetch = Some(handle);
        }
    }

    fn spawn_playback(&self, epoch: u64) {
        let session: Weak<SessionInner> = Arc::downgrade(&self.inner);
        let interval = self.inner.config.playback_interval();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(inner) = session.upgrade() else {
                    break;
                };
                let current = GraphSession { inner };
                if !current.tick(epoch).await {
                    break;
                }
            }
        });
    }

    /// One auto-advance step. Returns whether the timer should keep going.
    async fn tick(&self, epoch: u64) -> bool {
        if self.is_closed() {
            return false;
        }
        let mut state = self.inner.state.lock().await;
        if state.playback_epoch != epoch {
            return false;
        }
        let Some(trace) = state.trace.as_mut() else {
            return false;
        };
        let moved = trace.player.tick();
        let playing = trace.player.is_playing();
        if moved {
            self.schedule_prefetch(&mut state);
        }
        if !playing {
            debug!("playback reached the last step");
        }
        playing
    }

    fn build_frame(&self, state: &SessionState) -> RenderFrame {
        let view = state.controller.state();
        let trace = state.trace.as_ref().map(|t| {
            let shown = apply_lock(view, &state.locked);
            let overlay = t.player.overlay(&shown, &self.inner.hierarchy);
            TraceFrame {
                trace_id: t.id,
                cursor: t.player.cursor(),
                length: t.player.len(),
                playing: t.player.is_playing(),
                failure_indices: t.player.failure_indices().to_vec(),
                prefetch_frontier: t.player.prefetch_frontier(),
                step: None,
                visible_source: None,
                visible_target: None,
            }
            .with_overlay(overlay.as_ref())
        });
        render(FrameInputs {
            view,
            locked: &state.locked,
            hidden_labels: &state.hidden_labels,
            aggregate_label: &self.inner.config.aggregate_label,
            active_features: &state.active_features,
            trace,
        })
    }

    /// Ids of the nodes currently in the (unlocked) view.
    pub async fn visible_ids(&self) -> Vec<NodeId> {
        self.inner.state.lock().await.controller.state().visible_ids()
    }
}

#[derive(Clone, Copy)]
enum Transition {
    Toggle,
    Expand,
    Collapse,
}
