//! Mock graph store for integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use hierview::adapters::memory::MemoryStore;
use hierview::domain::edge::AggregatedEdge;
use hierview::domain::feature::Feature;
use hierview::domain::graph::Subgraph;
use hierview::domain::hierarchy::HierarchyEntry;
use hierview::domain::node::{NodeId, ProjectId};
use hierview::domain::ports::GraphStore;
use hierview::domain::trace::{TraceFile, TraceId, TraceSummary};

pub const FETCH_ROOTS: &str = "fetch_roots";
pub const FETCH_CHILDREN: &str = "fetch_children";
pub const FETCH_AGGREGATES: &str = "fetch_aggregated_edges";
pub const FETCH_ANCESTORS: &str = "fetch_ancestor_chains";
pub const FETCH_TRACE: &str = "fetch_trace_file";
pub const FETCH_FEATURES: &str = "fetch_features";
pub const LIST_TRACES: &str = "list_traces";

/// Wraps a [`MemoryStore`], counting calls and failing selected operations
/// on demand. Children and ancestor lookups can be slowed down to hold them
/// in flight.
pub struct ScriptedStore {
    inner: MemoryStore,
    calls: Mutex<HashMap<&'static str, usize>>,
    failing: Mutex<HashSet<&'static str>>,
    children_delay: Option<Duration>,
    ancestor_delay: Option<Duration>,
    ancestor_requests: Mutex<Vec<Vec<NodeId>>>,
}

impl ScriptedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            calls: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            children_delay: None,
            ancestor_delay: None,
            ancestor_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_children_delay(mut self, delay: Duration) -> Self {
        self.children_delay = Some(delay);
        self
    }

    pub fn with_ancestor_delay(mut self, delay: Duration) -> Self {
        self.ancestor_delay = Some(delay);
        self
    }

    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn heal(&self, operation: &'static str) {
        self.failing.lock().unwrap().remove(operation);
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls.lock().unwrap().get(operation).copied().unwrap_or(0)
    }

    pub fn ancestor_requests(&self) -> Vec<Vec<NodeId>> {
        self.ancestor_requests.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str) -> Result<()> {
        *self.calls.lock().unwrap().entry(operation).or_default() += 1;
        if self.failing.lock().unwrap().contains(operation) {
            return Err(anyhow!("{operation}: connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for ScriptedStore {
    async fn fetch_roots(&self, project: ProjectId) -> Result<Subgraph> {
        self.record(FETCH_ROOTS)?;
        self.inner.fetch_roots(project).await
    }

    async fn fetch_children(&self, project: ProjectId, parent_id: &str) -> Result<Subgraph> {
        if let Some(delay) = self.children_delay {
            tokio::time::sleep(delay).await;
        }
        self.record(FETCH_CHILDREN)?;
        self.inner.fetch_children(project, parent_id).await
    }

    async fn fetch_aggregated_edges(
        &self,
        project: ProjectId,
        visible_ids: &[NodeId],
    ) -> Result<Vec<AggregatedEdge>> {
        self.record(FETCH_AGGREGATES)?;
        self.inner.fetch_aggregated_edges(project, visible_ids).await
    }

    async fn fetch_ancestor_chains(
        &self,
        project: ProjectId,
        ids: &[NodeId],
    ) -> Result<HashMap<NodeId, HierarchyEntry>> {
        self.ancestor_requests.lock().unwrap().push(ids.to_vec());
        if let Some(delay) = self.ancestor_delay {
            tokio::time::sleep(delay).await;
        }
        self.record(FETCH_ANCESTORS)?;
        self.inner.fetch_ancestor_chains(project, ids).await
    }

    async fn fetch_trace_file(&self, trace: TraceId) -> Result<TraceFile> {
        self.record(FETCH_TRACE)?;
        self.inner.fetch_trace_file(trace).await
    }

    async fn fetch_features(&self, project: ProjectId) -> Result<Vec<Feature>> {
        self.record(FETCH_FEATURES)?;
        self.inner.fetch_features(project).await
    }

    async fn list_traces(&self, project: ProjectId) -> Result<Vec<TraceSummary>> {
        self.record(LIST_TRACES)?;
        self.inner.list_traces(project).await
    }
}
