//! Client for the backing graph service.
//!
//! Paths are relative to the service's API root (for example
//! `http://localhost:8000/api`).

use crate::domain::edge::{AggregatedEdge, GraphEdge};
use crate::domain::feature::Feature;
use crate::domain::graph::Subgraph;
use crate::domain::hierarchy::HierarchyEntry;
use crate::domain::node::{GraphNode, NodeId, ProjectId};
use crate::domain::ports::GraphStore;
use crate::domain::trace::{TraceFile, TraceId, TraceSummary};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct GraphData {
    #[serde(default)]
    nodes: Vec<GraphNode>,
    #[serde(default)]
    edges: Vec<EdgeResponse>,
}

#[derive(Debug, Deserialize)]
struct EdgeResponse {
    db_id: i64,
    source_id: NodeId,
    target_id: NodeId,
    label: String,
}

impl From<EdgeResponse> for GraphEdge {
    fn from(e: EdgeResponse) -> Self {
        GraphEdge::new(format!("e_{}", e.db_id), e.source_id, e.target_id, e.label)
    }
}

impl From<GraphData> for Subgraph {
    fn from(data: GraphData) -> Self {
        Subgraph::new(data.nodes, data.edges.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Deserialize)]
struct AggregatedResponse {
    #[serde(default)]
    edges: Vec<AggregatedElement>,
}

#[derive(Debug, Deserialize)]
struct AggregatedElement {
    data: AggregatedEdge,
}

pub struct RestStore {
    http: Client,
    base_url: String,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to request {what}"))?;
        Self::decode(response, what).await
    }

    async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Graph service error {} for {}: {}",
                status,
                what,
                body.chars().take(200).collect::<String>()
            ));
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {what} response"))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        debug!(path, "GET");
        self.send(self.http.get(self.url(path)), what).await
    }

    async fn post_ids<T: DeserializeOwned>(&self, path: &str, ids: &[NodeId], what: &str) -> Result<T> {
        debug!(path, ids = ids.len(), "POST");
        self.send(self.http.post(self.url(path)).json(ids), what).await
    }
}

#[async_trait]
impl GraphStore for RestStore {
    async fn fetch_roots(&self, project: ProjectId) -> Result<Subgraph> {
        let data: GraphData = self
            .get(&format!("/projects/{project}/roots"), "roots")
            .await?;
        Ok(data.into())
    }

    async fn fetch_children(&self, project: ProjectId, parent_id: &str) -> Result<Subgraph> {
        let request = self
            .http
            .get(self.url(&format!("/projects/{project}/children")))
            .query(&[("parent_id", parent_id)]);
        let data: GraphData = self
            .send(request, &format!("children of {parent_id}"))
            .await?;
        Ok(data.into())
    }

    async fn fetch_aggregated_edges(
        &self,
        project: ProjectId,
        visible_ids: &[NodeId],
    ) -> Result<Vec<AggregatedEdge>> {
        let response: AggregatedResponse = self
            .post_ids(
                &format!("/projects/{project}/edges/aggregated"),
                visible_ids,
                "aggregated edges",
            )
            .await?;
        Ok(response.edges.into_iter().map(|e| e.data).collect())
    }

    async fn fetch_ancestor_chains(
        &self,
        project: ProjectId,
        ids: &[NodeId],
    ) -> Result<HashMap<NodeId, HierarchyEntry>> {
        self.post_ids(&format!("/projects/{project}/hierarchy"), ids, "hierarchy")
            .await
    }

    async fn fetch_trace_file(&self, trace: TraceId) -> Result<TraceFile> {
        self.get(&format!("/traces/{trace}/file"), &format!("trace {trace}"))
            .await
    }

    /// Services without a feature catalogue answer 404; that reads as no
    /// features rather than a failure.
    async fn fetch_features(&self, project: ProjectId) -> Result<Vec<Feature>> {
        let path = format!("/projects/{project}/features");
        debug!(path, "GET");
        let response = self
            .http
            .get(self.url(&path))
            .send()
            .await
            .context("Failed to request features")?;
        if response.status() == StatusCode::NOT_FOUND {
            warn!(project, "graph service has no feature catalogue");
            return Ok(Vec::new());
        }
        Self::decode(response, "features").await
    }

    async fn list_traces(&self, project: ProjectId) -> Result<Vec<TraceSummary>> {
        self.get(&format!("/projects/{project}/traces"), "traces")
            .await
    }
}
