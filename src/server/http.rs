use crate::app::dto::*;
use crate::app::session::GraphSession;
use crate::domain::error::ViewError;
use anyhow::Result;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[derive(Clone)]
pub struct HttpState {
    pub session: GraphSession,
}

#[derive(Debug, Clone, serde::Serialize)]
struct ApiErrorBody {
    error: String,
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> impl IntoResponse {
    (status, Json(ApiErrorBody { error: msg.into() }))
}

fn view_error(e: ViewError) -> Response {
    let status = match &e {
        ViewError::UnknownNode(_) | ViewError::UnknownFeature(_) => StatusCode::NOT_FOUND,
        ViewError::FetchFailed { .. } => StatusCode::BAD_GATEWAY,
        ViewError::StaleResponse { .. } | ViewError::NoTraceLoaded | ViewError::SessionClosed => {
            StatusCode::BAD_REQUEST
        }
    };
    api_error(status, e.to_string()).into_response()
}

pub fn build_router(session: GraphSession) -> Router {
    let state = Arc::new(HttpState { session });

    Router::new()
        .route("/health", get(health))
        .route("/frame", get(frame))
        .route("/features", get(features))
        .route("/nodes/toggle", post(toggle_node))
        .route("/lock/toggle", post(toggle_lock))
        .route("/lock/clear", post(clear_lock))
        .route("/filters/edges", post(edge_filter))
        .route("/features/toggle", post(toggle_feature))
        .route("/traces", get(traces))
        .route("/trace/select", post(select_trace))
        .route("/trace/seek", post(seek))
        .route("/trace/step", post(step))
        .route("/trace/play", post(play))
        .route("/trace/pause", post(pause))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(session: GraphSession, addr: SocketAddr) -> Result<()> {
    let app = build_router(session);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(state.session.health().await)
}

async fn frame(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(state.session.frame().await)
}

async fn features(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(state.session.features().to_vec())
}

/// Respond with the current frame once `result` succeeded.
async fn frame_after<T>(state: &HttpState, result: Result<T, ViewError>) -> Response {
    match result {
        Ok(_) => Json(state.session.frame().await).into_response(),
        Err(e) => view_error(e),
    }
}

async fn toggle_node(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<NodeRequest>,
) -> impl IntoResponse {
    match state.session.toggle_node(&req.node_id).await {
        Ok(outcome) => Json(ToggleResponse {
            outcome,
            frame: state.session.frame().await,
        })
        .into_response(),
        Err(e) => view_error(e),
    }
}

async fn toggle_lock(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<NodeRequest>,
) -> impl IntoResponse {
    let result = state.session.toggle_lock(&req.node_id).await;
    frame_after(&state, result).await
}

async fn clear_lock(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let result = state.session.clear_lock().await;
    frame_after(&state, result).await
}

async fn edge_filter(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<EdgeFilterRequest>,
) -> impl IntoResponse {
    let result = state.session.set_edge_visibility(&req.label, req.visible).await;
    frame_after(&state, result).await
}

async fn toggle_feature(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<FeatureToggleRequest>,
) -> impl IntoResponse {
    let result = state.session.toggle_feature(req.feature_id).await;
    frame_after(&state, result).await
}

async fn traces(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    match state.session.traces().await {
        Ok(res) => Json(res).into_response(),
        Err(e) => view_error(e),
    }
}

async fn select_trace(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<TraceSelectRequest>,
) -> impl IntoResponse {
    let result = state.session.select_trace(req.trace_id).await;
    frame_after(&state, result).await
}

async fn seek(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<SeekRequest>,
) -> impl IntoResponse {
    let result = state.session.seek(req.index).await;
    frame_after(&state, result).await
}

async fn step(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<StepRequest>,
) -> impl IntoResponse {
    let result = state.session.step(req.direction).await;
    frame_after(&state, result).await
}

async fn play(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let result = state.session.play().await;
    frame_after(&state, result).await
}

async fn pause(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let result = state.session.pause().await;
    frame_after(&state, result).await
}
