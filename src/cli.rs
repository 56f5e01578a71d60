use crate::adapters::fs::load_project;
use crate::adapters::memory::MemoryStore;
use crate::adapters::rest::RestStore;
use crate::app::projection::RenderFrame;
use crate::app::session::GraphSession;
use crate::config::SessionConfig;
use crate::domain::node::{FeatureId, NodeId, ProjectId};
use crate::domain::ports::GraphStore;
use crate::domain::trace::TraceId;
use anyhow::{Context as _, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "hierview", version)]
#[command(about = "Explore large hierarchical code graphs and replay execution traces against them")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve one project session over HTTP
    Serve {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(long, env = "HIERVIEW_ADDR", default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },

    /// Apply a sequence of interactions and print the resulting frame as JSON
    Inspect {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        view: InspectArgs,
    },
}

/// Where the graph comes from, and session tuning.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Project dump (labelled property graph JSON) served from memory
    #[arg(long, conflicts_with = "store_url")]
    pub fixture: Option<PathBuf>,

    /// API root of a running graph service
    #[arg(long, env = "HIERVIEW_STORE_URL")]
    pub store_url: Option<String>,

    /// Project id (defaults to the one recorded in the dump)
    #[arg(long, env = "HIERVIEW_PROJECT")]
    pub project: Option<ProjectId>,

    /// JSON session config
    #[arg(long, env = "HIERVIEW_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "HIERVIEW_PREFETCH_WINDOW")]
    pub prefetch_window: Option<usize>,

    #[arg(long, env = "HIERVIEW_PLAYBACK_INTERVAL_MS")]
    pub playback_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct InspectArgs {
    /// Expand these nodes, in order
    #[arg(long)]
    pub expand: Vec<NodeId>,

    /// Lock these nodes after expanding
    #[arg(long)]
    pub lock: Vec<NodeId>,

    /// Activate these features
    #[arg(long)]
    pub feature: Vec<FeatureId>,

    /// Hide edges with these labels
    #[arg(long = "hide-edges")]
    pub hide_edges: Vec<String>,

    /// Load this trace
    #[arg(long)]
    pub trace: Option<TraceId>,

    /// Put the trace cursor on this step index
    #[arg(long, requires = "trace")]
    pub step: Option<usize>,
}

impl SourceArgs {
    /// Defaults, then the config file, then flags and env overrides.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let mut config = SessionConfig::load_or_default(self.config.as_deref())?;
        if let Some(window) = self.prefetch_window {
            config.prefetch_window = window;
        }
        if let Some(ms) = self.playback_interval_ms {
            config.playback_interval_ms = ms;
        }
        config.validate()?;
        Ok(config)
    }

    /// Build the store and settle which project to open.
    pub fn open_store(&self, config: &SessionConfig) -> Result<(Arc<dyn GraphStore>, ProjectId)> {
        match (&self.fixture, &self.store_url) {
            (Some(path), _) => {
                let loaded = load_project(path)?;
                let project = self.project.unwrap_or(loaded.project);
                let store: MemoryStore = loaded.store.with_aggregate_label(&config.aggregate_label);
                Ok((Arc::new(store), project))
            }
            (None, Some(url)) => {
                let project = self
                    .project
                    .context("--project is required with --store-url")?;
                Ok((Arc::new(RestStore::new(url.as_str())?), project))
            }
            (None, None) => bail!("Either --fixture or --store-url is required"),
        }
    }

    pub async fn open_session(&self) -> Result<GraphSession> {
        let config = self.session_config()?;
        let (store, project) = self.open_store(&config)?;
        GraphSession::open(store, project, config)
            .await
            .with_context(|| format!("Failed to open project {project}"))
    }
}

/// Replay `args` against a fresh session and return the final frame.
pub async fn inspect(session: &GraphSession, args: &InspectArgs) -> Result<RenderFrame> {
    for id in &args.expand {
        session
            .expand(id)
            .await
            .with_context(|| format!("Failed to expand {id}"))?;
    }
    for id in &args.lock {
        session
            .toggle_lock(id)
            .await
            .with_context(|| format!("Failed to lock {id}"))?;
    }
    for feature in &args.feature {
        session.toggle_feature(*feature).await?;
    }
    for label in &args.hide_edges {
        session.set_edge_visibility(label, false).await?;
    }
    if let Some(trace) = args.trace {
        session
            .select_trace(trace)
            .await
            .with_context(|| format!("Failed to load trace {trace}"))?;
        settle_prefetch(session).await?;
        if let Some(step) = args.step {
            session.seek(step).await?;
            settle_prefetch(session).await?;
        }
    }
    Ok(session.frame().await)
}

async fn settle_prefetch(session: &GraphSession) -> Result<()> {
    if let Some(result) = session.wait_prefetch().await {
        result.context("Ancestor prefetch failed")?;
    }
    Ok(())
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve { source, addr } => {
            let session = source.open_session().await?;
            crate::server::http::serve(session, addr).await
        }
        Commands::Inspect { source, view } => {
            let session = source.open_session().await?;
            let frame = inspect(&session, &view).await?;
            session.close().await;
            println!("{}", serde_json::to_string_pretty(&frame)?);
            Ok(())
        }
    }
}
