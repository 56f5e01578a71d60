use crate::domain::error::ViewError;
use crate::domain::hierarchy::HierarchyIndex;
use crate::domain::node::{NodeId, ProjectId};
use crate::domain::ports::GraphStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Keeps the hierarchy index filled ahead of the trace cursor.
///
/// At most one batched ancestor lookup is outstanding at any time. A request
/// made while one is in flight is dropped; the next cursor move rescans and
/// asks again for whatever is still missing.
#[derive(Clone)]
pub struct Prefetcher {
    store: Arc<dyn GraphStore>,
    project: ProjectId,
    index: HierarchyIndex,
    in_flight: Arc<AtomicBool>,
}

/// Clears the in-flight flag when the lookup finishes, however it finishes.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Prefetcher {
    pub fn new(store: Arc<dyn GraphStore>, project: ProjectId, index: HierarchyIndex) -> Self {
        Self {
            store,
            project,
            index,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start a background lookup for `ids`. Returns `None` when there is
    /// nothing to ask for or another lookup is still outstanding.
    pub fn schedule(&self, ids: Vec<NodeId>) -> Option<JoinHandle<Result<usize, ViewError>>> {
        if ids.is_empty() {
            return None;
        }
        let Some(guard) = InFlight::acquire(&self.in_flight) else {
            debug!(requested = ids.len(), "ancestor lookup already in flight, dropping");
            return None;
        };
        let this = self.clone();
        Some(tokio::spawn(async move {
            let _guard = guard;
            this.lookup(ids).await
        }))
    }

    async fn lookup(&self, ids: Vec<NodeId>) -> Result<usize, ViewError> {
        let chains = self
            .store
            .fetch_ancestor_chains(self.project, &ids)
            .await
            .map_err(|e| {
                warn!(requested = ids.len(), error = %format!("{e:#}"), "ancestor lookup failed");
                ViewError::fetch("fetch_ancestor_chains", e)
            })?;
        let added = self.index.merge(chains);
        debug!(requested = ids.len(), added, cached = self.index.len(), "ancestor chains merged");
        Ok(added)
    }
}
