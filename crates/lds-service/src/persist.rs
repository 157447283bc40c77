//! Snapshot persistence: write the whole graph after each committed mutation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use lds_graph::GraphStore;
use lds_snapshot::{Checksum, Snapshot, SnapshotStore};

use crate::error::Result;

/// Serializes snapshot writes and tracks whether the last one failed.
///
/// The export is taken while holding the write mutex, so whichever write
/// finishes last always carries the latest committed graph.
pub struct PersistenceCoordinator {
    graph: Arc<GraphStore>,
    store: Arc<dyn SnapshotStore>,
    checksum: Arc<dyn Checksum>,
    snapshot_name: String,
    write_lock: Mutex<()>,
    degraded: AtomicBool,
}

impl PersistenceCoordinator {
    pub fn new(
        graph: Arc<GraphStore>,
        store: Arc<dyn SnapshotStore>,
        checksum: Arc<dyn Checksum>,
        snapshot_name: impl Into<String>,
    ) -> Self {
        Self {
            graph,
            store,
            checksum,
            snapshot_name: snapshot_name.into(),
            write_lock: Mutex::new(()),
            degraded: AtomicBool::new(false),
        }
    }

    /// Export, seal, and write the current graph.
    pub async fn persist(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let export = self.graph.export()?;
        let text = Snapshot::from_export(&export, self.checksum.as_ref())?.encode()?;

        let store = Arc::clone(&self.store);
        let name = self.snapshot_name.clone();
        let bytes = text.len();
        tokio::task::spawn_blocking(move || store.save(&name, &text)).await??;

        tracing::debug!(snapshot = %self.snapshot_name, bytes, "Snapshot persisted");
        Ok(())
    }

    /// Persist, logging instead of failing. The in-memory graph stays
    /// authoritative either way; a failure marks the service degraded until
    /// the next successful write.
    pub async fn persist_or_degrade(&self) {
        match self.persist().await {
            Ok(()) => {
                if self.degraded.swap(false, Ordering::SeqCst) {
                    tracing::info!(snapshot = %self.snapshot_name, "Snapshot writes recovered");
                }
            }
            Err(e) => {
                self.degraded.store(true, Ordering::SeqCst);
                tracing::warn!(
                    snapshot = %self.snapshot_name,
                    error = %e,
                    "Failed to persist snapshot, continuing with in-memory graph"
                );
            }
        }
    }

    /// Read and verify the stored snapshot, if any.
    pub async fn restore(&self) -> Result<Option<Snapshot>> {
        let store = Arc::clone(&self.store);
        let name = self.snapshot_name.clone();
        let Some(text) = tokio::task::spawn_blocking(move || store.load(&name)).await?? else {
            return Ok(None);
        };
        Ok(Some(Snapshot::decode(&text, self.checksum.as_ref())?))
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn snapshot_name(&self) -> &str {
        &self.snapshot_name
    }
}
