//! Startup: bring the graph up from the stored snapshot, or recover.

use std::fmt;

use lds_graph::GraphStore;

use crate::config::DiscoveryConfig;
use crate::error::Result;
use crate::persist::PersistenceCoordinator;

/// How the graph came up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The stored snapshot verified and was imported.
    Restored,
    /// No usable snapshot: the graph was seeded or bootstrapped and written.
    Recovered,
    /// The graph could not be initialized. Requests are answered with
    /// FAILED_PRECONDITION.
    Failed,
}

impl fmt::Display for InitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restored => write!(f, "restored"),
            Self::Recovered => write!(f, "recovered"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Restore the graph from its snapshot, falling back to the seed file and
/// then to an empty registry for the configured authority.
pub async fn initialize(
    graph: &GraphStore,
    persistence: &PersistenceCoordinator,
    config: &DiscoveryConfig,
) -> InitOutcome {
    match restore(graph, persistence).await {
        Ok(true) => return InitOutcome::Restored,
        Ok(false) => {
            tracing::info!(snapshot = %persistence.snapshot_name(), "No snapshot found");
        }
        Err(e) => {
            tracing::warn!(
                snapshot = %persistence.snapshot_name(),
                error = %e,
                "Stored snapshot unusable, recovering"
            );
        }
    }

    if let Some(seed) = &config.seed_file {
        match seed_from_file(graph, seed).await {
            Ok(()) => {
                persistence.persist_or_degrade().await;
                return InitOutcome::Recovered;
            }
            Err(e) => {
                tracing::warn!(seed_file = %seed, error = %e, "Failed to load seed file");
            }
        }
    }

    if let Err(e) = graph.init(&config.authority) {
        tracing::error!(authority = %config.authority, error = %e, "Failed to initialize registry");
        return InitOutcome::Failed;
    }
    persistence.persist_or_degrade().await;
    InitOutcome::Recovered
}

async fn restore(graph: &GraphStore, persistence: &PersistenceCoordinator) -> Result<bool> {
    let Some(snapshot) = persistence.restore().await? else {
        return Ok(false);
    };
    graph.import(&snapshot.graph_text()?)?;
    tracing::info!(
        authority = %snapshot.authority,
        written_at = %snapshot.written_at,
        "Registry restored from snapshot"
    );
    Ok(true)
}

async fn seed_from_file(graph: &GraphStore, path: &str) -> Result<()> {
    let text = tokio::fs::read_to_string(path).await?;
    graph.import(&text)?;
    tracing::info!(seed_file = %path, "Registry seeded");
    Ok(())
}
