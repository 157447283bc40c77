//! CLI entry point for the local discovery service.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing_subscriber::{fmt, EnvFilter};

use lds_core::Uri;
use lds_graph::GraphStore;
use lds_snapshot::{Blake3Checksum, FileSnapshotStore, Snapshot, SnapshotStore};

use lds_service::config::DiscoveryConfig;
use lds_service::stdio::{self, StdioTransport};
use lds_service::DiscoveryService;

#[derive(Parser)]
#[command(name = "lds")]
#[command(about = "Local discovery service: a hierarchical registry with change notifications")]
struct Cli {
    /// Config file prefix (default: lds).
    #[arg(short, long, default_value = "lds", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve requests as JSON lines on stdin/stdout.
    Serve,
    /// Verify the stored snapshot and print (part of) the registry.
    Inspect {
        /// Node to print (default: the root authority).
        #[arg(long)]
        uri: Option<String>,

        /// Levels of descendants to include; negative for all.
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        depth: i32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr: stdout carries the transport.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = DiscoveryConfig::load(&cli.config)?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Inspect { uri, depth } => inspect(&config, uri.as_deref(), depth),
    }
}

async fn serve(config: DiscoveryConfig) -> anyhow::Result<()> {
    let store = FileSnapshotStore::new(config.data_path())?;
    let transport = Arc::new(StdioTransport::stdout());
    let service = Arc::new(
        DiscoveryService::start(config, transport, Arc::new(store), Arc::new(Blake3Checksum))
            .await?,
    );

    let input = BufReader::new(tokio::io::stdin());
    let result = tokio::select! {
        result = stdio::serve(Arc::clone(&service), input) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            Ok(())
        }
    };

    service.shutdown().await;
    Ok(result?)
}

fn inspect(config: &DiscoveryConfig, uri: Option<&str>, depth: i32) -> anyhow::Result<()> {
    let store = FileSnapshotStore::new(config.data_path())?;
    let text = store.load(&config.snapshot_name)?.ok_or_else(|| {
        anyhow::anyhow!(
            "No snapshot named {} in {}",
            config.snapshot_name,
            config.data_dir
        )
    })?;
    let snapshot = Snapshot::decode(&text, &Blake3Checksum)?;

    let graph = GraphStore::new();
    graph.import(&snapshot.graph_text()?)?;

    let target = match uri {
        Some(raw) => Uri::parse(raw)?,
        None => graph.authority()?,
    };
    let node = graph.find_node(&target, depth)?;

    tracing::info!(
        authority = %snapshot.authority,
        written_at = %snapshot.written_at,
        nodes = graph.node_count()?,
        "Snapshot verified"
    );
    println!("{}", serde_json::to_string_pretty(&node)?);
    Ok(())
}
