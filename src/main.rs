use anyhow::Context;
use clap::Parser;
use scurry::config::MeshConfig;
use scurry::mesh::Mesh;
use scurry::node::KeyValueNode;
use scurry::router::build_router;
use scurry::storage::{MemoryStorage, Storage};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "scurry", version, about = "Sharded key/value mesh member")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Member id (generated when omitted).
    #[arg(long, env = "SCURRY_ID")]
    id: Option<String>,

    /// Host to bind and advertise.
    #[arg(long)]
    host: Option<String>,

    /// HTTP API port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Gossip UDP port.
    #[arg(short, long)]
    gossip: Option<u16>,

    /// Gossip address of a member to join through (repeatable).
    #[arg(short, long)]
    seed: Vec<String>,

    /// Ring hash seed; must match across the mesh.
    #[arg(long)]
    ring_seed: Option<u32>,

    /// Ring slots per member; must match across the mesh.
    #[arg(long)]
    ring_size: Option<u32>,

    /// Log level filter (overridden by RUST_LOG).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut MeshConfig) {
        if let Some(id) = self.id {
            config.node.id = Some(id);
        }
        if let Some(host) = self.host {
            config.node.host = host;
        }
        if let Some(port) = self.port {
            config.node.port = port;
        }
        if let Some(gossip) = self.gossip {
            config.node.gossip_port = gossip;
        }
        if !self.seed.is_empty() {
            config.cluster.seeds = self.seed;
        }
        if let Some(ring_seed) = self.ring_seed {
            config.cluster.ring_seed = ring_seed;
        }
        if let Some(ring_size) = self.ring_size {
            config.cluster.ring_size = ring_size;
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = MeshConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    setup_tracing(&config.log.level);

    let local = config.descriptor();
    let http_addr = config.http_addr()?;
    let gossip_addr = config.gossip_addr()?;
    let seeds = config.seed_addrs()?;

    tracing::info!(node = %local.id, %http_addr, %gossip_addr, "Starting member");
    if seeds.is_empty() {
        tracing::info!("No seeds configured, starting as founder");
    } else {
        tracing::info!("Seed members: {:?}", seeds);
    }

    // 1. Local storage:
    let storage = Arc::new(MemoryStorage::new());
    let sweeper = storage.spawn_expiry_sweeper(config.ttl_check_interval());
    let shared_storage: Arc<dyn Storage> = storage.clone();

    // 2. Mesh (gossip + ring):
    let mesh = Arc::new(Mesh::new(
        local,
        shared_storage,
        config.cluster.ring_seed,
        config.cluster.ring_size,
    ));
    mesh.connect(gossip_addr, seeds)
        .await
        .context("failed to start gossip")?;
    mesh.join().await.context("failed to join the mesh")?;

    // 3. Stats reporter:
    let stats_mesh = mesh.clone();
    let stats_storage = storage.clone();
    let stats = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));

        loop {
            interval.tick().await;
            let nodes = stats_mesh.nodes().await;
            tracing::info!(
                "Mesh stats: {} members, {} local items in {} buckets",
                nodes.len(),
                stats_storage.entry_count(),
                stats_storage.bucket_count()
            );
            for node in nodes {
                match node.as_remote() {
                    Some(remote) => tracing::info!("  - {} at {}", node.id(), remote.endpoint()),
                    None => tracing::info!("  - {} (local)", node.id()),
                }
            }
        }
    });

    // 4. HTTP server:
    let app = build_router(mesh.clone());
    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("failed to bind {}", http_addr))?;

    tracing::info!("HTTP server listening on {}", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 5. Leave the mesh:
    stats.abort();
    mesh.disconnect().await?;
    storage.close();
    sweeper.abort();
    tracing::info!("Shutdown complete");

    Ok(())
}

fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
