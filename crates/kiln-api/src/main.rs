//! Kiln API Server

use anyhow::Context as _;
use clap::Parser;
use kiln_api::services::{AzureBlobStore, BlobStoreConfig, GitHubConfig, GitHubFeed};
use kiln_api::{AppState, routes};
use kiln_core::{Clock, SystemClock};
use kiln_db::{PgSnapshotRepo, create_pool, run_migrations};
use kiln_executor::{BatchCluster, BatchClusterConfig};
use kiln_scheduler::{Gateways, RetryPolicy, Settings, SnapshotService};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kiln-server")]
#[command(about = "Kiln snapshot build server", long_about = None)]
struct Args {
    /// Path to the system configuration
    #[arg(short, long, env = "KILN_CONFIG", default_value = "kiln.kdl")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = kiln_config::load_system_config(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    info!(path = %args.config.display(), "Configuration loaded");

    // Create database pool
    info!("Connecting to database...");
    let pool = create_pool(&config.database.url, config.database.max_connections).await?;
    run_migrations(&pool).await?;
    info!("Database connected");

    let timeout = config.http.timeout();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let source = GitHubFeed::new(GitHubConfig::from_config(&config.source, timeout)?)?;
    let cluster = BatchCluster::new(BatchClusterConfig {
        endpoint: config.cluster.endpoint.clone(),
        api_version: config.cluster.api_version.clone(),
        token: config.cluster.token.clone(),
        timeout,
    })?;
    let store = AzureBlobStore::new(
        BlobStoreConfig::from_config(&config.storage, timeout)?,
        clock.clone(),
    )?;

    let service = SnapshotService::new(
        Gateways {
            registry: Arc::new(PgSnapshotRepo::new(pool)),
            source: Arc::new(source),
            cluster: Arc::new(cluster),
            store: Arc::new(store),
            clock,
        },
        Settings::from_config(&config),
        RetryPolicy::from_config(&config.http),
    );

    // Build router
    let app = routes::router(AppState::new(service)).layer(TraceLayer::new_for_http());

    // Start server
    info!(listen = %config.server.listen, public_url = %config.server.public_url, "Starting server");
    let listener = TcpListener::bind(config.server.listen.as_str()).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
