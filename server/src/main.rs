//! DeepChain devnet node

use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deepchain_server::config::Config;
use deepchain_server::services::node::NodeService;
use deepchain_server::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deepchain_server=debug,deepchain_ledger=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting DeepChain node");
    tracing::info!("Chain: {}", config.chain_id);
    tracing::info!("Bridge: {}", config.bridge_address);
    tracing::info!("Oracle: {}", config.oracle_address);

    let node = NodeService::new(&config)?;
    let state = AppState::new(config.clone(), node);
    let app = router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
