use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use risk_agent::config::AppConfig;
use risk_agent::provider::IndexerClient;
use risk_agent::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "risk_agent=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .init();

    println!("================================================");
    println!("           RISK AGENT - Starting Up             ");
    println!("================================================");

    // Load configuration
    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    println!("[CONFIG] Server: {}:{}", config.server.host, config.server.port);
    println!("[CONFIG] Indexer: {}", config.indexer.url);
    println!(
        "[CONFIG] Weights: reputation={} anomaly={} velocity={}",
        config.scoring.weights.reputation(),
        config.scoring.weights.anomaly(),
        config.scoring.weights.velocity()
    );
    println!(
        "[CONFIG] Thresholds: allow={} hold={} escalate={} deny={}",
        config.scoring.thresholds.allow(),
        config.scoring.thresholds.hold(),
        config.scoring.thresholds.escalate(),
        config.scoring.thresholds.deny()
    );
    println!(
        "[CONFIG] Cache TTLs: history={}s stats={}s market={}s velocity={}s",
        config.cache.history_ttl_seconds,
        config.cache.stats_ttl_seconds,
        config.cache.market_ttl_seconds,
        config.cache.velocity_ttl_seconds
    );

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting Risk Agent"
    );

    let indexer = IndexerClient::new(&config.indexer)
        .map_err(|e| anyhow::anyhow!("Failed to create indexer client: {}", e))?;

    let addr: SocketAddr = config.server_addr().parse()?;
    let state = AppState::new(config, Arc::new(indexer));

    println!("[ROUTER] Setting up API routes...");
    let app = create_app(state);
    println!("[ROUTER] Routes configured: /health, /risk/score, /risk/batch, /risk/cache");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    println!("================================================");
    println!("  Server listening on http://{}", addr);
    println!("================================================");
    println!();

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
