use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pixboard::config::{Cli, Config};
use pixboard::db;
use pixboard::routes;
use pixboard::scrape::HttpMetadataFetcher;
use pixboard::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let fetcher = HttpMetadataFetcher::new(&config.scraper)?;
    let state = AppState::new(pool, config.clone(), Arc::new(fetcher));

    // Tags come from config; the app never edits them
    for seed in &config.tags {
        let tag = state.content.upsert_tag(seed).await?;
        tracing::debug!(slug = %tag.slug, "Tag seeded");
    }
    tracing::info!("{} tags configured", config.tags.len());

    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
