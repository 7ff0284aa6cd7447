use anyhow::Context;
use ecotag_scan::{OpenAiExtractor, ResponseCache, ScanHistory, TagPipeline};
use ecotag_server::{build_router, AppState, LogFormat, ServerConfig};
use std::sync::Arc;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new("ecotag-server".into(), std::io::stdout))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
    }
    let db = ecotag_storage::create_db(&db_path, config.db_max_connections)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    tracing::info!("Database ready at {}", db_path.display());

    let factors = config.factor_table().context("Failed to load emission factors")?;

    let settings = config.openai.settings();
    if settings.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; tag analysis will fail with UPSTREAM_ERROR");
    }
    let extractor = OpenAiExtractor::new(settings).context("Failed to build AI provider client")?;

    let pipeline = TagPipeline::new(
        Arc::new(extractor),
        ResponseCache::new(db.clone(), config.cache_max_entries),
        Arc::new(factors),
    )
    .with_history(ScanHistory::new(db));

    let app = build_router(AppState::new(pipeline), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!("EcoTag server listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
