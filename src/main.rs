use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};

use email_sequencer::{
    config::Config,
    gemini::GeminiClient,
    generator::SequenceGenerator,
    routes::{build_router, AppState},
    session::Session,
    settings::SettingsStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    if config.gemini.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; generation requests will be rejected until it is configured");
    }
    tracing::info!(
        model = %config.gemini.model,
        timeout_secs = config.gemini.timeout.as_secs(),
        max_retries = config.gemini.retry.max_retries,
        "Gemini client configured"
    );

    let gemini = GeminiClient::new(&config.gemini).context("failed to create Gemini client")?;
    let state = AppState {
        session: Session::new(),
        generator: SequenceGenerator::new(Arc::new(gemini)),
        settings: Arc::new(SettingsStore::open(&config.settings_path)),
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
