use anyhow::Context;
use std::sync::Arc;
use tally_email::{EmailExtractor, GeminiExtractor};
use tally_storage::SqliteStore;

mod config;
mod error;
mod routes;
mod state;
mod telemetry;

use config::ServerConfig;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    telemetry::init(config.log_format)?;

    let settings = config.pipeline_settings()?;
    let store = SqliteStore::open(&config.database_path)
        .await
        .with_context(|| format!("opening database {}", config.database_path.display()))?;

    let extractor: Option<Arc<dyn EmailExtractor>> = match &config.gemini_api_key {
        Some(key) => Some(Arc::new(GeminiExtractor::new(
            key.clone(),
            config.gemini_model.clone(),
        )?)),
        None => {
            tracing::warn!("GEMINI_API_KEY not set, email webhook disabled");
            None
        }
    };
    if config.sepay_api_key.is_none() {
        tracing::warn!("SEPAY_API_KEY not set, payment webhook will reject all requests");
    }

    let state = AppState::new(
        Arc::new(store),
        settings,
        extractor,
        config.sepay_api_key.clone(),
    );
    let app = routes::router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(
        addr = %config.bind_addr,
        database = %config.database_path.display(),
        "tally server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutting down");
}
