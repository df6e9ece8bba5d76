mod analysis;
mod config;
mod errors;
mod provider;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::analyzer::{ResumeAnalyzer, MODEL_FALLBACK_CHAIN};
use crate::config::Config;
use crate::provider::{AiProvider, GeminiClient};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Matcher API v{}", env!("CARGO_PKG_VERSION"));

    let provider: Option<Arc<dyn AiProvider>> = match &config.gemini_api_key {
        Some(key) => {
            let client = GeminiClient::new(key.clone(), &config.gemini_base_url)?;
            info!(
                "Gemini client initialized (models: {})",
                MODEL_FALLBACK_CHAIN.join(" -> ")
            );
            let provider: Arc<dyn AiProvider> = Arc::new(client);
            Some(provider)
        }
        None => {
            warn!("GEMINI_API_KEY not set; analysis requests will fail until it is configured");
            None
        }
    };

    let state = AppState {
        analyzer: ResumeAnalyzer::new(provider),
        config: config.clone(),
    };
    info!(
        "AI analysis {}",
        if config.ai_enabled() { "enabled" } else { "disabled" }
    );

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
