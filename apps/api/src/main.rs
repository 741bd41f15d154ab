mod analysis;
mod config;
mod errors;
mod ingest;
mod llm_client;
mod render;
mod reports;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::ReqwestTransport;
use crate::render::PdfRenderer;
use crate::reports::ReportStore;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JDmatcher API v{}", env!("CARGO_PKG_VERSION"));

    // One pooled HTTP client for every run; credentials are attached per request
    let transport = Arc::new(ReqwestTransport::new());
    info!(
        "LLM transport initialized (model: {}, default mode: {})",
        llm_client::MODEL,
        config.analysis_mode
    );

    let reports = ReportStore::new(config.retention())?;
    let pdf = PdfRenderer::new(config.typst_bin.clone());

    let state = AppState {
        config: config.clone(),
        transport,
        reports,
        pdf,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
