mod config;
mod errors;
mod features;
mod kb;
mod ranking;
mod resolver;
mod routes;
mod scoring;
mod state;
mod tips;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::kb::KbHandle;
use crate::routes::build_router;
use crate::scoring::remote::RemoteScorer;
use crate::scoring::{AdmissionScorer, HeuristicScorer};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let crate_name = env!("CARGO_PKG_NAME").replace('-', "_");
            EnvFilter::new(format!("{}={}", crate_name, &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Unimatch API v{}", env!("CARGO_PKG_VERSION"));

    // Load the KB snapshot (empty KB is tolerated at startup)
    let kb = KbHandle::load(&config.kb_path);
    info!("Knowledge base loaded: {} programs", kb.snapshot().len());

    // Select the scorer backend (RemoteScorer wraps the heuristic fallback)
    let scorer: Arc<dyn AdmissionScorer> = match &config.scorer_url {
        Some(url) if config.use_remote_scorer => {
            info!("Remote scorer enabled: {url}");
            Arc::new(RemoteScorer::new(
                url.clone(),
                Duration::from_secs(config.scorer_timeout_secs),
            ))
        }
        _ => {
            info!("Using local heuristic scorer");
            Arc::new(HeuristicScorer)
        }
    };

    // Build app state
    let state = AppState {
        kb,
        scorer,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
