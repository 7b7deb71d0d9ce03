mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod routes;
mod simulation;
mod state;
mod store;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::db::{create_pool, PgDocumentStore};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::simulation::generator::{LlmProblemSource, ProblemGenerator, ProblemSource};
use crate::simulation::orchestrator::RoundOrchestrator;
use crate::simulation::persistence::PersistenceGateway;
use crate::simulation::session::SessionManager;
use crate::state::AppState;
use crate::store::{DocumentStore, MemoryStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting interview simulator API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;

    // Initialize LLM client (per-request timeout matches the slot timeout)
    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.generation_timeout)
        .context("Failed to build LLM HTTP client")?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let source: Arc<dyn ProblemSource> = Arc::new(LlmProblemSource::new(llm));

    info!(
        "Validation policy: machine_coding>={} system_design>={} theory>={}",
        config.validation_policy.min_machine_coding_fields,
        config.validation_policy.min_system_design_fields,
        config.validation_policy.min_theory_fields
    );

    let sessions = SessionManager::new(
        store.clone(),
        ProblemGenerator::new(source, config.generation_timeout),
        PersistenceGateway::new(store.clone(), config.validation_policy.clone()),
    );
    let orchestrator = RoundOrchestrator::new(store, sessions, config.fetch_timeout);

    // Build app state
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Picks the document store backend from config.
async fn build_store(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres store")?;
            let store = PgDocumentStore::new(create_pool(url).await?);
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory document store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
