mod config;
mod corpus;
mod db;
mod errors;
mod generation;
mod grading;
mod grounding;
mod llm_client;
mod models;
mod pipeline;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::corpus::PgCorpusStore;
use crate::db::create_pool;
use crate::grounding::StrictGroundingValidator;
use crate::llm_client::{LlmClient, RetryPolicy};
use crate::pipeline::{PgRunSink, Pipeline};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize LLM client
    let retry = RetryPolicy {
        max_attempts: config.llm_max_retries,
        ..RetryPolicy::default()
    };
    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.llm_timeout, retry)?;
    info!(
        "LLM client initialized (model: {}, timeout: {:?}, attempts: {})",
        llm_client::MODEL,
        config.llm_timeout,
        config.llm_max_retries
    );

    // Wire the pipeline: corpus store, provider, grounding rules, run sink
    let pipeline = Pipeline::new(
        Arc::new(PgCorpusStore::new(db.clone())),
        Arc::new(llm),
        Arc::new(StrictGroundingValidator),
    )
    .with_sink(Arc::new(PgRunSink::new(db)));
    info!(
        "Pipeline defaults: budget {}..={} words, {} improvement passes",
        config.pipeline.word_budget.min,
        config.pipeline.word_budget.max,
        config.pipeline.max_improvement_passes
    );

    // Build app state
    let state = AppState {
        pipeline,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: restrict origins once the web client's domain is fixed
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
