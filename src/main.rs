use std::sync::Arc;

use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use ragline::config::Settings;
use ragline::embeddings::HttpEmbedder;
use ragline::event_bus::ConversationHub;
use ragline::ingestion::{IngestionPipeline, JobQueue};
use ragline::llm::OpenAiCompatModel;
use ragline::orchestrator::Orchestrator;
use ragline::server::{build_router, AppState};
use ragline::store::SqliteStore;
use ragline::vector::{QdrantIndex, VectorIndex};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Arc::new(Settings::from_env());
    tracing::info!(bind = %settings.bind_addr, "starting ragline");

    let store = Arc::new(
        SqliteStore::connect(&settings.database_url)
            .await
            .into_diagnostic()?,
    );

    let index: Arc<dyn VectorIndex> = Arc::new(QdrantIndex::new(
        settings.vector_url.clone(),
        settings.collection.clone(),
        settings.vector_dim,
    ));
    // The service still starts when the index is down; retrieval degrades to
    // error events and /health reports partial.
    if let Err(err) = index.ensure_ready().await {
        tracing::warn!(error = %err, "vector index not ready at startup");
    }

    let embedder = Arc::new(HttpEmbedder::new(
        settings.embed_url.clone(),
        settings.embed_model.clone(),
    ));
    let model = Arc::new(
        OpenAiCompatModel::new(settings.llm_url.clone(), settings.llm_model.clone())
            .with_api_key(settings.llm_api_key.clone()),
    );

    let hub = ConversationHub::new(settings.event_capacity);
    let queue = JobQueue::new();

    let pipeline = Arc::new(IngestionPipeline::new(
        store.clone(),
        embedder.clone(),
        index.clone(),
        settings.chunking.clone(),
    ));
    for worker in 0..settings.ingest_workers {
        let pipeline = pipeline.clone();
        let receiver = queue.receiver();
        tokio::spawn(async move {
            tracing::debug!(worker, "ingestion worker started");
            pipeline.work(receiver).await;
        });
    }

    let orchestrator = Arc::new(Orchestrator::new(
        hub.clone(),
        store.clone(),
        index.clone(),
        embedder.clone(),
        model.clone(),
        settings.retrieval.clone(),
    ));

    let state = AppState {
        store,
        hub,
        queue,
        index,
        embedder,
        model,
        orchestrator,
        settings: settings.clone(),
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .into_diagnostic()?;
    tracing::info!(addr = %settings.bind_addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install shutdown handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
