//! Application state and wiring.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use coldspec_catalog::registry::SpecRegistry;
use coldspec_catalog::store::CatalogStore;
use coldspec_catalog::{seed, ConflictEngine, MemoryCatalogStore};
use coldspec_core::{AppConfig, Generator, UserRole};
use coldspec_ingestion::pipeline::{IngestionPipeline, PipelineConfig};
use coldspec_providers::{HttpEmbeddingProvider, HttpGenerator, HttpPdfTextProvider};
use coldspec_recommend::RecommendationEngine;
use coldspec_retrieval::{EngineConfig, RetrievalEngine};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn CatalogStore>,
    pub registry: Arc<SpecRegistry>,
    pub pipeline: Arc<IngestionPipeline>,
    pub retrieval: Arc<RetrievalEngine>,
    pub recommend: Arc<RecommendationEngine>,
    pub generator: Arc<dyn Generator>,
    pub conflict_engine: Arc<ConflictEngine>,
    /// API key -> role, from configuration.
    pub api_keys: Arc<HashMap<String, UserRole>>,
}

impl AppState {
    /// Wire every component. The in-memory store stands in for the
    /// external relational + vector store.
    pub async fn build(config: AppConfig) -> Result<Self> {
        info!("Initializing application components");

        let store: Arc<dyn CatalogStore> =
            Arc::new(MemoryCatalogStore::new(config.embedding.dimension));
        seed::seed_store(&store).await?;

        let registry = Arc::new(SpecRegistry::new(store.clone()));
        registry.refresh().await?;

        let embedder = Arc::new(HttpEmbeddingProvider::new(
            &config.embedding.api_url,
            &config.embedding.model,
            config.embedding.dimension,
            config.embedding.timeout(),
        )?);
        let generator: Arc<dyn Generator> = Arc::new(HttpGenerator::new(
            &config.generator.api_url,
            &config.generator.model,
            config.generator.timeout(),
        )?);
        let pdf_provider = Arc::new(HttpPdfTextProvider::new(
            &config.extraction.api_url,
            config.extraction.timeout(),
        )?);

        let pipeline = Arc::new(IngestionPipeline::new(
            store.clone(),
            registry.clone(),
            embedder.clone(),
            pdf_provider,
            PipelineConfig {
                workers: config.ingestion.workers,
                embed_batch_size: config.embedding.batch_size,
                embed_max_in_flight: config.embedding.max_in_flight,
                graceful_shutdown: config.ingestion.graceful_shutdown_timeout(),
                ..PipelineConfig::default()
            },
        ));

        let retrieval = Arc::new(RetrievalEngine::new(
            store.clone(),
            registry.clone(),
            embedder,
            EngineConfig {
                vector_top_k: config.retrieval.vector_top_k,
                keyword_top_k: config.retrieval.keyword_top_k,
                rrf_k: config.retrieval.rrf_k,
                context_budget_tokens: config.retrieval.context_budget_tokens,
            },
        ));
        retrieval.refresh().await?;

        let recommend = Arc::new(RecommendationEngine::new(store.clone()));

        let mut api_keys = HashMap::new();
        for (key, role) in config.auth.api_key_map() {
            match UserRole::parse(&role) {
                Some(role) => {
                    api_keys.insert(key, role);
                }
                None => warn!(role = %role, "Ignoring API key with unknown role"),
            }
        }

        Ok(Self {
            config: Arc::new(config),
            store,
            registry,
            pipeline,
            retrieval,
            recommend,
            generator,
            conflict_engine: Arc::new(ConflictEngine::default()),
            api_keys: Arc::new(api_keys),
        })
    }
}
