//! The retrieval engine: parse, filter, hybrid search, fuse, pack.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use coldspec_catalog::registry::SpecRegistry;
use coldspec_catalog::store::{CatalogStore, ProductFilter};
use coldspec_core::{ChunkId, ChunkType, DocumentChunk, EmbeddingProvider, Product, ProductId};

use crate::context::{into_pack, select_within_budget, AppliedFilters, ContextPack};
use crate::query::{ParsedQuery, QueryIntent, QueryParser};
use crate::search::{reciprocal_rank_fusion, FusedHit, KeywordIndex, VectorIndex};
use crate::{Result, RetrievalError};

/// Cooperative cancellation handle for a retrieval call.
#[derive(Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    /// A token that never cancels. The sender drops immediately; the
    /// receiver keeps reporting the initial `false`.
    pub fn none() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RetrievalError::Cancelled)
        } else {
            Ok(())
        }
    }
}

pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

pub fn cancellation_pair() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub vector_top_k: usize,
    pub keyword_top_k: usize,
    pub rrf_k: usize,
    pub context_budget_tokens: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vector_top_k: 40,
            keyword_top_k: 40,
            rrf_k: 60,
            context_budget_tokens: 3000,
        }
    }
}

#[derive(Default)]
struct Indexes {
    vector: VectorIndex,
    keyword: KeywordIndex,
    chunks: HashMap<ChunkId, DocumentChunk>,
}

pub struct RetrievalEngine {
    store: Arc<dyn CatalogStore>,
    parser: QueryParser,
    embedder: Arc<dyn EmbeddingProvider>,
    config: EngineConfig,
    indexes: RwLock<Indexes>,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        registry: Arc<SpecRegistry>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            parser: QueryParser::new(registry),
            embedder,
            config,
            indexes: RwLock::new(Indexes::default()),
        }
    }

    /// Rebuild the in-memory indexes from the chunk store. Called after
    /// ingestion completes and at startup.
    pub async fn refresh(&self) -> Result<()> {
        let chunks = self.store.all_chunks().await?;
        let mut indexes = Indexes::default();
        for chunk in chunks {
            if let Some(embedding) = &chunk.embedding {
                indexes.vector.insert(chunk.id, embedding.clone());
            }
            indexes.keyword.insert(chunk.id, &chunk.content);
            indexes.chunks.insert(chunk.id, chunk);
        }
        info!(
            chunks = indexes.chunks.len(),
            embedded = indexes.vector.len(),
            "Retrieval indexes refreshed"
        );
        *self.indexes.write().await = indexes;
        Ok(())
    }

    pub async fn query(&self, raw: &str) -> Result<ContextPack> {
        self.query_cancellable(raw, &Cancellation::none()).await
    }

    /// The full pipeline: parse, filter, vector + lexical search, RRF
    /// fusion, heuristic boosts, budgeted context assembly. Cancellation
    /// is checked between steps.
    pub async fn query_cancellable(&self, raw: &str, cancel: &Cancellation) -> Result<ContextPack> {
        let parsed = self.parser.parse(raw);
        cancel.check()?;

        let (allowed, filters) = self.build_filters(&parsed).await?;
        cancel.check()?;

        let indexes = self.indexes.read().await;

        // Vector search; provider failure degrades to lexical-only.
        let mut lexical_only = false;
        let vector_ranked = match self.embed_query(&parsed).await {
            Some(query_vector) => {
                indexes
                    .vector
                    .search(&query_vector, self.config.vector_top_k, allowed.as_ref())
            }
            None => {
                lexical_only = true;
                Vec::new()
            }
        };
        cancel.check()?;

        let keyword_ranked = indexes
            .keyword
            .search(raw, self.config.keyword_top_k, allowed.as_ref());
        cancel.check()?;

        let fused = reciprocal_rank_fusion(&vector_ranked, &keyword_ranked, self.config.rrf_k);
        let boosted = self.apply_boosts(fused, &parsed, &indexes.chunks);

        let ranked: Vec<(DocumentChunk, f64)> = boosted
            .into_iter()
            .filter_map(|hit| indexes.chunks.get(&hit.chunk_id).map(|c| (c.clone(), hit.score)))
            .collect();
        cancel.check()?;

        let selected = select_within_budget(&ranked, self.config.context_budget_tokens);
        let pack = into_pack(&parsed, filters, selected, lexical_only);

        debug!(
            intent = %pack.intent,
            chunks = pack.chunks.len(),
            tokens = pack.total_tokens,
            lexical_only = pack.lexical_only,
            "Context pack assembled"
        );
        Ok(pack)
    }

    /// Fetch the product records a pack references, for grounded prompt
    /// rendering.
    pub async fn products_for_pack(&self, pack: &ContextPack) -> Result<Vec<Product>> {
        let mut products = Vec::new();
        for product_id in &pack.used_products {
            if let Some(product) = self.store.product(*product_id).await? {
                products.push(product);
            }
        }
        Ok(products)
    }

    /// Structured predicates from parsed entities: model numbers narrow
    /// to specific products, certifications and intent narrow chunk types.
    async fn build_filters(
        &self,
        parsed: &ParsedQuery,
    ) -> Result<(Option<HashSet<ChunkId>>, AppliedFilters)> {
        let filters = AppliedFilters {
            model_numbers: parsed.model_numbers.clone(),
            brands: parsed.brand_mentions.clone(),
            certifications: parsed.cert_mentions.clone(),
            families: parsed.family_hints.clone(),
        };

        let mut allowed_products: Option<HashSet<ProductId>> = None;
        if !parsed.model_numbers.is_empty() {
            let found = self
                .store
                .find_products(&ProductFilter {
                    model_numbers: parsed.model_numbers.clone(),
                    include_discontinued: true,
                    ..ProductFilter::default()
                })
                .await?;
            if !found.is_empty() {
                allowed_products = Some(found.into_iter().map(|p| p.id).collect());
            }
        }

        let allowed_types: Option<HashSet<ChunkType>> = match parsed.intent {
            QueryIntent::SpecLookup => Some(
                [
                    ChunkType::SpecBlock,
                    ChunkType::PerformanceData,
                    ChunkType::Dimensional,
                    ChunkType::Table,
                    ChunkType::Text,
                    ChunkType::Description,
                ]
                .into_iter()
                .collect(),
            ),
            QueryIntent::Comparison => Some(
                [
                    ChunkType::SpecBlock,
                    ChunkType::PerformanceData,
                    ChunkType::Dimensional,
                    ChunkType::Table,
                    ChunkType::Description,
                ]
                .into_iter()
                .collect(),
            ),
            _ => None,
        };

        if allowed_products.is_none() && allowed_types.is_none() {
            return Ok((None, filters));
        }

        let indexes = self.indexes.read().await;
        let allowed: HashSet<ChunkId> = indexes
            .chunks
            .values()
            .filter(|chunk| {
                if let Some(products) = &allowed_products {
                    if !chunk.product_ids.iter().any(|id| products.contains(id)) {
                        return false;
                    }
                }
                if let Some(types) = &allowed_types {
                    if !types.contains(&chunk.chunk_type) {
                        return false;
                    }
                }
                true
            })
            .map(|chunk| chunk.id)
            .collect();

        // An over-restrictive filter that matches nothing falls back to
        // the unfiltered set rather than returning an empty answer.
        if allowed.is_empty() {
            warn!("Query filters matched no chunks, falling back to unfiltered search");
            return Ok((None, filters));
        }
        Ok((Some(allowed), filters))
    }

    async fn embed_query(&self, parsed: &ParsedQuery) -> Option<Vec<f32>> {
        let text = parsed.expanded_text();
        match self.embedder.embed_batch(&[text]).await {
            Ok(mut vectors) if !vectors.is_empty() => Some(vectors.remove(0)),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Embedding provider unavailable, using lexical-only retrieval");
                None
            }
        }
    }

    /// Post-fusion heuristic boosts, scaled to the RRF unit so they
    /// reorder near-ties without swamping the fused ranking.
    fn apply_boosts(
        &self,
        mut fused: Vec<FusedHit>,
        parsed: &ParsedQuery,
        chunks: &HashMap<ChunkId, DocumentChunk>,
    ) -> Vec<FusedHit> {
        let unit = 1.0 / (self.config.rrf_k as f64 + 1.0);

        for hit in fused.iter_mut() {
            let Some(chunk) = chunks.get(&hit.chunk_id) else {
                continue;
            };
            let content_lower = chunk.content.to_lowercase();

            for model in &parsed.model_numbers {
                if content_lower.contains(&model.to_lowercase()) {
                    hit.score += 0.6 * unit;
                }
            }
            if hit.is_dual_source() {
                hit.score += 0.2 * unit;
            }
            match (parsed.intent, chunk.chunk_type) {
                (QueryIntent::SpecLookup, ChunkType::SpecBlock)
                | (QueryIntent::Comparison, ChunkType::SpecBlock)
                | (QueryIntent::Compliance, ChunkType::SpecBlock) => hit.score += 0.3 * unit,
                _ => {}
            }
            // Performance and dimensional chunks rise for matching spec
            // mentions.
            let perf_specs = ["uniformity_c", "stability_c", "energy_kwh_day", "noise_dba"];
            if chunk.chunk_type == ChunkType::PerformanceData
                && parsed.spec_mentions.iter().any(|s| perf_specs.contains(&s.as_str()))
            {
                hit.score += 0.3 * unit;
            }
            let dim_specs = ["ext_width_in", "ext_depth_in", "ext_height_in"];
            if chunk.chunk_type == ChunkType::Dimensional
                && parsed.spec_mentions.iter().any(|s| dim_specs.contains(&s.as_str()))
            {
                hit.score += 0.3 * unit;
            }
            if chunk.token_count < 30 {
                hit.score -= 0.2 * unit;
            }
        }

        fused.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        fused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldspec_catalog::memory::MemoryCatalogStore;
    use coldspec_catalog::seed;
    use coldspec_core::DocumentId;
    use coldspec_providers::{FailingEmbeddingProvider, HashEmbeddingProvider};

    const DIM: usize = 32;

    async fn setup(embedder: Arc<dyn EmbeddingProvider>) -> (RetrievalEngine, ProductId) {
        let store: Arc<dyn CatalogStore> = Arc::new(MemoryCatalogStore::new(DIM));
        seed::seed_store(&store).await.unwrap();

        let mut product = Product::new("ABT-HC-26S", "ABS", "premier_lab_ref");
        product.storage_capacity_cuft = Some(26.0);
        let product = store.create_product(product).await.unwrap();

        let doc_id = DocumentId::new();
        let contents = [
            (
                "ABT-HC-26S storage capacity 26 cu. ft. with solid door",
                ChunkType::SpecBlock,
            ),
            (
                "The laboratory refrigerator keeps reagents cold and stable for daily use",
                ChunkType::Description,
            ),
            (
                "Exterior dimensions 28 3/8\" x 36 3/4\" x 81 3/4\" overall",
                ChunkType::Dimensional,
            ),
        ];
        let hash_embedder = HashEmbeddingProvider::new(DIM);
        let mut chunks = Vec::new();
        for (index, (content, chunk_type)) in contents.iter().enumerate() {
            let embedding = hash_embedder
                .embed_batch(&[content.to_string()])
                .await
                .unwrap()
                .remove(0);
            chunks.push(DocumentChunk {
                id: ChunkId::new(),
                document_id: doc_id,
                chunk_index: index as u32,
                content: content.to_string(),
                chunk_type: *chunk_type,
                page_number: Some(1),
                section_title: None,
                product_ids: vec![product.id],
                spec_names: vec![],
                embedding: Some(embedding),
                token_count: 40,
            });
        }
        store.insert_chunks(chunks).await.unwrap();

        let registry = SpecRegistry::new(store.clone());
        registry.refresh().await.unwrap();

        let engine = RetrievalEngine::new(store, Arc::new(registry), embedder, EngineConfig::default());
        engine.refresh().await.unwrap();
        (engine, product.id)
    }

    #[tokio::test]
    async fn test_model_query_surfaces_lexical_match() {
        let (engine, product_id) = setup(Arc::new(HashEmbeddingProvider::new(DIM))).await;

        let pack = engine.query("storage capacity of ABT-HC-26S").await.unwrap();
        assert!(!pack.lexical_only);
        assert!(!pack.chunks.is_empty());
        // The chunk containing the literal model token must rank in the
        // top three.
        let top3: Vec<&str> = pack.chunks.iter().take(3).map(|c| c.content.as_str()).collect();
        assert!(top3.iter().any(|c| c.contains("ABT-HC-26S")));
        assert!(pack.used_products.contains(&product_id));
        assert_eq!(pack.intent, QueryIntent::SpecLookup);
    }

    #[tokio::test]
    async fn test_embedding_outage_degrades_to_lexical() {
        let (engine, _) = setup(Arc::new(FailingEmbeddingProvider::always_transient(DIM))).await;

        let pack = engine.query("storage capacity of ABT-HC-26S").await.unwrap();
        assert!(pack.lexical_only);
        assert!(!pack.chunks.is_empty());
        assert!(pack.chunks[0].content.contains("ABT-HC-26S"));
    }

    #[tokio::test]
    async fn test_cancellation_between_steps() {
        let (engine, _) = setup(Arc::new(HashEmbeddingProvider::new(DIM))).await;
        let (handle, token) = cancellation_pair();
        handle.cancel();

        let err = engine
            .query_cancellable("storage capacity", &token)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Cancelled));
    }

    #[tokio::test]
    async fn test_filters_echoed_in_pack() {
        let (engine, _) = setup(Arc::new(HashEmbeddingProvider::new(DIM))).await;
        let pack = engine
            .query("is the ABT-HC-26S Energy Star certified?")
            .await
            .unwrap();
        assert_eq!(pack.filters.model_numbers, vec!["ABT-HC-26S"]);
        assert!(pack.filters.certifications.contains(&"Energy_Star".to_string()));
    }
}
