//! The ingestion orchestrator.
//!
//! Drives each uploaded file end-to-end: checksum dedup, text extraction,
//! classification, model resolution, field mapping, conflict-aware product
//! upsert, chunking, and embedding. Files are processed by a bounded worker
//! pool; documents naming the same product serialize on a per-model mutex.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use coldspec_catalog::conflict::{ConflictDecision, ConflictEngine};
use coldspec_catalog::registry::SpecRegistry;
use coldspec_catalog::store::{CatalogStore, DocumentInsert};
use coldspec_core::{
    AuditEntry, ChunkId, DocStatus, Document, DocumentChunk, DocumentId, DocumentProductLink,
    EmbeddingProvider, ExtractedSpec, IngestionJob, JobCounters, JobId, JobStatus, LinkRelevance,
    PdfPage, PdfTextProvider, Product, ProductId, ProductSnapshot, SpecConflict, SpecValue,
    UserRole,
};
use coldspec_providers::{retry_with, RetryPolicy};

use crate::chunking::Chunker;
use crate::classifier::classify_document;
use crate::compound::parse_certifications;
use crate::extractors::{ExtractorRegistry, TextExtraction};
use crate::fields::FieldMapper;
use crate::harvest::harvest;
use crate::resolver::{ModelCandidate, ModelResolver};
use crate::{IngestionError, Result};

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct IngestFile {
    pub filename: String,
    pub content: Vec<u8>,
    pub mime_type: Option<String>,
}

impl IngestFile {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
            mime_type: None,
        }
    }

    pub fn with_mime(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Worker pool size; 0 means `min(8, cores)`.
    pub workers: usize,
    /// Texts per embedding request.
    pub embed_batch_size: usize,
    /// Concurrent embedding requests in flight.
    pub embed_max_in_flight: usize,
    /// Extracted specs below this confidence are not written to products.
    pub min_confidence: f32,
    /// Create products for unrecognized model numbers.
    pub auto_create_products: bool,
    /// Cap on extracted text stored with the document row.
    pub stored_text_cap: usize,
    /// Wait for in-flight workers after cancellation.
    pub graceful_shutdown: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            embed_batch_size: 16,
            embed_max_in_flight: 4,
            min_confidence: 0.6,
            auto_create_products: true,
            stored_text_cap: 50_000,
            graceful_shutdown: Duration::from_secs(30),
        }
    }
}

impl PipelineConfig {
    fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get().min(8))
                .unwrap_or(4)
        }
    }
}

enum FileOutcome {
    Processed,
    Duplicate,
    Failed,
}

pub struct IngestionPipeline {
    store: Arc<dyn CatalogStore>,
    registry: Arc<SpecRegistry>,
    conflict_engine: ConflictEngine,
    extractors: ExtractorRegistry,
    resolver: ModelResolver,
    mapper: FieldMapper,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
    config: PipelineConfig,
    /// Per-model-number serialization within this process.
    product_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        registry: Arc<SpecRegistry>,
        embedder: Arc<dyn EmbeddingProvider>,
        pdf_provider: Arc<dyn PdfTextProvider>,
        config: PipelineConfig,
    ) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            store,
            registry: registry.clone(),
            conflict_engine: ConflictEngine::default(),
            extractors: ExtractorRegistry::new(pdf_provider),
            resolver: ModelResolver::with_defaults(),
            mapper: FieldMapper::new(registry),
            chunker: Chunker::default(),
            embedder,
            retry: RetryPolicy::default(),
            config,
            product_locks: Mutex::new(HashMap::new()),
            cancel_tx,
            cancel_rx,
        }
    }

    pub fn with_conflict_engine(mut self, engine: ConflictEngine) -> Self {
        self.conflict_engine = engine;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Signal cancellation: the queue drains without starting new files.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Create and persist the job row without starting work. Pair with
    /// [`Self::run_prepared`] when the caller needs the job id before the
    /// work is scheduled.
    pub async fn prepare_job(&self, file_count: usize, submitted_by: &str) -> Result<IngestionJob> {
        let mut job = IngestionJob::new(submitted_by, file_count as u32);
        job.status = JobStatus::Processing;
        self.store.insert_job(job.clone()).await?;
        Ok(job)
    }

    /// Drive a prepared job to completion.
    pub async fn run_prepared(
        self: &Arc<Self>,
        job: IngestionJob,
        files: Vec<IngestFile>,
        role: UserRole,
    ) -> Result<IngestionJob> {
        self.run(job, files, role).await
    }

    /// Submit a job and return immediately; processing continues in the
    /// background. Poll the job row for progress.
    pub async fn submit(
        self: &Arc<Self>,
        files: Vec<IngestFile>,
        submitted_by: &str,
        role: UserRole,
    ) -> Result<JobId> {
        let job = self.prepare_job(files.len(), submitted_by).await?;
        let this = self.clone();
        let job_id = job.id;
        tokio::spawn(async move {
            if let Err(e) = this.run(job, files, role).await {
                error!(job_id = %job_id, error = %e, "Ingestion job failed");
            }
        });
        Ok(job_id)
    }

    /// Run a job to completion and return its final state. The test and
    /// CLI entry point; [`Self::submit`] is the serving path.
    pub async fn run_job(
        self: &Arc<Self>,
        files: Vec<IngestFile>,
        submitted_by: &str,
        role: UserRole,
    ) -> Result<IngestionJob> {
        let job = self.prepare_job(files.len(), submitted_by).await?;
        self.run(job, files, role).await
    }

    async fn run(
        self: &Arc<Self>,
        mut job: IngestionJob,
        files: Vec<IngestFile>,
        role: UserRole,
    ) -> Result<IngestionJob> {
        let counters = Arc::new(Mutex::new(job.counters));
        let (tx, rx) = mpsc::channel(files.len().max(1));
        for file in files {
            // Channel capacity equals queue length, so sends never block.
            let _ = tx.send(file).await;
        }
        drop(tx);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        let submitted_by = job.submitted_by.clone();
        for worker_id in 0..self.config.worker_count() {
            let this = self.clone();
            let rx = rx.clone();
            let counters = counters.clone();
            let submitted_by = submitted_by.clone();
            workers.spawn(async move {
                loop {
                    if this.is_cancelled() {
                        debug!(worker_id, "Worker draining due to cancellation");
                        break;
                    }
                    let file = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(file) = file else { break };

                    let filename = file.filename.clone();
                    match this.process_file(file, &counters, &submitted_by, role).await {
                        Ok(FileOutcome::Processed) => {
                            counters.lock().await.processed_files += 1;
                        }
                        Ok(FileOutcome::Duplicate) => {
                            let mut c = counters.lock().await;
                            c.processed_files += 1;
                            c.skipped_duplicates += 1;
                        }
                        Ok(FileOutcome::Failed) => {
                            counters.lock().await.failed_files += 1;
                        }
                        Err(IngestionError::Cancelled) => {
                            warn!(filename = %filename, "File interrupted by cancellation");
                            break;
                        }
                        Err(e) => {
                            warn!(filename = %filename, error = %e, "File ingestion failed");
                            counters.lock().await.failed_files += 1;
                        }
                    }
                }
            });
        }

        // Wait for the pool; after a cancel signal the remaining workers
        // get the graceful window, then are aborted.
        while !workers.is_empty() {
            if self.is_cancelled() {
                let deadline = tokio::time::sleep(self.config.graceful_shutdown);
                tokio::pin!(deadline);
                loop {
                    tokio::select! {
                        joined = workers.join_next() => {
                            if joined.is_none() {
                                break;
                            }
                        }
                        _ = &mut deadline => {
                            warn!("Graceful shutdown window elapsed, aborting workers");
                            workers.abort_all();
                            while workers.join_next().await.is_some() {}
                            break;
                        }
                    }
                }
                break;
            }
            if workers.join_next().await.is_none() {
                break;
            }
        }

        job.counters = *counters.lock().await;
        job.status = if self.is_cancelled() {
            JobStatus::Cancelled
        } else if job.counters.processed_files == 0 && job.counters.failed_files > 0 {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        job.completed_at = Some(chrono::Utc::now());
        self.store.update_job(&job).await?;

        info!(
            job_id = %job.id,
            processed = job.counters.processed_files,
            failed = job.counters.failed_files,
            new_products = job.counters.new_products,
            conflicts = job.counters.conflicts_found,
            "Ingestion job finished"
        );
        Ok(job)
    }

    async fn process_file(
        &self,
        file: IngestFile,
        counters: &Mutex<JobCounters>,
        submitted_by: &str,
        role: UserRole,
    ) -> Result<FileOutcome> {
        let checksum = hex_digest(&file.content);
        let mime_type = file.mime_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&file.filename)
                .first_or_octet_stream()
                .to_string()
        });

        // Identical bytes are a no-op returning the existing document.
        let mut doc = Document::new(&file.filename, &mime_type, checksum);
        doc.file_size_bytes = Some(file.content.len() as u64);
        let mut doc = match self.store.insert_document(doc).await? {
            DocumentInsert::Duplicate(existing) => {
                info!(filename = %file.filename, document_id = %existing.id, "Duplicate upload skipped");
                return Ok(FileOutcome::Duplicate);
            }
            DocumentInsert::Created(doc) => doc,
        };
        doc.status = DocStatus::Processing;

        // Extraction.
        let extraction = match self.extract(&file, &mime_type).await {
            Ok(extraction) => extraction,
            Err(e) => {
                doc.status = DocStatus::Failed;
                doc.log_stage("extraction", "failed", e.to_string());
                self.store.update_document(&doc).await?;
                return Ok(FileOutcome::Failed);
            }
        };
        let text = extraction.plain_text.clone();
        doc.page_count = Some(extraction.page_count());
        doc.extracted_text = Some(truncate_chars(&text, self.config.stored_text_cap));
        doc.log_stage("extraction", "ok", format!("{} pages", extraction.page_count()));

        // Classification.
        let classification = classify_document(&text, &file.filename);
        doc.doc_type = classification.doc_type;
        doc.brand_code = classification.brand_code.clone();
        doc.revision = classification.revision.clone();
        doc.log_stage("classification", "ok", classification.doc_type.to_string());
        self.store.update_document(&doc).await?;

        // Model resolution.
        let candidates = self
            .resolver
            .resolve(&text, classification.brand_code.as_deref());
        if candidates.is_empty() {
            doc.log_stage("model_resolution", "no_models", "no model numbers found");
        } else {
            let models: Vec<&str> = candidates.iter().map(|c| c.model_number.as_str()).collect();
            doc.log_stage("model_resolution", "ok", models.join(", "));
        }

        // Field harvesting and mapping.
        let harvested = harvest(&text, doc.doc_type);
        let mapped = self.mapper.map_pairs(&harvested.pairs);
        let mut specs = mapped.specs;
        specs.extend(harvested.specs);
        for (label, raw) in &mapped.unknown {
            let spec = self.discover_spec(label, raw, counters).await?;
            specs.push(spec);
        }
        self.ensure_registered(&specs, counters).await?;
        let specs = dedup_by_canonical(specs);

        // Certifications come from mapped fields and a scan of the text head.
        let mut certifications = parse_certifications(&truncate_chars(&text, 5000));
        if let Some(SpecValue::List(mapped_certs)) = specs
            .iter()
            .find(|s| s.canonical_name.as_deref() == Some("certifications"))
            .and_then(|s| s.value.clone())
        {
            for cert in mapped_certs {
                if !certifications.contains(&cert) {
                    certifications.push(cert);
                }
            }
        }

        self.warn_on_scope_mismatches(&mut doc, &candidates, &specs);

        if self.is_cancelled() {
            self.store.update_document(&doc).await?;
            return Err(IngestionError::Cancelled);
        }

        // Product upsert, serialized per model number.
        for candidate in &candidates {
            let lock = self.lock_for_model(&candidate.model_number).await;
            let _guard = lock.lock().await;
            self.upsert_product(candidate, &specs, &certifications, &doc, counters, submitted_by, role)
                .await?;
        }

        if self.is_cancelled() {
            self.store.update_document(&doc).await?;
            return Err(IngestionError::Cancelled);
        }

        // Chunking and embedding.
        let chunks_created = self
            .build_chunks(&doc, &text, &extraction.pages, &candidates, &specs)
            .await?;
        counters.lock().await.chunks_created += chunks_created;
        doc.log_stage("chunking", "ok", format!("{chunks_created} chunks"));

        doc.status = DocStatus::Processed;
        doc.log_stage("complete", "ok", "");
        self.store.update_document(&doc).await?;

        Ok(FileOutcome::Processed)
    }

    async fn extract(&self, file: &IngestFile, mime_type: &str) -> Result<TextExtraction> {
        let extractor = self.extractors.for_mime(mime_type)?;
        extractor.extract(&file.content).await
    }

    /// Register an unknown label and build an extracted spec for it with
    /// reduced confidence.
    async fn discover_spec(
        &self,
        label: &str,
        raw: &str,
        counters: &Mutex<JobCounters>,
    ) -> Result<ExtractedSpec> {
        let already_known = self.registry.resolve(label).is_some();
        let canonical = self.registry.register_auto(label, raw).await?;
        if !already_known {
            counters.lock().await.new_specs_discovered += 1;
        }

        let value = match self.registry.lookup(&canonical) {
            Some(entry) => self.registry.coerce(&entry, SpecValue::text(raw)),
            None => SpecValue::text(raw),
        };
        Ok(ExtractedSpec::new(label, raw)
            .canonical(&canonical)
            .with_value(value)
            .with_confidence(0.5))
    }

    /// Positional extractors can emit canonical names that are not seeded
    /// (cryogenic metrics, for instance); register them before write.
    async fn ensure_registered(
        &self,
        specs: &[ExtractedSpec],
        counters: &Mutex<JobCounters>,
    ) -> Result<()> {
        for spec in specs.iter() {
            let Some(canonical) = spec.canonical_name.as_deref() else {
                continue;
            };
            if self.registry.lookup(canonical).is_none() {
                self.registry.register_auto(canonical, &spec.raw_value).await?;
                counters.lock().await.new_specs_discovered += 1;
            }
        }
        Ok(())
    }

    /// A decoded family outside a recognized spec's family scope is
    /// logged, never rejected.
    fn warn_on_scope_mismatches(
        &self,
        doc: &mut Document,
        candidates: &[ModelCandidate],
        specs: &[ExtractedSpec],
    ) {
        for candidate in candidates {
            for spec in specs {
                let Some(canonical) = spec.canonical_name.as_deref() else {
                    continue;
                };
                let Some(entry) = self.registry.lookup(canonical) else {
                    continue;
                };
                if !entry.applies_to_family(&candidate.family_code) {
                    doc.log_stage(
                        "model_resolution",
                        "warning",
                        format!(
                            "spec {} is scoped outside family {} for {}",
                            canonical, candidate.family_code, candidate.model_number
                        ),
                    );
                }
            }
        }
    }

    async fn lock_for_model(&self, model_number: &str) -> Arc<Mutex<()>> {
        let key = model_number.to_uppercase();
        let mut locks = self.product_locks.lock().await;
        locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    #[allow(clippy::too_many_arguments)]
    async fn upsert_product(
        &self,
        candidate: &ModelCandidate,
        specs: &[ExtractedSpec],
        certifications: &[String],
        doc: &Document,
        counters: &Mutex<JobCounters>,
        submitted_by: &str,
        role: UserRole,
    ) -> Result<()> {
        let existing = self.store.product_by_model(&candidate.model_number).await?;

        let product = match existing {
            None => {
                if !self.config.auto_create_products {
                    return Ok(());
                }
                let product = self.create_product(candidate, specs, certifications, doc).await?;
                counters.lock().await.new_products += 1;
                product
            }
            Some(product) => {
                self.update_product(product, specs, certifications, doc, counters, submitted_by, role)
                    .await?
            }
        };

        let extracted: BTreeMap<String, SpecValue> = specs
            .iter()
            .filter_map(|s| {
                let canonical = s.canonical_name.clone()?;
                let value = s.value.clone()?;
                Some((canonical, value))
            })
            .collect();
        self.store
            .upsert_link(DocumentProductLink {
                document_id: doc.id,
                product_id: product.id,
                relevance: LinkRelevance::Primary,
                extracted_specs: extracted,
                confidence: 0.9,
            })
            .await?;
        Ok(())
    }

    async fn create_product(
        &self,
        candidate: &ModelCandidate,
        specs: &[ExtractedSpec],
        certifications: &[String],
        doc: &Document,
    ) -> Result<Product> {
        let mut product = Product::new(
            &candidate.model_number,
            &candidate.brand_code,
            &candidate.family_code,
        );
        product.product_line = candidate.product_line.clone();
        product.controller_tier = candidate.controller_tier;
        product.revision = doc.revision.clone();

        for spec in specs {
            if spec.confidence < self.config.min_confidence {
                continue;
            }
            if let (Some(canonical), Some(value)) = (spec.canonical_name.as_deref(), spec.value.clone()) {
                product.set_spec_value(canonical, value);
            }
        }
        // Pattern-decoded values fill gaps the document text did not.
        for (canonical, value) in &candidate.decoded {
            if product.spec_value(canonical).is_none() {
                product.set_spec_value(canonical, value.clone());
            }
        }
        product.merge_certifications(certifications.iter().cloned());

        let product = self.store.create_product(product).await?;
        info!(model_number = %product.model_number, family = %product.family_code, "Product created");
        Ok(product)
    }

    #[allow(clippy::too_many_arguments)]
    async fn update_product(
        &self,
        existing: Product,
        specs: &[ExtractedSpec],
        certifications: &[String],
        doc: &Document,
        counters: &Mutex<JobCounters>,
        submitted_by: &str,
        role: UserRole,
    ) -> Result<Product> {
        let pre = existing.clone();
        let mut product = existing;
        let mut changed = false;

        let rule = self.store.equivalence_rule(&product.family_code).await?;
        let existing_doc_id = self.latest_primary_source(product.id, doc).await?;

        for spec in specs {
            if spec.confidence < self.config.min_confidence {
                continue;
            }
            let (Some(canonical), Some(value)) = (spec.canonical_name.as_deref(), spec.value.as_ref())
            else {
                continue;
            };

            let entry = self.registry.lookup(canonical);
            let tolerance = rule.as_ref().and_then(|r| r.tolerance_for(canonical));
            let existing_value = product.spec_value(canonical);

            let decision = self.conflict_engine.decide(
                entry.as_ref(),
                tolerance,
                existing_value.as_ref(),
                value,
                product.revision.as_deref(),
                doc.revision.as_deref(),
            );

            match decision {
                ConflictDecision::Write => {
                    product.set_spec_value(canonical, value.clone());
                    changed = true;
                }
                ConflictDecision::NoOp => {}
                ConflictDecision::Overwrite => {
                    self.store
                        .append_audit(AuditEntry::new(
                            "product",
                            product.id.to_string(),
                            "spec_overwrite",
                            submitted_by,
                            role,
                            format!(
                                "{}: {} -> {} (newer revision {})",
                                canonical,
                                existing_value.map(|v| v.to_string()).unwrap_or_default(),
                                value,
                                doc.revision.as_deref().unwrap_or("-"),
                            ),
                        ))
                        .await?;
                    product.set_spec_value(canonical, value.clone());
                    changed = true;
                }
                ConflictDecision::Flag(severity) => {
                    let mut conflict = SpecConflict::pending(
                        product.id,
                        canonical,
                        existing_value,
                        Some(value.clone()),
                        severity,
                    );
                    conflict.source_doc_id = Some(doc.id);
                    conflict.existing_doc_id = existing_doc_id;
                    self.store.insert_conflict(conflict).await?;
                    counters.lock().await.conflicts_found += 1;
                    debug!(
                        model_number = %product.model_number,
                        spec = canonical,
                        ?severity,
                        "Spec conflict flagged"
                    );
                }
            }
        }

        if product.merge_certifications(certifications.iter().cloned()) {
            changed = true;
        }

        if doc.revision.is_some()
            && self
                .conflict_engine
                .incoming_wins(doc.revision.as_deref(), product.revision.as_deref())
        {
            product.revision = doc.revision.clone();
            changed = true;
        }

        if changed {
            product.version = pre.version + 1;
            let snapshot = ProductSnapshot::of(
                &pre,
                format!("updated from document {}", doc.filename),
                submitted_by,
            );
            let product = self.store.update_product(product, snapshot).await?;
            counters.lock().await.updated_products += 1;
            info!(model_number = %product.model_number, version = product.version, "Product updated");
            return Ok(product);
        }
        Ok(product)
    }

    /// The provenance edge of the value currently on the product: the most
    /// recent primary-link document other than the incoming one.
    async fn latest_primary_source(
        &self,
        product_id: ProductId,
        incoming: &Document,
    ) -> Result<Option<DocumentId>> {
        let links = self.store.links_for_product(product_id).await?;
        Ok(links
            .iter()
            .filter(|l| l.relevance == LinkRelevance::Primary && l.document_id != incoming.id)
            .map(|l| l.document_id)
            .last())
    }

    async fn build_chunks(
        &self,
        doc: &Document,
        text: &str,
        pages: &[PdfPage],
        candidates: &[ModelCandidate],
        specs: &[ExtractedSpec],
    ) -> Result<u32> {
        let drafts = self.chunker.chunk(text, doc.doc_type);
        if drafts.is_empty() {
            return Ok(0);
        }

        let mut product_ids = Vec::new();
        for candidate in candidates {
            if let Some(product) = self.store.product_by_model(&candidate.model_number).await? {
                product_ids.push(product.id);
            }
        }

        let spec_names: Vec<String> = specs
            .iter()
            .filter_map(|s| s.canonical_name.clone())
            .collect();

        let mut chunks: Vec<DocumentChunk> = drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| {
                let content_lower = draft.content.to_lowercase();
                let mentioned: Vec<String> = spec_names
                    .iter()
                    .filter(|name| {
                        content_lower.contains(&name.replace('_', " "))
                            || content_lower.contains(name.as_str())
                    })
                    .cloned()
                    .collect();
                DocumentChunk {
                    id: ChunkId::new(),
                    document_id: doc.id,
                    chunk_index: index as u32,
                    page_number: page_of(pages, &draft.content),
                    content: draft.content,
                    chunk_type: draft.chunk_type,
                    section_title: draft.section_title,
                    product_ids: product_ids.clone(),
                    spec_names: mentioned,
                    embedding: None,
                    token_count: draft.token_count,
                }
            })
            .collect();

        self.embed_chunks(&mut chunks).await;

        let count = chunks.len() as u32;
        self.store.insert_chunks(chunks).await?;
        Ok(count)
    }

    /// Embed chunk contents in bounded-concurrency batches. Transient
    /// provider failures retry with backoff; exhausted or permanent
    /// failures leave the embedding empty and retrieval degrades to
    /// lexical-only for those chunks.
    async fn embed_chunks(&self, chunks: &mut [DocumentChunk]) {
        let semaphore = Arc::new(Semaphore::new(self.config.embed_max_in_flight.max(1)));
        let batch_size = self.config.embed_batch_size.max(1);

        let mut batch_results: Vec<Option<Vec<Vec<f32>>>> = Vec::new();
        {
            let mut join_set = JoinSet::new();
            for (batch_index, batch) in chunks.chunks(batch_size).enumerate() {
                let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
                let embedder = self.embedder.clone();
                let retry = self.retry.clone();
                let semaphore = semaphore.clone();
                join_set.spawn(async move {
                    let _permit = semaphore.acquire().await;
                    let result = retry_with(
                        &retry,
                        || {
                            let texts = texts.clone();
                            let embedder = embedder.clone();
                            async move { embedder.embed_batch(&texts).await }
                        },
                        |e| e.is_transient(),
                    )
                    .await;
                    (batch_index, result)
                });
            }

            let batch_count = chunks.len().div_ceil(batch_size);
            batch_results.resize_with(batch_count, || None);
            while let Some(joined) = join_set.join_next().await {
                if let Ok((batch_index, result)) = joined {
                    match result {
                        Ok(vectors) => batch_results[batch_index] = Some(vectors),
                        Err(e) => {
                            warn!(batch = batch_index, error = %e, "Embedding batch failed, continuing without vectors");
                        }
                    }
                }
            }
        }

        for (batch_index, batch) in chunks.chunks_mut(batch_size).enumerate() {
            if let Some(vectors) = batch_results.get(batch_index).and_then(|r| r.as_ref()) {
                for (chunk, vector) in batch.iter_mut().zip(vectors.iter()) {
                    chunk.embedding = Some(vector.clone());
                }
            }
        }
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn truncate_chars(text: &str, cap: usize) -> String {
    text.chars().take(cap).collect()
}

/// First page whose text contains the head of the chunk.
fn page_of(pages: &[PdfPage], content: &str) -> Option<u32> {
    let probe: String = content.chars().take(60).collect();
    let probe = probe.trim();
    if probe.is_empty() {
        return None;
    }
    pages.iter().find(|p| p.text.contains(probe)).map(|p| p.page_no)
}

/// Keep one spec per canonical name, preferring higher confidence.
fn dedup_by_canonical(specs: Vec<ExtractedSpec>) -> Vec<ExtractedSpec> {
    let mut best: HashMap<String, ExtractedSpec> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for spec in specs {
        let key = spec
            .canonical_name
            .clone()
            .unwrap_or_else(|| spec.label.clone());
        match best.get(&key) {
            Some(existing) if existing.confidence >= spec.confidence => {}
            Some(_) => {
                best.insert(key, spec);
            }
            None => {
                order.push(key.clone());
                best.insert(key, spec);
            }
        }
    }
    order.into_iter().filter_map(|key| best.remove(&key)).collect()
}
