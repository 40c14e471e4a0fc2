//! The store contract consumed by the pipeline and query engines.
//!
//! The production backing is a relational + vector store with transactions,
//! row locking, JSON columns, array containment, full text search, and
//! cosine-distance indexing. The core only sees this trait; the in-memory
//! implementation in [`crate::memory`] provides the same semantics for
//! tests and local runs.

use async_trait::async_trait;

use coldspec_core::{
    AuditEntry, Brand, ChunkId, ConflictId, Document, DocumentChunk, DocumentId,
    DocumentProductLink, EquivalenceRule, Family, IngestionJob, JobId, Product, ProductId,
    ProductRelationship, ProductSnapshot, SpecConflict, SpecRegistryEntry,
};

use crate::Result;

/// Outcome of a document insert keyed by checksum.
#[derive(Debug, Clone)]
pub enum DocumentInsert {
    Created(Document),
    /// Identical bytes were already ingested; the existing row is returned
    /// and nothing was written.
    Duplicate(Document),
}

impl DocumentInsert {
    pub fn document(&self) -> &Document {
        match self {
            DocumentInsert::Created(doc) | DocumentInsert::Duplicate(doc) => doc,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, DocumentInsert::Duplicate(_))
    }
}

/// Structured product finder predicate: an AND of equality, range,
/// contains-all, and free-text terms.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub brand_code: Option<String>,
    pub family_code: Option<String>,
    pub model_numbers: Vec<String>,
    pub capacity_min: Option<f64>,
    pub capacity_max: Option<f64>,
    pub temp_min_c: Option<f64>,
    pub temp_max_c: Option<f64>,
    pub door_type: Option<String>,
    /// Every listed certification must be present.
    pub certifications_all: Vec<String>,
    /// Case-insensitive match over model number, product line, description.
    pub text: Option<String>,
    pub include_discontinued: bool,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if !self.include_discontinued && !product.status.is_sellable() {
            return false;
        }
        if let Some(brand) = &self.brand_code {
            if !product.brand_code.eq_ignore_ascii_case(brand) {
                return false;
            }
        }
        if let Some(family) = &self.family_code {
            if !product.family_code.eq_ignore_ascii_case(family) {
                return false;
            }
        }
        if !self.model_numbers.is_empty()
            && !self
                .model_numbers
                .iter()
                .any(|m| m.eq_ignore_ascii_case(&product.model_number))
        {
            return false;
        }
        if let Some(min) = self.capacity_min {
            match product.storage_capacity_cuft {
                Some(cap) if cap >= min => {}
                _ => return false,
            }
        }
        if let Some(max) = self.capacity_max {
            match product.storage_capacity_cuft {
                Some(cap) if cap <= max => {}
                _ => return false,
            }
        }
        if let Some(min) = self.temp_min_c {
            match product.temp_range_min_c {
                Some(t) if t <= min => {}
                _ => return false,
            }
        }
        if let Some(max) = self.temp_max_c {
            match product.temp_range_max_c {
                Some(t) if t >= max => {}
                _ => return false,
            }
        }
        if let Some(door) = &self.door_type {
            match &product.door_type {
                Some(d) if d.eq_ignore_ascii_case(door) => {}
                _ => return false,
            }
        }
        for cert in &self.certifications_all {
            if !product.has_certification(cert) {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let haystack = format!(
                "{} {} {}",
                product.model_number,
                product.product_line.as_deref().unwrap_or(""),
                product.description.as_deref().unwrap_or(""),
            )
            .to_lowercase();
            if !haystack.contains(&needle) {
                return false;
            }
        }
        true
    }
}

/// Aggregate counts surfaced by the stats endpoint.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct CatalogStats {
    pub products: usize,
    pub documents: usize,
    pub chunks: usize,
    pub chunks_embedded: usize,
    pub pending_conflicts: usize,
    pub auto_discovered_specs: usize,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    // Documents

    async fn document_by_checksum(&self, checksum: &str) -> Result<Option<Document>>;
    async fn document(&self, id: DocumentId) -> Result<Option<Document>>;
    /// Insert keyed by checksum. Identical bytes return the existing row.
    async fn insert_document(&self, doc: Document) -> Result<DocumentInsert>;
    async fn update_document(&self, doc: &Document) -> Result<()>;

    // Products

    async fn product(&self, id: ProductId) -> Result<Option<Product>>;
    async fn product_by_model(&self, model_number: &str) -> Result<Option<Product>>;
    async fn create_product(&self, product: Product) -> Result<Product>;
    /// Persist a mutated product together with the pre-image snapshot, in
    /// one transaction. Enforces `(model_number, version)` uniqueness.
    async fn update_product(&self, product: Product, snapshot: ProductSnapshot) -> Result<Product>;
    async fn find_products(&self, filter: &ProductFilter) -> Result<Vec<Product>>;
    async fn snapshots(&self, product_id: ProductId) -> Result<Vec<ProductSnapshot>>;

    // Provenance

    async fn upsert_link(&self, link: DocumentProductLink) -> Result<()>;
    async fn links_for_product(&self, product_id: ProductId) -> Result<Vec<DocumentProductLink>>;

    // Chunks

    /// Rejects embeddings whose length differs from the configured
    /// dimension.
    async fn insert_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<()>;
    async fn delete_chunks_for_document(&self, document_id: DocumentId) -> Result<()>;
    async fn chunk(&self, id: ChunkId) -> Result<Option<DocumentChunk>>;
    async fn all_chunks(&self) -> Result<Vec<DocumentChunk>>;

    // Conflicts

    async fn insert_conflict(&self, conflict: SpecConflict) -> Result<()>;
    async fn conflict(&self, id: ConflictId) -> Result<Option<SpecConflict>>;
    async fn pending_conflicts(&self, product_id: Option<ProductId>) -> Result<Vec<SpecConflict>>;
    async fn update_conflict(&self, conflict: &SpecConflict) -> Result<()>;

    // Relationships

    async fn insert_relationship(&self, relationship: ProductRelationship) -> Result<()>;
    async fn relationships_from(&self, product_id: ProductId) -> Result<Vec<ProductRelationship>>;

    // Reference data

    async fn brands(&self) -> Result<Vec<Brand>>;
    async fn families(&self) -> Result<Vec<Family>>;
    async fn upsert_brand(&self, brand: Brand) -> Result<()>;
    async fn upsert_family(&self, family: Family) -> Result<()>;
    async fn equivalence_rule(&self, family_code: &str) -> Result<Option<EquivalenceRule>>;
    async fn upsert_equivalence_rule(&self, rule: EquivalenceRule) -> Result<()>;

    // Spec registry

    async fn registry_entries(&self) -> Result<Vec<SpecRegistryEntry>>;
    async fn upsert_registry_entry(&self, entry: SpecRegistryEntry) -> Result<()>;

    // Jobs

    async fn insert_job(&self, job: IngestionJob) -> Result<()>;
    async fn update_job(&self, job: &IngestionJob) -> Result<()>;
    async fn job(&self, id: JobId) -> Result<Option<IngestionJob>>;

    // Audit log: append-only, no update or delete exists on this trait.

    async fn append_audit(&self, entry: AuditEntry) -> Result<()>;
    async fn audit_entries(&self) -> Result<Vec<AuditEntry>>;

    // Stats

    async fn stats(&self) -> Result<CatalogStats>;
}
