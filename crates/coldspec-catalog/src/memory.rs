//! In-memory reference implementation of [`CatalogStore`].
//!
//! Backs tests and local development. A single coarse `RwLock` stands in
//! for the production store's transactions: every multi-row write below
//! happens under one write guard, so readers never observe a product
//! without its snapshot.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use coldspec_core::{
    AuditEntry, Brand, ChunkId, ConflictId, ConflictResolution, Document, DocumentChunk,
    DocumentId, DocumentProductLink, EquivalenceRule, Family, IngestionJob, JobId, Product,
    ProductId, ProductRelationship, ProductSnapshot, SpecConflict, SpecRegistryEntry,
};

use crate::store::{CatalogStats, CatalogStore, DocumentInsert, ProductFilter};
use crate::{CatalogError, Result};

#[derive(Default)]
struct Inner {
    documents: HashMap<DocumentId, Document>,
    checksum_index: HashMap<String, DocumentId>,
    products: HashMap<ProductId, Product>,
    model_index: HashMap<String, ProductId>,
    snapshots: HashMap<ProductId, Vec<ProductSnapshot>>,
    links: Vec<DocumentProductLink>,
    chunks: HashMap<ChunkId, DocumentChunk>,
    chunk_keys: HashMap<(DocumentId, u32), ChunkId>,
    conflicts: HashMap<ConflictId, SpecConflict>,
    relationships: Vec<ProductRelationship>,
    brands: HashMap<String, Brand>,
    families: HashMap<String, Family>,
    equivalence_rules: HashMap<String, EquivalenceRule>,
    registry: HashMap<String, SpecRegistryEntry>,
    jobs: HashMap<JobId, IngestionJob>,
    audit: Vec<AuditEntry>,
}

pub struct MemoryCatalogStore {
    inner: RwLock<Inner>,
    embedding_dimension: usize,
}

impl MemoryCatalogStore {
    pub fn new(embedding_dimension: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            embedding_dimension,
        }
    }

    fn model_key(model_number: &str) -> String {
        model_number.trim().to_ascii_uppercase()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn document_by_checksum(&self, checksum: &str) -> Result<Option<Document>> {
        let inner = self.inner.read().await;
        Ok(inner
            .checksum_index
            .get(checksum)
            .and_then(|id| inner.documents.get(id))
            .cloned())
    }

    async fn document(&self, id: DocumentId) -> Result<Option<Document>> {
        Ok(self.inner.read().await.documents.get(&id).cloned())
    }

    async fn insert_document(&self, doc: Document) -> Result<DocumentInsert> {
        let mut inner = self.inner.write().await;
        if let Some(existing_id) = inner.checksum_index.get(&doc.checksum_sha256) {
            let existing = inner
                .documents
                .get(existing_id)
                .cloned()
                .ok_or_else(|| CatalogError::NotFound(existing_id.to_string()))?;
            return Ok(DocumentInsert::Duplicate(existing));
        }
        inner.checksum_index.insert(doc.checksum_sha256.clone(), doc.id);
        inner.documents.insert(doc.id, doc.clone());
        Ok(DocumentInsert::Created(doc))
    }

    async fn update_document(&self, doc: &Document) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.documents.contains_key(&doc.id) {
            return Err(CatalogError::NotFound(doc.id.to_string()));
        }
        inner.documents.insert(doc.id, doc.clone());
        Ok(())
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.inner.read().await.products.get(&id).cloned())
    }

    async fn product_by_model(&self, model_number: &str) -> Result<Option<Product>> {
        let inner = self.inner.read().await;
        Ok(inner
            .model_index
            .get(&Self::model_key(model_number))
            .and_then(|id| inner.products.get(id))
            .cloned())
    }

    async fn create_product(&self, product: Product) -> Result<Product> {
        let mut inner = self.inner.write().await;
        let key = Self::model_key(&product.model_number);
        if inner.model_index.contains_key(&key) {
            return Err(CatalogError::DuplicateKey(format!(
                "product {} already exists",
                product.model_number
            )));
        }
        inner.model_index.insert(key, product.id);
        inner.products.insert(product.id, product.clone());
        debug!(model_number = %product.model_number, "Product created");
        Ok(product)
    }

    async fn update_product(&self, product: Product, snapshot: ProductSnapshot) -> Result<Product> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .products
            .get(&product.id)
            .ok_or_else(|| CatalogError::NotFound(product.id.to_string()))?;

        // (model_number, version) is jointly unique; version must advance.
        if product.version <= existing.version {
            return Err(CatalogError::InvalidWrite(format!(
                "version must advance: {} -> {}",
                existing.version, product.version
            )));
        }
        if snapshot.version != existing.version {
            return Err(CatalogError::InvalidWrite(format!(
                "snapshot version {} does not match stored version {}",
                snapshot.version, existing.version
            )));
        }

        inner.snapshots.entry(product.id).or_default().push(snapshot);
        inner.products.insert(product.id, product.clone());
        debug!(model_number = %product.model_number, version = product.version, "Product updated");
        Ok(product)
    }

    async fn find_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let inner = self.inner.read().await;
        let mut found: Vec<Product> = inner
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.model_number.cmp(&b.model_number));
        Ok(found)
    }

    async fn snapshots(&self, product_id: ProductId) -> Result<Vec<ProductSnapshot>> {
        Ok(self
            .inner
            .read()
            .await
            .snapshots
            .get(&product_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_link(&self, link: DocumentProductLink) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner
            .links
            .iter_mut()
            .find(|l| l.document_id == link.document_id && l.product_id == link.product_id)
        {
            *existing = link;
        } else {
            inner.links.push(link);
        }
        Ok(())
    }

    async fn links_for_product(&self, product_id: ProductId) -> Result<Vec<DocumentProductLink>> {
        Ok(self
            .inner
            .read()
            .await
            .links
            .iter()
            .filter(|l| l.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn insert_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<()> {
        let mut inner = self.inner.write().await;
        for chunk in &chunks {
            if let Some(embedding) = &chunk.embedding {
                if embedding.len() != self.embedding_dimension {
                    return Err(CatalogError::InvalidWrite(format!(
                        "embedding dimension {} does not match configured {}",
                        embedding.len(),
                        self.embedding_dimension
                    )));
                }
            }
            let key = (chunk.document_id, chunk.chunk_index);
            if inner.chunk_keys.contains_key(&key) {
                return Err(CatalogError::DuplicateKey(format!(
                    "chunk {}/{} already exists",
                    chunk.document_id, chunk.chunk_index
                )));
            }
        }
        for chunk in chunks {
            inner.chunk_keys.insert((chunk.document_id, chunk.chunk_index), chunk.id);
            inner.chunks.insert(chunk.id, chunk);
        }
        Ok(())
    }

    async fn delete_chunks_for_document(&self, document_id: DocumentId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let ids: Vec<ChunkId> = inner
            .chunks
            .values()
            .filter(|c| c.document_id == document_id)
            .map(|c| c.id)
            .collect();
        for id in ids {
            if let Some(chunk) = inner.chunks.remove(&id) {
                inner.chunk_keys.remove(&(chunk.document_id, chunk.chunk_index));
            }
        }
        Ok(())
    }

    async fn chunk(&self, id: ChunkId) -> Result<Option<DocumentChunk>> {
        Ok(self.inner.read().await.chunks.get(&id).cloned())
    }

    async fn all_chunks(&self) -> Result<Vec<DocumentChunk>> {
        let inner = self.inner.read().await;
        let mut chunks: Vec<DocumentChunk> = inner.chunks.values().cloned().collect();
        chunks.sort_by_key(|c| (c.document_id, c.chunk_index));
        Ok(chunks)
    }

    async fn insert_conflict(&self, conflict: SpecConflict) -> Result<()> {
        self.inner.write().await.conflicts.insert(conflict.id, conflict);
        Ok(())
    }

    async fn conflict(&self, id: ConflictId) -> Result<Option<SpecConflict>> {
        Ok(self.inner.read().await.conflicts.get(&id).cloned())
    }

    async fn pending_conflicts(&self, product_id: Option<ProductId>) -> Result<Vec<SpecConflict>> {
        let inner = self.inner.read().await;
        let mut pending: Vec<SpecConflict> = inner
            .conflicts
            .values()
            .filter(|c| c.resolution == ConflictResolution::Pending)
            .filter(|c| product_id.map(|id| c.product_id == id).unwrap_or(true))
            .cloned()
            .collect();
        pending.sort_by_key(|c| c.created_at);
        Ok(pending)
    }

    async fn update_conflict(&self, conflict: &SpecConflict) -> Result<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .conflicts
            .get(&conflict.id)
            .ok_or_else(|| CatalogError::NotFound(conflict.id.to_string()))?;
        // pending -> terminal happens exactly once; terminal rows never
        // re-open.
        if stored.resolution.is_terminal() {
            return Err(CatalogError::ConflictClosed(conflict.id.to_string()));
        }
        inner.conflicts.insert(conflict.id, conflict.clone());
        Ok(())
    }

    async fn insert_relationship(&self, relationship: ProductRelationship) -> Result<()> {
        self.inner.write().await.relationships.push(relationship);
        Ok(())
    }

    async fn relationships_from(&self, product_id: ProductId) -> Result<Vec<ProductRelationship>> {
        Ok(self
            .inner
            .read()
            .await
            .relationships
            .iter()
            .filter(|r| r.source == product_id)
            .cloned()
            .collect())
    }

    async fn brands(&self) -> Result<Vec<Brand>> {
        let mut brands: Vec<Brand> = self.inner.read().await.brands.values().cloned().collect();
        brands.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(brands)
    }

    async fn families(&self) -> Result<Vec<Family>> {
        let mut families: Vec<Family> = self.inner.read().await.families.values().cloned().collect();
        families.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(families)
    }

    async fn upsert_brand(&self, brand: Brand) -> Result<()> {
        self.inner.write().await.brands.insert(brand.code.clone(), brand);
        Ok(())
    }

    async fn upsert_family(&self, family: Family) -> Result<()> {
        self.inner.write().await.families.insert(family.code.clone(), family);
        Ok(())
    }

    async fn equivalence_rule(&self, family_code: &str) -> Result<Option<EquivalenceRule>> {
        Ok(self
            .inner
            .read()
            .await
            .equivalence_rules
            .get(family_code)
            .cloned())
    }

    async fn upsert_equivalence_rule(&self, rule: EquivalenceRule) -> Result<()> {
        self.inner
            .write()
            .await
            .equivalence_rules
            .insert(rule.family_code.clone(), rule);
        Ok(())
    }

    async fn registry_entries(&self) -> Result<Vec<SpecRegistryEntry>> {
        let mut entries: Vec<SpecRegistryEntry> =
            self.inner.read().await.registry.values().cloned().collect();
        entries.sort_by(|a, b| a.canonical_name.cmp(&b.canonical_name));
        Ok(entries)
    }

    async fn upsert_registry_entry(&self, entry: SpecRegistryEntry) -> Result<()> {
        self.inner
            .write()
            .await
            .registry
            .insert(entry.canonical_name.clone(), entry);
        Ok(())
    }

    async fn insert_job(&self, job: IngestionJob) -> Result<()> {
        self.inner.write().await.jobs.insert(job.id, job);
        Ok(())
    }

    async fn update_job(&self, job: &IngestionJob) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.jobs.contains_key(&job.id) {
            return Err(CatalogError::NotFound(job.id.to_string()));
        }
        inner.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn job(&self, id: JobId) -> Result<Option<IngestionJob>> {
        Ok(self.inner.read().await.jobs.get(&id).cloned())
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<()> {
        self.inner.write().await.audit.push(entry);
        Ok(())
    }

    async fn audit_entries(&self) -> Result<Vec<AuditEntry>> {
        Ok(self.inner.read().await.audit.clone())
    }

    async fn stats(&self) -> Result<CatalogStats> {
        let inner = self.inner.read().await;
        Ok(CatalogStats {
            products: inner.products.len(),
            documents: inner.documents.len(),
            chunks: inner.chunks.len(),
            chunks_embedded: inner.chunks.values().filter(|c| c.embedding.is_some()).count(),
            pending_conflicts: inner
                .conflicts
                .values()
                .filter(|c| c.resolution == ConflictResolution::Pending)
                .count(),
            auto_discovered_specs: inner.registry.values().filter(|e| e.auto_discovered).count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldspec_core::{ChunkType, ConflictSeverity, SpecValue};

    fn store() -> MemoryCatalogStore {
        MemoryCatalogStore::new(4)
    }

    #[tokio::test]
    async fn test_document_checksum_idempotency() {
        let store = store();
        let doc = Document::new("a.pdf", "application/pdf", "abc123");

        let first = store.insert_document(doc.clone()).await.unwrap();
        assert!(!first.is_duplicate());

        let again = Document::new("a-renamed.pdf", "application/pdf", "abc123");
        let second = store.insert_document(again).await.unwrap();
        assert!(second.is_duplicate());
        assert_eq!(second.document().id, doc.id);
    }

    #[tokio::test]
    async fn test_duplicate_model_number_rejected() {
        let store = store();
        store
            .create_product(Product::new("ABT-HC-26S", "ABS", "premier_lab_ref"))
            .await
            .unwrap();
        let err = store
            .create_product(Product::new("abt-hc-26s", "ABS", "premier_lab_ref"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_update_requires_advancing_version_and_snapshot() {
        let store = store();
        let mut p = store
            .create_product(Product::new("ABT-HC-26S", "ABS", "premier_lab_ref"))
            .await
            .unwrap();

        let snapshot = ProductSnapshot::of(&p, "capacity change", "system");
        p.set_spec_value("storage_capacity_cuft", SpecValue::numeric(25.8));
        p.version = 2;
        store.update_product(p.clone(), snapshot).await.unwrap();

        let snapshots = store.snapshots(p.id).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].version, 1);

        // Stale version is rejected.
        let stale_snapshot = ProductSnapshot::of(&p, "stale", "system");
        let err = store.update_product(p, stale_snapshot).await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidWrite(_)));
    }

    #[tokio::test]
    async fn test_chunk_dimension_enforced() {
        let store = store();
        let doc_id = DocumentId::new();
        let mut chunk = DocumentChunk {
            id: ChunkId::new(),
            document_id: doc_id,
            chunk_index: 0,
            content: "text".into(),
            chunk_type: ChunkType::Text,
            page_number: None,
            section_title: None,
            product_ids: vec![],
            spec_names: vec![],
            embedding: Some(vec![0.1, 0.2]),
            token_count: 1,
        };
        let err = store.insert_chunks(vec![chunk.clone()]).await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidWrite(_)));

        chunk.embedding = Some(vec![0.1, 0.2, 0.3, 0.4]);
        store.insert_chunks(vec![chunk]).await.unwrap();
    }

    #[tokio::test]
    async fn test_chunk_index_uniqueness() {
        let store = store();
        let doc_id = DocumentId::new();
        let make = |idx| DocumentChunk {
            id: ChunkId::new(),
            document_id: doc_id,
            chunk_index: idx,
            content: "text".into(),
            chunk_type: ChunkType::Text,
            page_number: None,
            section_title: None,
            product_ids: vec![],
            spec_names: vec![],
            embedding: None,
            token_count: 1,
        };
        store.insert_chunks(vec![make(0), make(1)]).await.unwrap();
        let err = store.insert_chunks(vec![make(1)]).await.unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_terminal_conflict_never_reopens() {
        let store = store();
        let mut conflict = SpecConflict::pending(
            ProductId::new(),
            "storage_capacity_cuft",
            Some(SpecValue::numeric(26.0)),
            Some(SpecValue::numeric(25.8)),
            ConflictSeverity::Medium,
        );
        store.insert_conflict(conflict.clone()).await.unwrap();

        conflict.resolution = ConflictResolution::AcceptNew;
        store.update_conflict(&conflict).await.unwrap();

        conflict.resolution = ConflictResolution::Pending;
        let err = store.update_conflict(&conflict).await.unwrap_err();
        assert!(matches!(err, CatalogError::ConflictClosed(_)));
    }
}
