//! Document records, chunks, provenance links, conflicts, jobs, and audit
//! entries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    ChunkId, ChunkType, ConflictId, ConflictResolution, ConflictSeverity, DocStatus, DocType,
    DocumentId, JobId, JobStatus, LinkRelevance, ProductId, SpecValue, UserRole,
};

/// One entry in a document's ordered processing log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    pub stage: String,
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProcessingLogEntry {
    pub fn new(stage: impl Into<String>, status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            status: status.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub doc_type: DocType,
    pub mime_type: String,
    /// Content-addressed object-store path, `documents/{sha[:2]}/{sha}`.
    pub source_uri: String,
    /// Idempotency key: a second upload of identical bytes is a no-op.
    pub checksum_sha256: String,
    #[serde(default)]
    pub file_size_bytes: Option<u64>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub brand_code: Option<String>,
    pub status: DocStatus,
    #[serde(default)]
    pub processing_log: Vec<ProcessingLogEntry>,
    /// Revision string parsed from the document, e.g. `Rev_03.18.25`.
    #[serde(default)]
    pub revision: Option<String>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        checksum_sha256: impl Into<String>,
    ) -> Self {
        let checksum = checksum_sha256.into();
        let prefix: String = checksum.chars().take(2).collect();
        Self {
            id: DocumentId::new(),
            filename: filename.into(),
            doc_type: DocType::Other,
            mime_type: mime_type.into(),
            source_uri: format!("documents/{prefix}/{checksum}"),
            checksum_sha256: checksum,
            file_size_bytes: None,
            page_count: None,
            extracted_text: None,
            brand_code: None,
            status: DocStatus::Pending,
            processing_log: Vec::new(),
            revision: None,
            version: 1,
            created_at: Utc::now(),
        }
    }

    pub fn log_stage(&mut self, stage: &str, status: &str, message: impl Into<String>) {
        self.processing_log
            .push(ProcessingLogEntry::new(stage, status, message));
    }
}

/// A spec value extracted from a document, before it is reconciled into a
/// product record. `parse_failed` marks values a compound parser could not
/// interpret; the conflict engine treats those as plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSpec {
    /// Raw label as seen in the document.
    pub label: String,
    #[serde(default)]
    pub canonical_name: Option<String>,
    pub raw_value: String,
    #[serde(default)]
    pub value: Option<SpecValue>,
    #[serde(default)]
    pub unit: Option<String>,
    pub confidence: f32,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub parse_failed: bool,
}

impl ExtractedSpec {
    pub fn new(label: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            canonical_name: None,
            raw_value: raw_value.into(),
            value: None,
            unit: None,
            confidence: 1.0,
            page: None,
            section: None,
            parse_failed: false,
        }
    }

    pub fn canonical(mut self, name: impl Into<String>) -> Self {
        self.canonical_name = Some(name.into());
        self
    }

    pub fn with_value(mut self, value: SpecValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn failed(mut self) -> Self {
        self.parse_failed = true;
        self.value = Some(SpecValue::Text(self.raw_value.clone()));
        self
    }
}

/// A retrieval unit: a slice of document text with metadata and an
/// optional embedding. `(document_id, chunk_index)` is unique and stable
/// across re-indexing of the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub chunk_index: u32,
    pub content: String,
    pub chunk_type: ChunkType,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub section_title: Option<String>,
    #[serde(default)]
    pub product_ids: Vec<ProductId>,
    #[serde(default)]
    pub spec_names: Vec<String>,
    /// None when the embedding provider failed permanently; retrieval
    /// degrades to lexical-only for such chunks.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    pub token_count: u32,
}

/// Provenance edge between a document and a product, carrying the specs
/// this document asserted for the product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentProductLink {
    pub document_id: DocumentId,
    pub product_id: ProductId,
    pub relevance: LinkRelevance,
    #[serde(default)]
    pub extracted_specs: BTreeMap<String, SpecValue>,
    pub confidence: f32,
}

/// An inconsistent spec value awaiting resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecConflict {
    pub id: ConflictId,
    pub product_id: ProductId,
    pub spec_name: String,
    #[serde(default)]
    pub existing_value: Option<SpecValue>,
    #[serde(default)]
    pub new_value: Option<SpecValue>,
    #[serde(default)]
    pub source_doc_id: Option<DocumentId>,
    #[serde(default)]
    pub existing_doc_id: Option<DocumentId>,
    pub severity: ConflictSeverity,
    pub resolution: ConflictResolution,
    #[serde(default)]
    pub resolved_value: Option<SpecValue>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SpecConflict {
    pub fn pending(
        product_id: ProductId,
        spec_name: impl Into<String>,
        existing_value: Option<SpecValue>,
        new_value: Option<SpecValue>,
        severity: ConflictSeverity,
    ) -> Self {
        Self {
            id: ConflictId::new(),
            product_id,
            spec_name: spec_name.into(),
            existing_value,
            new_value,
            source_doc_id: None,
            existing_doc_id: None,
            severity,
            resolution: ConflictResolution::Pending,
            resolved_value: None,
            resolved_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Aggregate counters for an ingestion job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounters {
    pub total_files: u32,
    pub processed_files: u32,
    pub failed_files: u32,
    pub skipped_duplicates: u32,
    pub new_products: u32,
    pub updated_products: u32,
    pub conflicts_found: u32,
    pub new_specs_discovered: u32,
    pub chunks_created: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionJob {
    pub id: JobId,
    pub status: JobStatus,
    pub counters: JobCounters,
    pub submitted_by: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl IngestionJob {
    pub fn new(submitted_by: impl Into<String>, total_files: u32) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Queued,
            counters: JobCounters {
                total_files,
                ..JobCounters::default()
            },
            submitted_by: submitted_by.into(),
            metadata: BTreeMap::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Append-only audit record. The storage layer enforces immutability:
/// no update, no delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub caller_id: String,
    pub role: UserRole,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        action: impl Into<String>,
        caller_id: impl Into<String>,
        role: UserRole,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            action: action.into(),
            caller_id: caller_id.into(),
            role,
            detail: detail.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_addressed_uri() {
        let doc = Document::new("sheet.pdf", "application/pdf", "ab12cd34");
        assert_eq!(doc.source_uri, "documents/ab/ab12cd34");
    }

    #[test]
    fn test_processing_log_order() {
        let mut doc = Document::new("sheet.pdf", "application/pdf", "ab12cd34");
        doc.log_stage("extraction", "ok", "3 pages");
        doc.log_stage("classification", "ok", "product_data_sheet");
        assert_eq!(doc.processing_log.len(), 2);
        assert_eq!(doc.processing_log[0].stage, "extraction");
        assert_eq!(doc.processing_log[1].stage, "classification");
    }

    #[test]
    fn test_failed_extracted_spec_keeps_raw_text() {
        let spec = ExtractedSpec::new("Door", "??unparseable??").failed();
        assert!(spec.parse_failed);
        assert_eq!(spec.value, Some(SpecValue::Text("??unparseable??".into())));
    }

    #[test]
    fn test_job_counters_start_at_zero() {
        let job = IngestionJob::new("tester", 4);
        assert_eq!(job.counters.total_files, 4);
        assert_eq!(job.counters.processed_files, 0);
        assert_eq!(job.status, JobStatus::Queued);
    }
}
