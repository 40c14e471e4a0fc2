//! Document ingestion pipeline.
//!
//! Turns uploaded product literature into catalog records and retrieval
//! chunks: dedup, text extraction, classification, brand and model-number
//! resolution, field mapping, compound-value parsing, conflict-aware
//! product upsert, chunking, and embedding.

pub mod chunking;
pub mod classifier;
pub mod compound;
pub mod extractors;
pub mod fields;
pub mod harvest;
pub mod pipeline;
pub mod resolver;

pub use chunking::{ChunkDraft, Chunker, ChunkingConfig};
pub use classifier::{classify_document, Classification};
pub use extractors::{ExtractorRegistry, PdfExtractor, PlainTextExtractor, TextExtraction, TextExtractor};
pub use fields::FieldMapper;
pub use pipeline::{IngestFile, IngestionPipeline, PipelineConfig};
pub use resolver::{ModelCandidate, ModelPattern, ModelResolver};

/// Error types for ingestion operations
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("pipeline cancelled")]
    Cancelled,

    #[error(transparent)]
    Catalog(#[from] coldspec_catalog::CatalogError),

    #[error(transparent)]
    Provider(#[from] coldspec_core::ProviderError),
}

pub type Result<T> = std::result::Result<T, IngestionError>;
