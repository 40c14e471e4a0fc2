//! Core domain model for the coldspec product catalog.
//!
//! This crate holds everything the pipeline crates share: typed identifiers,
//! the domain enums and records (products, documents, chunks, conflicts,
//! registry entries), application configuration, and the traits that describe
//! the external providers (PDF text extraction, embeddings, generation).

pub mod config;
pub mod document;
pub mod product;
pub mod providers;
pub mod registry;
pub mod types;

pub use config::AppConfig;
pub use document::{
    AuditEntry, Document, DocumentChunk, DocumentProductLink, ExtractedSpec, IngestionJob,
    JobCounters, ProcessingLogEntry, SpecConflict,
};
pub use product::{Brand, Family, Product, ProductRelationship, ProductSnapshot};
pub use providers::{
    EmbeddingProvider, GenerationParams, Generator, PdfPage, PdfText, PdfTextProvider,
    ProviderError,
};
pub use registry::{AllowedValues, EquivalenceRule, SpecRegistryEntry, UnitConversion};
pub use types::*;
