//! Catalog persistence contract and catalog-side services.
//!
//! The relational + vector store itself is an external collaborator; this
//! crate defines the transactional contract the core consumes
//! ([`store::CatalogStore`]), ships an in-memory reference implementation
//! used by tests and default wiring, and hosts the two services that sit
//! directly on top of the store: the spec registry and the conflict engine.

pub mod conflict;
pub mod memory;
pub mod registry;
pub mod seed;
pub mod store;

pub use conflict::{ConflictConfig, ConflictDecision, ConflictEngine};
pub use memory::MemoryCatalogStore;
pub use registry::SpecRegistry;
pub use store::{CatalogStats, CatalogStore, DocumentInsert, ProductFilter};

/// Error types for catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("invalid write: {0}")]
    InvalidWrite(String),

    #[error("conflict already resolved: {0}")]
    ConflictClosed(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
