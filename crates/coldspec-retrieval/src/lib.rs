//! Retrieval engine: query understanding, hybrid vector + keyword search
//! fused with Reciprocal Rank Fusion, and token-budgeted context assembly
//! for a downstream generator.

pub mod context;
pub mod engine;
pub mod query;
pub mod search;

pub use context::{render_prompt, ContextChunk, ContextPack};
pub use engine::{cancellation_pair, CancelHandle, Cancellation, EngineConfig, RetrievalEngine};
pub use query::{ParsedQuery, QueryIntent, QueryParser};
pub use search::{reciprocal_rank_fusion, FusedHit, KeywordIndex, VectorIndex};

/// Error types for retrieval operations
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("query cancelled")]
    Cancelled,

    #[error(transparent)]
    Provider(#[from] coldspec_core::ProviderError),
}

impl From<coldspec_catalog::CatalogError> for RetrievalError {
    fn from(e: coldspec_catalog::CatalogError) -> Self {
        RetrievalError::RetrievalUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
