//! Recommendation engine: use-case profiles, hard-constraint filtering,
//! weighted band scoring, side-by-side comparison, and bounded equivalence
//! traversal.

pub mod engine;
pub mod profiles;
pub mod scoring;

pub use engine::{
    CompareResponse, CompareRow, Constraints, Recommendation, RecommendationEngine,
    RecommendRequest, RecommendResponse, TraceStep,
};
pub use profiles::{resolve_use_case, use_case_profiles, SpecBand, UseCaseProfile};
pub use scoring::{band_score, certification_coverage, BandScore};

/// Error types for recommendation operations
#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Catalog(#[from] coldspec_catalog::CatalogError),
}

pub type Result<T> = std::result::Result<T, RecommendError>;
