//! Contracts for the external collaborators: PDF text extraction, the
//! embedding provider, and the generator.
//!
//! All three surface the same two-way error split: transient failures are
//! retried by the caller with backoff, permanent failures degrade the stage
//! without aborting the pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Retryable: timeouts, 5xx, connection resets.
    #[error("transient provider failure: {0}")]
    Transient(String),
    /// Not retryable: 4xx, malformed responses, unsupported input.
    #[error("permanent provider failure: {0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

/// One extracted page of a PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfPage {
    pub page_no: u32,
    pub text: String,
}

/// Output of the external byte→text extraction service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfText {
    pub plain_text: String,
    pub pages: Vec<PdfPage>,
}

/// External PDF text extraction. Input bytes, output text; the service is
/// a black box to the core.
#[async_trait]
pub trait PdfTextProvider: Send + Sync {
    async fn extract_text(&self, bytes: &[u8]) -> Result<PdfText, ProviderError>;
}

/// Remote text→vector function. Batching is the caller's concern.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Fixed output dimension; chunk writes with any other length are
    /// rejected by the store.
    fn dimension(&self) -> usize;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.1,
        }
    }
}

/// Remote text→text function used by the ask adapter. The retrieval engine
/// never calls this itself; it only produces the context pack.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Transient("503".into()).is_transient());
        assert!(!ProviderError::Permanent("400".into()).is_transient());
    }
}
