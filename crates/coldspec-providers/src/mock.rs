//! Deterministic providers for tests and offline development.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use coldspec_core::{
    EmbeddingProvider, GenerationParams, Generator, PdfPage, PdfText, PdfTextProvider,
    ProviderError,
};

/// Embeds text as a normalized vector derived from its SHA-256 digest.
/// The same text always embeds to the same vector.
pub struct HashEmbeddingProvider {
    dimension: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        let mut values: Vec<f32> = (0..self.dimension)
            .map(|i| {
                let byte = digest[i % digest.len()];
                let salt = digest[(i * 7 + 3) % digest.len()];
                ((byte as i32 - 128) as f32 + (salt as f32 / 255.0)) / 128.0
            })
            .collect();
        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut values {
                *v /= norm;
            }
        }
        values
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Always fails, optionally recovering after a set number of calls.
/// Exercises retry and degradation paths.
pub struct FailingEmbeddingProvider {
    dimension: usize,
    transient: bool,
    fail_count: Option<usize>,
    calls: AtomicUsize,
    inner: HashEmbeddingProvider,
}

impl FailingEmbeddingProvider {
    /// Fails every call with a transient (503-style) error.
    pub fn always_transient(dimension: usize) -> Self {
        Self {
            dimension,
            transient: true,
            fail_count: None,
            calls: AtomicUsize::new(0),
            inner: HashEmbeddingProvider::new(dimension),
        }
    }

    /// Fails every call with a permanent (4xx-style) error.
    pub fn always_permanent(dimension: usize) -> Self {
        Self {
            dimension,
            transient: false,
            fail_count: None,
            calls: AtomicUsize::new(0),
            inner: HashEmbeddingProvider::new(dimension),
        }
    }

    /// Fails the first `n` calls transiently, then succeeds.
    pub fn recovers_after(dimension: usize, n: usize) -> Self {
        Self {
            dimension,
            transient: true,
            fail_count: Some(n),
            calls: AtomicUsize::new(0),
            inner: HashEmbeddingProvider::new(dimension),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(n) = self.fail_count {
            if call >= n {
                return self.inner.embed_batch(texts).await;
            }
        }
        if self.transient {
            Err(ProviderError::Transient("503 service unavailable".into()))
        } else {
            Err(ProviderError::Permanent("400 bad request".into()))
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Returns a fixed answer, recording nothing.
pub struct ScriptedGenerator {
    answer: String,
}

impl ScriptedGenerator {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
        }
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String, ProviderError> {
        Ok(self.answer.clone())
    }
}

/// Treats the input bytes as UTF-8 text, splitting pages on form feeds.
/// Stands in for the real extraction service in tests.
pub struct TextPassthroughPdfProvider;

#[async_trait]
impl PdfTextProvider for TextPassthroughPdfProvider {
    async fn extract_text(&self, bytes: &[u8]) -> Result<PdfText, ProviderError> {
        let text = String::from_utf8_lossy(bytes).into_owned();
        let pages = text
            .split('\u{0c}')
            .enumerate()
            .map(|(i, t)| PdfPage {
                page_no: (i + 1) as u32,
                text: t.to_string(),
            })
            .collect();
        Ok(PdfText {
            plain_text: text,
            pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_embedding_is_deterministic() {
        let provider = HashEmbeddingProvider::new(64);
        let a = provider.embed_batch(&["same text".to_string()]).await.unwrap();
        let b = provider.embed_batch(&["same text".to_string()]).await.unwrap();
        let c = provider.embed_batch(&["other text".to_string()]).await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a[0].len(), 64);

        let norm: f32 = a[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_failing_provider_recovers() {
        let provider = FailingEmbeddingProvider::recovers_after(8, 2);
        let texts = vec!["x".to_string()];

        assert!(provider.embed_batch(&texts).await.is_err());
        assert!(provider.embed_batch(&texts).await.is_err());
        assert!(provider.embed_batch(&texts).await.is_ok());
        assert_eq!(provider.call_count(), 3);
    }
}
