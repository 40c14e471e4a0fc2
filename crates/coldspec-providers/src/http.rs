//! HTTP clients for the external providers.
//!
//! All three clients share the same construction pattern (pooled reqwest
//! client, per-call timeout) and the same error mapping: 4xx responses are
//! permanent, 5xx and transport errors are transient.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use coldspec_core::{
    EmbeddingProvider, GenerationParams, Generator, PdfPage, PdfText, PdfTextProvider,
    ProviderError,
};

fn build_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Permanent(format!("failed to build http client: {e}")))
}

fn map_status(status: StatusCode, body: String) -> ProviderError {
    if status.is_client_error() {
        ProviderError::Permanent(format!("{status}: {body}"))
    } else {
        ProviderError::Transient(format!("{status}: {body}"))
    }
}

fn map_transport(e: reqwest::Error) -> ProviderError {
    // Timeouts and connection failures are retryable.
    ProviderError::Transient(e.to_string())
}

// Embedding provider

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct HttpEmbeddingProvider {
    client: Client,
    api_url: String,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(
        api_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout)?,
            api_url: api_url.into(),
            model: model.into(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    #[instrument(skip(self, texts), fields(batch = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, body));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Permanent(format!("malformed embedding response: {e}")))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(ProviderError::Permanent(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        for embedding in &parsed.embeddings {
            if embedding.len() != self.dimension {
                return Err(ProviderError::Permanent(format!(
                    "embedding dimension {} does not match configured {}",
                    embedding.len(),
                    self.dimension
                )));
            }
        }

        debug!(batch = texts.len(), "Embedded batch");
        Ok(parsed.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// Generator

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct HttpGenerator {
    client: Client,
    api_url: String,
    model: String,
}

impl HttpGenerator {
    pub fn new(
        api_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout)?,
            api_url: api_url.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    #[instrument(skip(self, prompt, params))]
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ProviderError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };
        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Permanent(format!("malformed generation response: {e}")))?;
        Ok(parsed.response)
    }
}

// PDF text extraction

#[derive(Deserialize)]
struct ExtractResponse {
    text: String,
    #[serde(default)]
    pages: Vec<ExtractPage>,
}

#[derive(Deserialize)]
struct ExtractPage {
    page_no: u32,
    text: String,
}

pub struct HttpPdfTextProvider {
    client: Client,
    api_url: String,
}

impl HttpPdfTextProvider {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout)?,
            api_url: api_url.into(),
        })
    }
}

#[async_trait]
impl PdfTextProvider for HttpPdfTextProvider {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn extract_text(&self, bytes: &[u8]) -> Result<PdfText, ProviderError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("content-type", "application/pdf")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, body));
        }

        let parsed: ExtractResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Permanent(format!("malformed extraction response: {e}")))?;

        let pages = if parsed.pages.is_empty() {
            vec![PdfPage {
                page_no: 1,
                text: parsed.text.clone(),
            }]
        } else {
            parsed
                .pages
                .into_iter()
                .map(|p| PdfPage {
                    page_no: p.page_no,
                    text: p.text,
                })
                .collect()
        };

        Ok(PdfText {
            plain_text: parsed.text,
            pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(!map_status(StatusCode::BAD_REQUEST, String::new()).is_transient());
        assert!(!map_status(StatusCode::UNPROCESSABLE_ENTITY, String::new()).is_transient());
        assert!(map_status(StatusCode::SERVICE_UNAVAILABLE, String::new()).is_transient());
        assert!(map_status(StatusCode::INTERNAL_SERVER_ERROR, String::new()).is_transient());
    }
}
