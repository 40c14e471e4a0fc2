//! Text extractors: file bytes to plain text with per-page segments.
//!
//! PDFs delegate to the external byte→text provider; text and markdown
//! decode locally with lossy UTF-8 and synthesize pages from form feeds or
//! top-level headings.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use coldspec_core::{PdfPage, PdfTextProvider};

use crate::{IngestionError, Result};

/// Result of text extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextExtraction {
    pub plain_text: String,
    pub pages: Vec<PdfPage>,
    pub metadata: HashMap<String, String>,
}

impl TextExtraction {
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, content: &[u8]) -> Result<TextExtraction>;

    /// MIME prefixes this extractor accepts.
    fn supported_types(&self) -> Vec<&'static str>;

    fn can_handle(&self, mime_type: &str) -> bool {
        self.supported_types().iter().any(|t| mime_type.starts_with(t))
    }

    fn name(&self) -> &'static str;
}

impl std::fmt::Debug for dyn TextExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextExtractor").field("name", &self.name()).finish()
    }
}

/// Plain text and markdown extractor. Invalid UTF-8 decodes with
/// replacement characters rather than failing the document.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, content: &[u8]) -> Result<TextExtraction> {
        let text = String::from_utf8_lossy(content).into_owned();
        let pages = synthesize_pages(&text);

        let mut metadata = HashMap::new();
        metadata.insert("line_count".to_string(), text.lines().count().to_string());

        debug!(bytes = content.len(), pages = pages.len(), "Extracted plain text");

        Ok(TextExtraction {
            plain_text: text,
            pages,
            metadata,
        })
    }

    fn supported_types(&self) -> Vec<&'static str> {
        vec!["text/plain", "text/markdown", "text/x-markdown"]
    }

    fn name(&self) -> &'static str {
        "plain_text"
    }
}

/// PDF extractor backed by the external extraction service.
pub struct PdfExtractor {
    provider: Arc<dyn PdfTextProvider>,
}

impl PdfExtractor {
    pub fn new(provider: Arc<dyn PdfTextProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, content: &[u8]) -> Result<TextExtraction> {
        let result = self
            .provider
            .extract_text(content)
            .await
            .map_err(|e| IngestionError::ExtractionFailed(e.to_string()))?;

        if result.plain_text.trim().is_empty() {
            return Err(IngestionError::ExtractionFailed(
                "extraction service returned no text".to_string(),
            ));
        }

        let mut metadata = HashMap::new();
        metadata.insert("page_count".to_string(), result.pages.len().to_string());

        debug!(pages = result.pages.len(), "Extracted PDF text");

        Ok(TextExtraction {
            plain_text: result.plain_text,
            pages: result.pages,
            metadata,
        })
    }

    fn supported_types(&self) -> Vec<&'static str> {
        vec!["application/pdf"]
    }

    fn name(&self) -> &'static str {
        "pdf"
    }
}

/// Routes a MIME type (or filename) to the matching extractor.
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    pub fn new(pdf_provider: Arc<dyn PdfTextProvider>) -> Self {
        Self {
            extractors: vec![
                Arc::new(PdfExtractor::new(pdf_provider)),
                Arc::new(PlainTextExtractor),
            ],
        }
    }

    pub fn register(&mut self, extractor: Arc<dyn TextExtractor>) {
        self.extractors.push(extractor);
    }

    /// Unknown MIME types are an `UnsupportedFormat` error, not a silent
    /// fallback.
    pub fn for_mime(&self, mime_type: &str) -> Result<Arc<dyn TextExtractor>> {
        self.extractors
            .iter()
            .find(|e| e.can_handle(mime_type))
            .cloned()
            .ok_or_else(|| IngestionError::UnsupportedFormat(mime_type.to_string()))
    }

    pub fn for_filename(&self, filename: &str) -> Result<Arc<dyn TextExtractor>> {
        let mime = mime_guess::from_path(filename).first_or_octet_stream().to_string();
        self.for_mime(&mime)
    }
}

/// Split raw text into page segments on form feeds; documents without
/// form feeds become one page.
fn synthesize_pages(text: &str) -> Vec<PdfPage> {
    let segments: Vec<&str> = if text.contains('\u{0c}') {
        text.split('\u{0c}').collect()
    } else {
        vec![text]
    };
    segments
        .into_iter()
        .enumerate()
        .filter(|(_, s)| !s.trim().is_empty())
        .map(|(i, s)| PdfPage {
            page_no: (i + 1) as u32,
            text: s.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldspec_core::{PdfText, ProviderError};

    struct FixedPdfProvider {
        text: String,
    }

    #[async_trait]
    impl PdfTextProvider for FixedPdfProvider {
        async fn extract_text(&self, _bytes: &[u8]) -> std::result::Result<PdfText, ProviderError> {
            Ok(PdfText {
                plain_text: self.text.clone(),
                pages: vec![PdfPage {
                    page_no: 1,
                    text: self.text.clone(),
                }],
            })
        }
    }

    #[tokio::test]
    async fn test_plain_text_lossy_decode() {
        let extractor = PlainTextExtractor;
        let bytes = [b'h', b'i', 0xFF, b'!'];
        let result = extractor.extract(&bytes).await.unwrap();
        assert!(result.plain_text.starts_with("hi"));
        assert!(result.plain_text.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_form_feed_pages() {
        let extractor = PlainTextExtractor;
        let result = extractor.extract(b"page one\x0cpage two").await.unwrap();
        assert_eq!(result.pages.len(), 2);
        assert_eq!(result.pages[1].page_no, 2);
        assert_eq!(result.pages[1].text, "page two");
    }

    #[tokio::test]
    async fn test_pdf_empty_text_is_extraction_failed() {
        let provider = Arc::new(FixedPdfProvider { text: "  ".into() });
        let extractor = PdfExtractor::new(provider);
        let err = extractor.extract(b"%PDF-1.4").await.unwrap_err();
        assert!(matches!(err, IngestionError::ExtractionFailed(_)));
    }

    #[tokio::test]
    async fn test_registry_routing() {
        let provider = Arc::new(FixedPdfProvider { text: "doc".into() });
        let registry = ExtractorRegistry::new(provider);

        assert_eq!(registry.for_mime("application/pdf").unwrap().name(), "pdf");
        assert_eq!(registry.for_mime("text/plain").unwrap().name(), "plain_text");
        assert_eq!(registry.for_filename("sheet.md").unwrap().name(), "plain_text");

        let err = registry.for_mime("image/png").unwrap_err();
        assert!(matches!(err, IngestionError::UnsupportedFormat(_)));
    }
}
