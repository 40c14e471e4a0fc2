//! Structure-aware chunking for retrieval.
//!
//! Section headers mark natural boundaries; oversized sections sub-split
//! on paragraph breaks with a soft token target and a hard cap. Each chunk
//! carries its section title and a content-derived chunk type.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use coldspec_core::{ChunkType, DocType};

use crate::{IngestionError, Result};

/// Section headers that mark natural chunk boundaries in product
/// literature.
const SECTION_HEADERS: &[&str] = &[
    "GENERAL DESCRIPTION",
    "PRODUCT DESCRIPTION",
    "REFRIGERATION SYSTEM",
    "REFRIGERATION",
    "CONTROLLER TECHNOLOGY",
    "CONTROLLER & MONITORING",
    "CONTROLLER",
    "EXTERIOR DIMENSIONS",
    "INTERIOR DIMENSIONS",
    "DIMENSIONS",
    "FACILITY ELECTRICAL",
    "ELECTRICAL",
    "CERTIFICATIONS",
    "AGENCY LISTING",
    "TEMPERATURE PERFORMANCE",
    "PERFORMANCE",
    "WARRANTY",
    "ALARM MANAGEMENT",
    "ALARMS",
    "CONSTRUCTION",
    "SHELVING",
    "DOOR",
    "ACCESSORIES",
    "OPTIONS",
    "INSTALLATION",
    "OPERATIONAL ENVIRONMENT",
    "STANDARD FEATURES",
    "FEATURES",
];

lazy_static! {
    static ref SECTION_HEADER_LINE: Regex = {
        let alternatives = SECTION_HEADERS
            .iter()
            .map(|h| regex::escape(h))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?im)^\s*({alternatives})[\s:]*$")).unwrap()
    };
    static ref DIMENSION_HINT: Regex = Regex::new(r#"\d+[\s"]\s*[xX×]\s*\d+"#).unwrap();
    static ref SPEC_HINT: Regex = Regex::new(r"(?i)(Cu\.?\s*Ft|Defrost|Amps|R\d{3})").unwrap();
}

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Soft target size in tokens.
    pub target_tokens: usize,
    /// Hard cap; larger pieces keep splitting.
    pub max_tokens: usize,
    /// Minimum size; smaller fragments are dropped.
    pub min_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_tokens: 500,
            max_tokens: 800,
            min_tokens: 8,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_tokens == 0 {
            return Err(IngestionError::ValidationError(
                "target_tokens must be greater than 0".to_string(),
            ));
        }
        if self.max_tokens < self.target_tokens {
            return Err(IngestionError::ValidationError(
                "max_tokens must be at least target_tokens".to_string(),
            ));
        }
        Ok(())
    }
}

/// A chunk before ids, product links, and embeddings are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    pub content: String,
    pub section_title: Option<String>,
    pub chunk_type: ChunkType,
    pub token_count: u32,
}

pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Split document text into ordered chunk drafts.
    pub fn chunk(&self, text: &str, doc_type: DocType) -> Vec<ChunkDraft> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let sections = split_by_sections(text);
        let mut drafts = Vec::new();

        for (title, body) in sections {
            if estimate_tokens(&body) > self.config.max_tokens {
                for piece in self.split_by_size(&body) {
                    drafts.push(self.draft(piece, title.clone(), doc_type));
                }
            } else {
                drafts.push(self.draft(body, title, doc_type));
            }
        }

        drafts.retain(|d| d.token_count as usize >= self.config.min_tokens);
        debug!(chunks = drafts.len(), ?doc_type, "Document chunked");
        drafts
    }

    fn draft(&self, content: String, section_title: Option<String>, doc_type: DocType) -> ChunkDraft {
        let token_count = estimate_tokens(&content) as u32;
        let chunk_type = classify_chunk(section_title.as_deref(), &content, doc_type);
        ChunkDraft {
            content,
            section_title,
            chunk_type,
            token_count,
        }
    }

    /// Split oversized text on paragraph boundaries, accumulating toward
    /// the soft target; paragraphs above the hard cap split on sentence
    /// breaks.
    fn split_by_size(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut current = String::new();

        for paragraph in text.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }

            let candidate_tokens = estimate_tokens(&current) + estimate_tokens(paragraph);
            if !current.is_empty() && candidate_tokens > self.config.target_tokens {
                pieces.push(std::mem::take(&mut current));
            }

            if estimate_tokens(paragraph) > self.config.max_tokens {
                for sentence_piece in split_sentences(paragraph, self.config.max_tokens) {
                    pieces.push(sentence_piece);
                }
                continue;
            }

            if current.is_empty() {
                current = paragraph.to_string();
            } else {
                current.push_str("\n\n");
                current.push_str(paragraph);
            }
        }

        if !current.is_empty() {
            pieces.push(current);
        }
        pieces
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkingConfig::default()).expect("default chunking config is valid")
    }
}

/// Split text into `(section_title, body)` segments on known headers.
fn split_by_sections(text: &str) -> Vec<(Option<String>, String)> {
    let matches: Vec<(usize, usize, String)> = SECTION_HEADER_LINE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let title = title_case(caps.get(1)?.as_str());
            Some((whole.start(), whole.end(), title))
        })
        .collect();

    if matches.is_empty() {
        return vec![(None, text.trim().to_string())];
    }

    let mut sections = Vec::new();
    if matches[0].0 > 50 {
        sections.push((Some("Preamble".to_string()), text[..matches[0].0].trim().to_string()));
    }

    for (i, (_, end, title)) in matches.iter().enumerate() {
        let body_end = matches.get(i + 1).map(|m| m.0).unwrap_or(text.len());
        let body = text[*end..body_end].trim();
        if !body.is_empty() {
            sections.push((Some(title.clone()), body.to_string()));
        }
    }

    sections.retain(|(_, body)| !body.is_empty());
    sections
}

/// Classify a chunk by its section and content for retrieval filtering.
fn classify_chunk(section: Option<&str>, content: &str, _doc_type: DocType) -> ChunkType {
    if let Some(section) = section {
        let s = section.to_uppercase();
        if s.contains("DIMENSION") {
            return ChunkType::Dimensional;
        }
        if s.contains("PERFORMANCE") || s.contains("TEMPERATURE") {
            return ChunkType::PerformanceData;
        }
        if s.contains("DESCRIPTION") {
            return ChunkType::Description;
        }
        if s.contains("CERTIFICATION") || s.contains("AGENCY") {
            return ChunkType::SpecBlock;
        }
    }

    let c = content.to_uppercase();
    if DIMENSION_HINT.is_match(content) {
        return ChunkType::Dimensional;
    }
    if ["UNIFORMITY", "STABILITY", "PROBE"].iter().any(|m| c.contains(m)) {
        return ChunkType::PerformanceData;
    }
    if SPEC_HINT.is_match(content) {
        return ChunkType::SpecBlock;
    }

    ChunkType::Text
}

fn split_sentences(text: &str, max_tokens: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for sentence in text.split_inclusive(['.', '!', '?']) {
        if !current.is_empty() && estimate_tokens(&current) + estimate_tokens(sentence) > max_tokens {
            pieces.push(std::mem::take(&mut current));
        }
        current.push_str(sentence);
    }
    if !current.trim().is_empty() {
        pieces.push(current);
    }
    pieces
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rough token estimate, one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "ABT-HC-26S Premier Laboratory Refrigerator\n\
preamble text that is long enough to stand on its own as a chunk\n\
\n\
General Description\n\
American BioTech Supply Premier 26 cu. ft. laboratory refrigerator with solid door.\n\
\n\
Refrigeration System\n\
Hermetic compressor, R290 hydrocarbon refrigerant. Cycle defrost system included here.\n\
\n\
Dimensions\n\
Exterior    28 3/8\" x 36 3/4\" x 81 3/4\"\n\
\n\
Performance\n\
Uniformity ±1.4°C. Stability ±1.3°C. Energy consumption measured at 1.15 kWh/day.\n";

    #[test]
    fn test_sections_become_chunks() {
        let chunker = Chunker::default();
        let drafts = chunker.chunk(SHEET, DocType::ProductDataSheet);

        let titles: Vec<Option<&str>> = drafts.iter().map(|d| d.section_title.as_deref()).collect();
        assert!(titles.contains(&Some("Preamble")));
        assert!(titles.contains(&Some("General Description")));
        assert!(titles.contains(&Some("Refrigeration System")));
        assert!(titles.contains(&Some("Dimensions")));
        assert!(titles.contains(&Some("Performance")));
    }

    #[test]
    fn test_chunk_types_follow_sections() {
        let chunker = Chunker::default();
        let drafts = chunker.chunk(SHEET, DocType::ProductDataSheet);

        let type_of = |title: &str| {
            drafts
                .iter()
                .find(|d| d.section_title.as_deref() == Some(title))
                .map(|d| d.chunk_type)
        };
        assert_eq!(type_of("General Description"), Some(ChunkType::Description));
        assert_eq!(type_of("Dimensions"), Some(ChunkType::Dimensional));
        assert_eq!(type_of("Performance"), Some(ChunkType::PerformanceData));
        assert_eq!(type_of("Refrigeration System"), Some(ChunkType::SpecBlock));
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = Chunker::default();
        assert!(chunker.chunk("", DocType::Other).is_empty());
        assert!(chunker.chunk("   \n  ", DocType::Other).is_empty());
    }

    #[test]
    fn test_unstructured_text_is_single_chunk() {
        let chunker = Chunker::default();
        let drafts = chunker.chunk(
            "Just a paragraph of marketing copy with no section structure at all.",
            DocType::Marketing,
        );
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].section_title, None);
        assert_eq!(drafts[0].chunk_type, ChunkType::Text);
    }

    #[test]
    fn test_oversized_section_splits_on_paragraphs() {
        let paragraph = "Laboratory refrigeration copy sentence for sizing purposes. ".repeat(20);
        let long_body = format!(
            "General Description\n{}\n\n{}\n\n{}\n\n{}",
            paragraph, paragraph, paragraph, paragraph
        );
        let chunker = Chunker::default();
        let drafts = chunker.chunk(&long_body, DocType::ProductDataSheet);

        assert!(drafts.len() > 1);
        for draft in &drafts {
            assert!(draft.token_count as usize <= 900);
            assert_eq!(draft.section_title.as_deref(), Some("General Description"));
        }
    }

    #[test]
    fn test_config_validation() {
        let bad = ChunkingConfig {
            target_tokens: 0,
            ..ChunkingConfig::default()
        };
        assert!(bad.validate().is_err());

        let inverted = ChunkingConfig {
            target_tokens: 500,
            max_tokens: 100,
            min_tokens: 8,
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_token_estimate() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }
}
