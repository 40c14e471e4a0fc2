//! Query understanding.
//!
//! Pattern-based entity detection (model numbers, brands, certifications,
//! spec terms via registry synonyms) and weighted-regex intent
//! classification.

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use coldspec_catalog::registry::SpecRegistry;

/// Query intents the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    SpecLookup,
    Comparison,
    Recommendation,
    Compliance,
    General,
}

impl std::fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueryIntent::SpecLookup => "spec_lookup",
            QueryIntent::Comparison => "comparison",
            QueryIntent::Recommendation => "recommendation",
            QueryIntent::Compliance => "compliance",
            QueryIntent::General => "general",
        };
        write!(f, "{s}")
    }
}

struct IntentPattern {
    regex: Regex,
    weight: f64,
    intent: QueryIntent,
}

lazy_static! {
    static ref INTENT_PATTERNS: Vec<IntentPattern> = vec![
        IntentPattern {
            regex: Regex::new(r"(?i)\b(what\s+is|what\s+are|tell\s+me|specs?|specifications?|data\s+sheet|features)\b").unwrap(),
            weight: 0.9,
            intent: QueryIntent::SpecLookup,
        },
        IntentPattern {
            regex: Regex::new(r"(?i)\b(how\s+(tall|wide|deep|heavy|loud|cold|big|much))\b").unwrap(),
            weight: 0.8,
            intent: QueryIntent::SpecLookup,
        },
        IntentPattern {
            regex: Regex::new(r"(?i)\b(compare|versus|vs\.?|difference|better|which\s+one)\b").unwrap(),
            weight: 0.9,
            intent: QueryIntent::Comparison,
        },
        IntentPattern {
            regex: Regex::new(r"(?i)\b(recommend|suggest|looking\s+for|best|help\s+me\s+choose|what\s+should)\b").unwrap(),
            weight: 0.9,
            intent: QueryIntent::Recommendation,
        },
        IntentPattern {
            regex: Regex::new(r"(?i)\bi\s+need\s+a\b").unwrap(),
            weight: 0.7,
            intent: QueryIntent::Recommendation,
        },
        IntentPattern {
            regex: Regex::new(r"(?i)\b(comply|compliance|regulation|requirements?|cdc|vfc)\b").unwrap(),
            weight: 0.9,
            intent: QueryIntent::Compliance,
        },
        IntentPattern {
            regex: Regex::new(r"(?i)\b(certified|certification|nsf|aabb|nfpa|energy\s+star)\b").unwrap(),
            weight: 0.5,
            intent: QueryIntent::Compliance,
        },
    ];

    /// Model-number shapes across the known brands.
    static ref MODEL_TOKENS: Vec<Regex> = [
        r"\bPH-ABT-(?:HC|NSF)-[\w-]+\b",
        r"\bABT-HC-(?:CS-)?\d+[A-Z]?\b",
        r"\bLHT-\d+-[A-Z]+\b",
        r"\bLPVT-\d+-[A-Z]+\b",
        r"\bNSBR\d+\w+/\d\b",
        r"\bCEL-[\w-]+\b",
        r"\bCP-[\w-]+\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();

    static ref BRAND_TOKENS: Vec<(Regex, &'static str)> = [
        (r"(?i)American\s*Bio\s*Tech|(?-i)\bABS\b", "ABS"),
        (r"(?i)LABRepCo", "LABRepCo"),
        (r"(?i)Corepoint", "Corepoint"),
        (r"(?i)Celsius\s*Scientific", "Celsius"),
        (r"(?i)CryoSafe|(?-i)\bCBS\b", "CBS"),
    ]
    .iter()
    .map(|(p, code)| (Regex::new(p).unwrap(), *code))
    .collect();

    static ref CERT_TOKENS: Vec<(Regex, &'static str)> = [
        (r"(?i)nsf\s*/?\s*ansi\s*456|nsf\s*456", "NSF_ANSI_456"),
        (r"(?i)energy\s*star", "Energy_Star"),
        (r"(?i)\betl\b", "ETL"),
        (r"(?i)\bul\s*471\b", "UL471"),
        (r"(?i)\bfda\b", "FDA"),
        (r"(?i)\baabb\b", "AABB"),
        (r"(?i)nfpa\s*45", "NFPA_45"),
        (r"(?i)epa\s*snap", "EPA_SNAP"),
    ]
    .iter()
    .map(|(p, code)| (Regex::new(p).unwrap(), *code))
    .collect();
}

/// Family hints keyed on use-case vocabulary.
const FAMILY_KEYWORDS: &[(&str, &str)] = &[
    ("premier", "premier_lab_ref"),
    ("lab refrigerator", "premier_lab_ref"),
    ("pharmacy", "pharmacy_vaccine_ref"),
    ("vaccine", "pharmacy_vaccine_ref"),
    ("vaccine storage", "pharmacy_nsf_ref"),
    ("chromatography", "chromatography_ref"),
    ("hplc", "chromatography_ref"),
    ("blood bank", "blood_bank_ref"),
    ("blood product", "blood_bank_ref"),
    ("flammable", "flammable_storage_ref"),
    ("solvent", "flammable_storage_ref"),
    ("manual defrost", "manual_defrost_freezer"),
    ("auto defrost", "auto_defrost_freezer"),
    ("frost free", "auto_defrost_freezer"),
    ("dewar", "cryo_dewar"),
    ("cryogenic", "cryo_dewar"),
    ("liquid nitrogen", "cryo_dewar"),
];

/// Structured view of a raw query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub original: String,
    pub intent: QueryIntent,
    pub model_numbers: Vec<String>,
    pub brand_mentions: Vec<String>,
    pub cert_mentions: Vec<String>,
    /// Canonical spec names detected through registry synonyms.
    pub spec_mentions: Vec<String>,
    pub family_hints: Vec<String>,
    /// Synonyms of the detected specs, used to expand the embedded query.
    pub expanded_terms: Vec<String>,
}

impl ParsedQuery {
    /// The text handed to the embedding provider: the original query plus
    /// a few expansion terms for recall.
    pub fn expanded_text(&self) -> String {
        if self.expanded_terms.is_empty() {
            return self.original.clone();
        }
        let extra: Vec<&str> = self.expanded_terms.iter().take(5).map(String::as_str).collect();
        format!("{} {}", self.original, extra.join(" "))
    }
}

pub struct QueryParser {
    registry: Arc<SpecRegistry>,
}

impl QueryParser {
    pub fn new(registry: Arc<SpecRegistry>) -> Self {
        Self { registry }
    }

    pub fn parse(&self, raw: &str) -> ParsedQuery {
        let lowered = raw.to_lowercase();

        let mut model_numbers: Vec<String> = Vec::new();
        for regex in MODEL_TOKENS.iter() {
            for m in regex.find_iter(raw) {
                let token = m.as_str().to_uppercase();
                if !model_numbers.contains(&token)
                    && !model_numbers.iter().any(|existing| existing.contains(&token))
                {
                    model_numbers.push(token);
                }
            }
        }
        // Drop tokens that are substrings of a longer detected model.
        let snapshot = model_numbers.clone();
        model_numbers.retain(|token| {
            !snapshot
                .iter()
                .any(|other| other != token && other.contains(token.as_str()))
        });

        let brand_mentions: Vec<String> = BRAND_TOKENS
            .iter()
            .filter(|(regex, _)| regex.is_match(raw))
            .map(|(_, code)| code.to_string())
            .collect();

        let cert_mentions: Vec<String> = CERT_TOKENS
            .iter()
            .filter(|(regex, _)| regex.is_match(raw))
            .map(|(_, code)| code.to_string())
            .collect();

        let (spec_mentions, expanded_terms) = self.detect_specs(&lowered);

        let family_hints: Vec<String> = FAMILY_KEYWORDS
            .iter()
            .filter(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, family)| family.to_string())
            .fold(Vec::new(), |mut acc, family| {
                if !acc.contains(&family) {
                    acc.push(family);
                }
                acc
            });

        let intent = classify_intent(raw, &model_numbers);

        debug!(
            %intent,
            models = model_numbers.len(),
            specs = spec_mentions.len(),
            "Query parsed"
        );

        ParsedQuery {
            original: raw.to_string(),
            intent,
            model_numbers,
            brand_mentions,
            cert_mentions,
            spec_mentions,
            family_hints,
            expanded_terms,
        }
    }

    /// Detect canonical spec mentions by scanning the registry's synonym
    /// sets, and collect expansion terms for the detected specs.
    fn detect_specs(&self, lowered_query: &str) -> (Vec<String>, Vec<String>) {
        let mut mentions = Vec::new();
        let mut expansions = Vec::new();

        for entry in self.registry.entries() {
            if !entry.is_searchable {
                continue;
            }
            let mut hit = false;
            for synonym in &entry.synonyms {
                if lowered_query.contains(synonym.as_str()) {
                    hit = true;
                    break;
                }
            }
            if !hit {
                let readable = entry.canonical_name.replace('_', " ");
                if lowered_query.contains(&readable) {
                    hit = true;
                }
            }
            if hit && !mentions.contains(&entry.canonical_name) {
                mentions.push(entry.canonical_name.clone());
                expansions.extend(entry.synonyms.iter().take(3).cloned());
            }
        }

        mentions.sort();
        expansions.sort();
        expansions.dedup();
        (mentions, expansions)
    }
}

fn classify_intent(raw: &str, model_numbers: &[String]) -> QueryIntent {
    let mut scores: HashMap<QueryIntent, f64> = HashMap::new();
    for pattern in INTENT_PATTERNS.iter() {
        if pattern.regex.is_match(raw) {
            *scores.entry(pattern.intent).or_insert(0.0) += pattern.weight;
        }
    }

    // Two model numbers strongly suggest a comparison.
    if model_numbers.len() >= 2 {
        *scores.entry(QueryIntent::Comparison).or_insert(0.0) += 0.8;
    }

    let best = scores
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    match best {
        Some((intent, score)) if score > 0.0 => intent,
        _ if !model_numbers.is_empty() => QueryIntent::SpecLookup,
        _ => QueryIntent::General,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldspec_catalog::memory::MemoryCatalogStore;
    use coldspec_catalog::seed;
    use coldspec_catalog::store::CatalogStore;

    async fn parser() -> QueryParser {
        let store: Arc<dyn CatalogStore> = Arc::new(MemoryCatalogStore::new(4));
        seed::seed_store(&store).await.unwrap();
        let registry = SpecRegistry::new(store);
        registry.refresh().await.unwrap();
        QueryParser::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_model_number_detection() {
        let parser = parser().await;
        let parsed = parser.parse("storage capacity of ABT-HC-26S");
        assert_eq!(parsed.model_numbers, vec!["ABT-HC-26S"]);
        assert_eq!(parsed.intent, QueryIntent::SpecLookup);
    }

    #[tokio::test]
    async fn test_longer_model_token_wins() {
        let parser = parser().await;
        let parsed = parser.parse("specs for PH-ABT-HC-23S");
        assert_eq!(parsed.model_numbers, vec!["PH-ABT-HC-23S"]);
    }

    #[tokio::test]
    async fn test_comparison_intent_from_two_models() {
        let parser = parser().await;
        let parsed = parser.parse("ABT-HC-26S or ABT-HC-26G?");
        assert_eq!(parsed.intent, QueryIntent::Comparison);
        assert_eq!(parsed.model_numbers.len(), 2);
    }

    #[tokio::test]
    async fn test_compliance_intent_and_cert_detection() {
        let parser = parser().await;
        let parsed = parser.parse("Which units meet NSF/ANSI 456 requirements for vaccine storage?");
        assert_eq!(parsed.intent, QueryIntent::Compliance);
        assert!(parsed.cert_mentions.contains(&"NSF_ANSI_456".to_string()));
        assert!(parsed.family_hints.contains(&"pharmacy_vaccine_ref".to_string()));
    }

    #[tokio::test]
    async fn test_recommendation_intent() {
        let parser = parser().await;
        let parsed = parser.parse("I need a lab refrigerator around 26 cubic feet");
        assert_eq!(parsed.intent, QueryIntent::Recommendation);
    }

    #[tokio::test]
    async fn test_spec_mention_via_registry_synonym() {
        let parser = parser().await;
        let parsed = parser.parse("what is the noise level of this unit");
        assert!(parsed.spec_mentions.contains(&"noise_dba".to_string()));
        assert!(!parsed.expanded_terms.is_empty());
    }

    #[tokio::test]
    async fn test_general_fallback() {
        let parser = parser().await;
        let parsed = parser.parse("hello there");
        assert_eq!(parsed.intent, QueryIntent::General);
        assert!(parsed.model_numbers.is_empty());
    }

    #[tokio::test]
    async fn test_expanded_text_includes_synonyms() {
        let parser = parser().await;
        let parsed = parser.parse("how much energy consumption does it have");
        let expanded = parsed.expanded_text();
        assert!(expanded.starts_with("how much energy consumption"));
        assert!(expanded.len() > parsed.original.len());
    }
}
