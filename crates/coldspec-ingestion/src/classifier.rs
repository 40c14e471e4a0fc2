//! Rule-based document classification: document type, brand, revision.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use coldspec_catalog::conflict::parse_revision_date;
use coldspec_core::DocType;

lazy_static! {
    static ref REVISION_TOKEN: Regex =
        Regex::new(r"(?i)Rev[_\s.\-]*\d{1,2}[.\-/]\d{1,2}[.\-/]\d{2,4}|Rev[_\s.\-]*\d{8}").unwrap();
    /// Dimensional callouts like `28 3/8" x 36 3/4"` or `71 x 36`.
    static ref DIMENSION_CALLOUT: Regex =
        Regex::new(r#"\d+[\s\d/⁄½¼¾⅛⅜⅝⅞"']*\s*[xX×]\s*\d+"#).unwrap();
}

/// Brand detection patterns, scanned in order; ties break on the earliest
/// match position in the text.
const BRAND_PATTERNS: &[(&str, &str)] = &[
    (r"(?i)American\s*Bio\s*Tech\s*Supply|(?-i)\bABS\b", "ABS"),
    (r"(?i)LABRepCo|LAB\s*Rep\s*Co", "LABRepCo"),
    (r"(?i)Corepoint\s*Scientific|\bCOREPOINT\b", "Corepoint"),
    (r"(?i)Celsius\s*Scientific|°celsius|\bCEL-", "Celsius"),
    (r"(?i)CryoSafe|CryoMizer|CryoPro|(?-i)\bCBS\b", "CBS"),
];

lazy_static! {
    static ref BRAND_REGEXES: Vec<(Regex, &'static str)> = BRAND_PATTERNS
        .iter()
        .map(|(pat, code)| (Regex::new(pat).unwrap(), *code))
        .collect();
}

const PERFORMANCE_MARKERS: &[&str] = &["TEMPERATURE PROBES", "UNIFORMITY", "STABILITY", "PROBE LOCATIONS"];

const DATA_SHEET_SECTIONS: &[&str] = &[
    "GENERAL DESCRIPTION",
    "REFRIGERATION SYSTEM",
    "CONTROLLER",
    "DIMENSIONS",
    "CERTIFICATIONS",
    "AGENCY LISTING",
];

const CRYO_MARKERS: &[&str] = &[
    "LIQUID NITROGEN",
    "CRYOGENIC",
    "CRYOMIZER",
    "VAPOR SHIPPER",
    "DEWAR",
    "VIAL CAPACITY",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub doc_type: DocType,
    pub brand_code: Option<String>,
    /// Raw revision token as it appears in the document.
    pub revision: Option<String>,
    /// The same revision normalized to a date, when parseable.
    pub revision_date: Option<NaiveDate>,
}

/// Classify a document from its extracted text and filename.
///
/// The priority ladder is deterministic: cut-sheet header, performance
/// markers, product data sheet, feature list, dimensional drawing, other.
pub fn classify_document(text: &str, filename: &str) -> Classification {
    let head: String = text.chars().take(2000).collect::<String>().to_uppercase();
    let fname = filename.to_uppercase();

    let doc_type = classify_type(&head, &fname, text);
    let brand_code = detect_brand(text);
    let revision = REVISION_TOKEN.find(text).map(|m| m.as_str().to_string());
    let revision_date = revision.as_deref().and_then(parse_revision_date);

    debug!(?doc_type, brand = ?brand_code, revision = ?revision, "Document classified");

    Classification {
        doc_type,
        brand_code,
        revision,
        revision_date,
    }
}

fn classify_type(head: &str, filename: &str, full_text: &str) -> DocType {
    if head.contains("CUTSHEET") || head.contains("CUT SHEET") || filename.contains("CUTSHEET") {
        return DocType::CutSheet;
    }

    let has_performance = PERFORMANCE_MARKERS.iter().any(|m| head.contains(m));
    let is_data_sheet = head.contains("PRODUCT DATA SHEET") || filename.contains("PRODUCT_DATA_SHEET");

    if is_data_sheet {
        if has_performance {
            return DocType::PerformanceDataSheet;
        }
        return DocType::ProductDataSheet;
    }

    if has_performance && head.contains("PERFORMANCE") {
        return DocType::PerformanceDataSheet;
    }

    // A short document led by "Product Name:" is a feature list.
    if head.contains("PRODUCT NAME:") && full_text.lines().count() < 60 {
        return DocType::FeatureList;
    }

    let section_hits = DATA_SHEET_SECTIONS.iter().filter(|s| head.contains(*s)).count();
    if section_hits >= 3 {
        return DocType::ProductDataSheet;
    }

    if CRYO_MARKERS.iter().any(|m| head.contains(m)) {
        return DocType::FeatureList;
    }

    if has_performance {
        return DocType::PerformanceDataSheet;
    }

    // Dimensional callouts with no other structure.
    if DIMENSION_CALLOUT.is_match(full_text) && section_hits == 0 {
        return DocType::DimensionalDrawing;
    }

    DocType::Other
}

/// Scan for brand markers; the earliest match in the text wins.
pub fn detect_brand(text: &str) -> Option<String> {
    let mut best: Option<(usize, &str)> = None;
    for (regex, code) in BRAND_REGEXES.iter() {
        if let Some(m) = regex.find(text) {
            match best {
                Some((pos, _)) if pos <= m.start() => {}
                _ => best = Some((m.start(), code)),
            }
        }
    }
    best.map(|(_, code)| code.to_string())
}
