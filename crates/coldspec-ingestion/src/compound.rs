//! Compound-value parsers.
//!
//! Free-text spec values from data sheets carry several facts in one
//! string. Each parser here is a pure function with a declared grammar;
//! inputs outside the grammar fail soft, leaving the caller to store the
//! raw text.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SLASH_FRACTION: Regex = Regex::new(r"^(\d+)\s+(\d+)/(\d+)$").unwrap();
    static ref BARE_FRACTION: Regex = Regex::new(r"^(\d+)/(\d+)$").unwrap();
    static ref LEADING_DECIMAL: Regex = Regex::new(r"^(\d+\.?\d*)").unwrap();
    static ref CELSIUS: Regex = Regex::new(r"(-?\d+(?:\.\d+)?)\s*°?\s*C\b").unwrap();
    static ref FAHRENHEIT: Regex = Regex::new(r"(-?\d+(?:\.\d+)?)\s*°?\s*F\b").unwrap();
    static ref PLAIN_NUMBER: Regex = Regex::new(r"(-?\d+(?:\.\d+)?)").unwrap();
    static ref VOLTAGE_RANGE: Regex = Regex::new(r"(\d{2,3})\s*(?:-|–|to)\s*(\d{2,3})\s*V").unwrap();
    static ref VOLTAGE: Regex = Regex::new(r"(\d{2,3})\s*V").unwrap();
    static ref FREQUENCY: Regex = Regex::new(r"(\d{2})\s*Hz").unwrap();
    static ref AMPS: Regex = Regex::new(r"([\d.]+)\s*[Aa]mp").unwrap();
    static ref HORSEPOWER: Regex = Regex::new(r"(?i)(\d+\s*[/⁄]\s*\d+|\d+\.?\d*)\s*HP").unwrap();
    static ref PHASE: Regex = Regex::new(r"(?i)(\d)\s*PH\b").unwrap();
    static ref NEMA_PLUG: Regex = Regex::new(r"(?i)(NEMA[\s-]*\d+-\d+\w?)").unwrap();
    static ref BREAKER: Regex = Regex::new(r"(?i)(\d+)\s*A?\s*breaker").unwrap();
    static ref REFRIGERANT: Regex = Regex::new(r"(?i)\b(R-?\d{2,4}[a-z]?)\b").unwrap();
    static ref SHELF_COUNT: Regex = Regex::new(r"(?i)(\d+)\s*(?:total\s+)?shelv").unwrap();
    static ref SHELF_INCREMENT: Regex =
        Regex::new(r#"(?i)adjustable in\s+([\d½¼¾⅛⅜⅝⅞/⁄\s"]+?)\s*increment"#).unwrap();
    static ref WARRANTY_GENERAL: Regex =
        Regex::new(r"(?i)(?:\w+\s*)?\(?(\d+)\)?\s*years?\s*(?:parts?\s*(?:and|&)\s*labor|general|parts)").unwrap();
    static ref WARRANTY_COMPRESSOR: Regex =
        Regex::new(r"(?i)(?:\w+\s*)?\(?(\d+)\)?\s*years?\s*compressor").unwrap();
}

const UNICODE_FRACTIONS: &[(char, f64)] = &[
    ('½', 0.5),
    ('¼', 0.25),
    ('¾', 0.75),
    ('⅛', 0.125),
    ('⅜', 0.375),
    ('⅝', 0.625),
    ('⅞', 0.875),
    ('⅓', 0.333),
    ('⅔', 0.667),
];

/// Parse dimension strings like `23 ¾`, `48 5⁄8`, or `26 7/8` into a
/// decimal number of inches.
pub fn parse_fraction(text: &str) -> Option<f64> {
    let trimmed = text.trim().trim_end_matches(['"', '\'']).trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = trimmed.parse::<f64>() {
        return Some(value);
    }

    for (glyph, value) in UNICODE_FRACTIONS {
        if trimmed.contains(*glyph) {
            let whole = trimmed.replace(*glyph, "");
            let whole = whole.trim();
            let base = if whole.is_empty() {
                0.0
            } else {
                whole.parse::<f64>().ok()?
            };
            return Some(base + value);
        }
    }

    // Normalize the unicode fraction slash before matching.
    let normalized = trimmed.replace('⁄', "/");
    if let Some(caps) = SLASH_FRACTION.captures(&normalized) {
        let whole: f64 = caps[1].parse().ok()?;
        let num: f64 = caps[2].parse().ok()?;
        let den: f64 = caps[3].parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(whole + num / den);
    }
    if let Some(caps) = BARE_FRACTION.captures(&normalized) {
        let num: f64 = caps[1].parse().ok()?;
        let den: f64 = caps[2].parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(num / den);
    }

    LEADING_DECIMAL
        .captures(&normalized)
        .and_then(|caps| caps[1].parse().ok())
}

/// Parse temperature ranges like `1°C to 10°C` or `36°F – 46°F` into
/// Celsius bounds. Celsius readings win when both scales appear;
/// Fahrenheit-only input converts with one-decimal rounding. A single
/// reading fills only the minimum bound.
pub fn parse_temp_range(text: &str) -> (Option<f64>, Option<f64>) {
    if text.trim().is_empty() {
        return (None, None);
    }

    let celsius: Vec<f64> = CELSIUS
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();
    if celsius.len() >= 2 {
        return bounds(&celsius);
    }
    if celsius.len() == 1 {
        return (Some(celsius[0]), None);
    }

    let fahrenheit: Vec<f64> = FAHRENHEIT
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .map(f_to_c)
        .collect();
    if fahrenheit.len() >= 2 {
        return bounds(&fahrenheit);
    }
    if fahrenheit.len() == 1 {
        return (Some(fahrenheit[0]), None);
    }

    let plain: Vec<f64> = PLAIN_NUMBER
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();
    if plain.len() >= 2 {
        return bounds(&plain);
    }

    (None, None)
}

fn bounds(values: &[f64]) -> (Option<f64>, Option<f64>) {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    (Some(min), Some(max))
}

fn f_to_c(f: f64) -> f64 {
    ((f - 32.0) * 5.0 / 9.0 * 10.0).round() / 10.0
}

/// Electrical facts pulled from strings like `115V, 60 Hz, 3 Amps, 1/5 HP`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElectricalSpecs {
    pub voltage_v: Option<f64>,
    pub voltage_min: Option<f64>,
    pub voltage_max: Option<f64>,
    pub frequency_hz: Option<f64>,
    pub amperage: Option<f64>,
    pub horsepower: Option<String>,
    pub phase: Option<u32>,
    pub plug_type: Option<String>,
    pub breaker_amps: Option<f64>,
}

impl ElectricalSpecs {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub fn parse_electrical(text: &str) -> ElectricalSpecs {
    let mut out = ElectricalSpecs::default();
    if text.trim().is_empty() {
        return out;
    }

    if let Some(caps) = VOLTAGE_RANGE.captures(text) {
        let min: f64 = caps[1].parse().unwrap_or(0.0);
        let max: f64 = caps[2].parse().unwrap_or(0.0);
        out.voltage_min = Some(min);
        out.voltage_max = Some(max);
        out.voltage_v = Some((min + max) / 2.0);
    } else if let Some(caps) = VOLTAGE.captures(text) {
        out.voltage_v = caps[1].parse().ok();
    }

    if let Some(caps) = FREQUENCY.captures(text) {
        out.frequency_hz = caps[1].parse().ok();
    }
    if let Some(caps) = AMPS.captures(text) {
        out.amperage = caps[1].parse().ok();
    }
    if let Some(caps) = HORSEPOWER.captures(text) {
        out.horsepower = Some(caps[1].replace('⁄', "/").split_whitespace().collect());
    }
    if let Some(caps) = PHASE.captures(text) {
        out.phase = caps[1].parse().ok();
    }
    if let Some(caps) = NEMA_PLUG.captures(text) {
        out.plug_type = Some(caps[1].to_uppercase().replace(' ', "-"));
    }
    if let Some(caps) = BREAKER.captures(text) {
        out.breaker_amps = caps[1].parse().ok();
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorHinge {
    Left,
    Right,
    Both,
}

impl DoorHinge {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoorHinge::Left => "left",
            DoorHinge::Right => "right",
            DoorHinge::Both => "both",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DoorConfig {
    pub door_count: Option<u32>,
    pub door_type: Option<String>,
    pub door_hinge: Option<DoorHinge>,
    pub door_features: Vec<String>,
}

impl DoorConfig {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parse door strings like
/// `One swing solid door, self-closing, right hinged`.
pub fn parse_door_config(text: &str) -> DoorConfig {
    let mut out = DoorConfig::default();
    let t = text.to_lowercase();
    if t.trim().is_empty() {
        return out;
    }

    const COUNT_WORDS: &[(&str, u32)] = &[
        ("one", 1),
        ("single", 1),
        ("two", 2),
        ("double", 2),
        ("three", 3),
        ("four", 4),
        ("1", 1),
        ("2", 2),
        ("3", 3),
        ("4", 4),
    ];
    for (word, n) in COUNT_WORDS {
        if t.split_whitespace().any(|w| w.trim_matches(',') == *word) {
            out.door_count = Some(*n);
            break;
        }
    }

    if t.contains("glass") && t.contains("sliding") {
        out.door_type = Some("glass_sliding".into());
    } else if t.contains("glass") {
        out.door_type = Some("glass".into());
    } else if t.contains("solid") {
        out.door_type = Some("solid".into());
    } else if t.contains("stainless") {
        out.door_type = Some("stainless_steel".into());
    }

    let right = t.contains("right");
    let left = t.contains("left");
    out.door_hinge = match (left, right) {
        (true, true) => Some(DoorHinge::Both),
        (true, false) => Some(DoorHinge::Left),
        (false, true) => Some(DoorHinge::Right),
        (false, false) => None,
    };

    const FEATURES: &[(&str, &str)] = &[
        ("self-closing", "self_closing"),
        ("self closing", "self_closing"),
        ("magnetic", "magnetic_gasket"),
        ("vacuum insulated", "vacuum_insulated"),
        ("double pane", "double_pane"),
        ("not reversible", "non_reversible"),
        ("non-reversible", "non_reversible"),
        ("keyed lock", "keyed_lock"),
    ];
    for (marker, feature) in FEATURES {
        if t.contains(marker) && !out.door_features.iter().any(|f| f == feature) {
            out.door_features.push((*feature).to_string());
        }
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelfType {
    Adjustable,
    Fixed,
    Mixed,
}

impl ShelfType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShelfType::Adjustable => "adjustable",
            ShelfType::Fixed => "fixed",
            ShelfType::Mixed => "mixed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShelfConfig {
    pub shelf_count: Option<u32>,
    pub shelf_type: Option<ShelfType>,
    /// Decimal inches, unicode fractions normalized.
    pub shelf_adjustment_increment: Option<f64>,
}

impl ShelfConfig {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parse shelf strings like
/// `Four adjustable shelves (adjustable in ½" increments)`.
pub fn parse_shelf_config(text: &str) -> ShelfConfig {
    let mut out = ShelfConfig::default();
    let t = text.to_lowercase();
    if t.trim().is_empty() {
        return out;
    }

    const COUNT_WORDS: &[(&str, u32)] = &[
        ("one", 1),
        ("two", 2),
        ("three", 3),
        ("four", 4),
        ("five", 5),
        ("six", 6),
        ("seven", 7),
        ("eight", 8),
        ("nine", 9),
        ("ten", 10),
    ];
    for (word, n) in COUNT_WORDS {
        if t.split_whitespace().any(|w| w == *word) {
            out.shelf_count = Some(*n);
            break;
        }
    }
    if out.shelf_count.is_none() {
        if let Some(caps) = SHELF_COUNT.captures(&t) {
            out.shelf_count = caps[1].parse().ok();
        }
    }

    let adjustable = t.contains("adjustable");
    let fixed = t.contains("fixed");
    out.shelf_type = match (adjustable, fixed) {
        (true, true) => Some(ShelfType::Mixed),
        (true, false) => Some(ShelfType::Adjustable),
        (false, true) => Some(ShelfType::Fixed),
        (false, false) => None,
    };

    if let Some(caps) = SHELF_INCREMENT.captures(&t) {
        out.shelf_adjustment_increment = parse_fraction(&caps[1]);
    }

    out
}

/// Extract the first refrigerant code (e.g. `R290`) from free text.
pub fn parse_refrigerant(text: &str) -> Option<String> {
    REFRIGERANT
        .captures(text)
        .map(|caps| caps[1].to_uppercase().replace('-', ""))
}

/// Known certification tokens, matched in order.
const CERT_PATTERNS: &[(&str, &str)] = &[
    (r"C-?ETL", "C-ETL"),
    (r"\bETL\b", "ETL"),
    (r"UL\s*471", "UL471"),
    (r"UL[\s_]*60335(?:-1)?", "UL_60335-1"),
    (r"CSA\s*C22(?:\.2)?(?:[\s_]*No\.?\s*120)?", "CSA_C22.2_No120"),
    (r"ENERGY\s*STAR", "Energy_Star"),
    (r"NSF[\s/_-]*ANSI[\s/_-]*456|NSF[\s/_-]*456", "NSF_ANSI_456"),
    (r"EPA[\s_]*SNAP", "EPA_SNAP"),
    (r"\bFDA\b", "FDA"),
    (r"\bAABB\b", "AABB"),
    (r"\bCE\b", "CE"),
    (r"21\s*CFR", "21CFR_820"),
    (r"NFPA\s*45", "NFPA_45"),
    (r"NFPA\s*30", "NFPA_30"),
];

lazy_static! {
    static ref CERT_REGEXES: Vec<(Regex, &'static str)> = CERT_PATTERNS
        .iter()
        .map(|(pat, code)| (Regex::new(&format!("(?i){pat}")).unwrap(), *code))
        .collect();
}

/// Extract certification codes from text. Splits on commas and slashes
/// implicitly by scanning the whole string; output is a de-duplicated
/// list ordered by first appearance.
pub fn parse_certifications(text: &str) -> Vec<String> {
    let mut hits: Vec<(usize, &'static str)> = Vec::new();
    for (regex, code) in CERT_REGEXES.iter() {
        if let Some(m) = regex.find(text) {
            if !hits.iter().any(|(_, c)| c == code) {
                hits.push((m.start(), code));
            }
        }
    }
    hits.sort_by_key(|(pos, _)| *pos);
    hits.into_iter().map(|(_, code)| code.to_string()).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarrantyYears {
    pub general: Option<u32>,
    pub compressor: Option<u32>,
}

/// Parse warranty text like `Two (2) year parts and labor` and
/// `Five (5) year compressor parts`.
pub fn parse_warranty(text: &str) -> WarrantyYears {
    let mut out = WarrantyYears::default();
    if let Some(caps) = WARRANTY_COMPRESSOR.captures(text) {
        out.compressor = caps[1].parse().ok();
    }
    // Strip the compressor clause so "5 year compressor parts" does not
    // also read as a general parts warranty.
    let without_compressor = WARRANTY_COMPRESSOR.replace_all(text, "");
    if let Some(caps) = WARRANTY_GENERAL.captures(&without_compressor) {
        out.general = caps[1].parse().ok();
    }
    out
}
