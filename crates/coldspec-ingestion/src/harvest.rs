//! Field harvesting: pulls labelled values and format-specific spec
//! blocks out of extracted document text.
//!
//! Output is split in two: raw `(label, value)` pairs that still need the
//! field mapper, and `ExtractedSpec`s whose canonical names are known
//! positionally (dimension tables, performance metrics, cut-sheet rows).

use lazy_static::lazy_static;
use regex::Regex;

use coldspec_core::{DocType, ExtractedSpec, SpecValue};

use crate::compound::{parse_electrical, parse_fraction, parse_refrigerant, parse_temp_range};

lazy_static! {
    static ref KV_SPLIT: Regex = Regex::new(r"\t+|\s{3,}").unwrap();
    static ref DIMENSIONS_ANCHOR: Regex = Regex::new(r"(?i)dimensions").unwrap();
    static ref DOOR_SWING: Regex =
        Regex::new(r#"(?i)Door Swing[^\d]*(\d+[\s\d./⁄½¼¾⅛⅜⅝⅞]*)"#).unwrap();
    static ref TOTAL_OPEN_DEPTH: Regex =
        Regex::new(r#"(?i)Total open Depth[^\d]*(\d+[\s\d./⁄½¼¾⅛⅜⅝⅞]*)"#).unwrap();
    static ref FEATURE_NAME: Regex = Regex::new(r"(?m)^Product Name:\s*(.+)$").unwrap();
    static ref FEATURE_DESC: Regex = Regex::new(r"(?m)^Description:\s*(.+)$").unwrap();
    static ref FEATURE_CAPACITY: Regex =
        Regex::new(r"(?i)(\d+\.?\d*)\s*Cu\.?\s*Ft\.?\s*Capacity").unwrap();
    static ref FEATURE_TEMP: Regex =
        Regex::new(r"(?im)^.*?(?:operating|temperature).*?range[:\s]*(.+)$").unwrap();
    static ref FEATURE_ELECTRICAL: Regex = Regex::new(r"(?m)(1\d{2}\s*V[^\n]*)").unwrap();
    static ref FEATURE_DEFROST: Regex = Regex::new(r"(?i)(Manual|Auto|Cycle)\s*Defrost").unwrap();
    static ref FEATURE_EXT_DIMS: Regex = Regex::new(
        r#"(?i)Exterior\s*dimensions?:?\s*(\d+[\s\d./⁄½¼¾⅛⅜⅝⅞"]*)\s*W\s*x\s*(\d+[\s\d./⁄½¼¾⅛⅜⅝⅞"]*)\s*D\s*x\s*(\d+[\s\d./⁄½¼¾⅛⅜⅝⅞"]*)\s*H"#
    )
    .unwrap();
    static ref FEATURE_SHIP_WEIGHT: Regex =
        Regex::new(r"(?i)Shipping\s*Weight[:\s]*(\d+)\s*lbs").unwrap();
    static ref FEATURE_DOOR: Regex =
        Regex::new(r"(?im)^((?:One|Two|Double|Single)\s+(?:swing\s+)?[^\n]*door[^\n]*)$").unwrap();
    static ref FEATURE_SHELVES: Regex =
        Regex::new(r"(?im)^(\d+\s+(?:total\s+)?shelv[^\n]+|(?:One|Two|Three|Four|Five|Six)\s+[^\n]*shelv[^\n]+)$")
            .unwrap();
    static ref CUT_SHEET_HEADER: Regex = Regex::new(r"(?i)Cu\.?\s*Ft").unwrap();
    static ref CUT_CAPACITY: Regex = Regex::new(r"(\d+(?:\.\d+)?)\s+(?:Cycle|Manual|Auto)").unwrap();
    static ref CUT_DEFROST: Regex = Regex::new(r"(Cycle|Manual|Auto)").unwrap();
    static ref CUT_DOOR: Regex = Regex::new(r"\d\s+(Solid|Glass(?:\s*\(Sliding\))?)").unwrap();
    static ref CUT_HP: Regex = Regex::new(r"(\d+[⁄/]\d+)\s+\d").unwrap();
    static ref CUT_AMPS: Regex = Regex::new(r"\b(\d+(?:\.\d+)?)\s+\d+\s*lbs").unwrap();
    static ref CUT_WEIGHT: Regex = Regex::new(r"(\d+)\s*lbs").unwrap();
}

/// Scalar performance metrics and their anchor patterns.
const PERFORMANCE_PATTERNS: &[(&str, &str, &str)] = &[
    (r"(?i)Uniformity[^\n]*?([±+/-]+\s*\d+\.?\d*)\s*°?\s*C", "uniformity_c", "±°C"),
    (r"(?i)Stability[^\n]*?([±+/-]+\s*\d+\.?\d*)\s*°?\s*C", "stability_c", "±°C"),
    (
        r"(?i)Maximum temperature variation[^\n]*?([±+/-]?\s*\d+\.?\d*)\s*°?\s*C",
        "max_temp_variation_c",
        "°C",
    ),
    (r"(?i)Energy[^\n]*?(\d+\.?\d*)\s*k?Wh/day", "energy_kwh_day", "kWh/day"),
    (r"(?i)Heat Rejection[^\n]*?(\d+\.?\d*)\s*BTU", "heat_rejection_btu_hr", "BTU/hr"),
    (r"(?i)Noise[^\n]*?(\d+)\s*(?:or less|dBA)", "noise_dba", "dBA"),
    (r"(?i)Pull\s*down[^\n]*?(\d+)\s*min", "pulldown_time_min", "min"),
];

/// Cryogenic spec patterns for dewar and shipper descriptions.
const CRYO_PATTERNS: &[(&str, &str, &str)] = &[
    (r"(?i)(\d+)\s*(?:Total\s+)?(?:2ml\s+)?Vial\s*Capacity", "vial_capacity_2ml", ""),
    (r"(?i)(\d+)\s*Box\s*Capacity", "box_capacity", ""),
    (r"(?i)(\d+\.?\d*)\s*Liter\s*(?:Liquid\s*Nitrogen\s*)?Capacity", "ln2_capacity_liters", "liters"),
    (r"(?i)(\d+\.?\d*)\s*Day\s*(?:Static\s*)?Holding\s*Time", "static_holding_time_days", "days"),
    (r"(?i)Static\s*Holding\s*Time[:\s]*(\d+)\s*days", "static_holding_time_days", "days"),
    (r"(?i)Static\s*Evaporation\s*Rate[^\d]*(\d+\.?\d*)", "evaporation_rate_l_day", "L/day"),
    (r#"(?i)Neck\s*Diameter[:\s]*(\d+\.?\d*)"?"#, "neck_diameter_in", "in"),
    (r#"(?i)Exterior\s*Height[:\s]*(\d+\.?\d*)"?"#, "ext_height_in", "in"),
    (r"(?i)Weight\s*Empty[:\s]*(\d+\.?\d*)\s*lbs", "product_weight_lbs", "lbs"),
];

lazy_static! {
    static ref PERFORMANCE_REGEXES: Vec<(Regex, &'static str, &'static str)> = PERFORMANCE_PATTERNS
        .iter()
        .map(|(pat, canon, unit)| (Regex::new(pat).unwrap(), *canon, *unit))
        .collect();
    static ref CRYO_REGEXES: Vec<(Regex, &'static str, &'static str)> = CRYO_PATTERNS
        .iter()
        .map(|(pat, canon, unit)| (Regex::new(pat).unwrap(), *canon, *unit))
        .collect();
    static ref VACUUM_WARRANTY: Regex =
        Regex::new(r"(?i)(one|two|three|four|five|six|seven|\d+)\s*year[s]?\s*vacuum\s*warranty").unwrap();
}

/// Everything harvested from one document.
#[derive(Debug, Clone, Default)]
pub struct Harvest {
    /// Raw labelled pairs for the field mapper.
    pub pairs: Vec<(String, String)>,
    /// Specs whose canonical names were determined positionally.
    pub specs: Vec<ExtractedSpec>,
}

/// Route to format-specific extractors by document type.
pub fn harvest(text: &str, doc_type: DocType) -> Harvest {
    let mut out = Harvest::default();

    match doc_type {
        DocType::CutSheet => {
            out.specs.extend(extract_cut_sheet_table(text));
            out.specs.extend(extract_dimensions(text));
            out.pairs.extend(extract_kv_pairs(text));
        }
        DocType::ProductDataSheet | DocType::PerformanceDataSheet => {
            out.pairs.extend(extract_kv_pairs(text));
            out.specs.extend(extract_dimensions(text));
            out.specs.extend(extract_performance(text));
        }
        DocType::FeatureList => {
            out.extend(extract_feature_list(text));
            if has_cryo_markers(text) {
                out.specs.extend(extract_cryogenic(text));
            }
        }
        _ => {
            out.pairs.extend(extract_kv_pairs(text));
            if has_cryo_markers(text) {
                out.specs.extend(extract_cryogenic(text));
            }
        }
    }

    out
}

impl Harvest {
    fn extend(&mut self, other: Harvest) {
        self.pairs.extend(other.pairs);
        self.specs.extend(other.specs);
    }
}

fn has_cryo_markers(text: &str) -> bool {
    let t = text.to_uppercase();
    ["LIQUID NITROGEN", "VIAL CAPACITY", "CRYOGENIC", "VAPOR SHIPPER"]
        .iter()
        .any(|m| t.contains(m))
}

/// Extract `Key<TAB or 3+ spaces>Value` pairs from structured text.
pub fn extract_kv_pairs(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = KV_SPLIT.splitn(line, 2);
        let key = parts.next().unwrap_or("").trim();
        if let Some(value) = parts.next() {
            let value = value.trim();
            if key.len() > 2 && !value.is_empty() {
                pairs.push((key.to_string(), value.to_string()));
            }
        }
    }
    pairs
}

/// Parse the standard dimensions table: exterior and interior W/D/H rows
/// plus door swing and total open depth, all in fractional inches.
///
/// The rows are column-separated (tabs or 3+ spaces), so cells split
/// before fraction parsing rather than being matched in one regex.
pub fn extract_dimensions(text: &str) -> Vec<ExtractedSpec> {
    let mut specs = Vec::new();

    let Some(anchor) = DIMENSIONS_ANCHOR.find(text) else {
        return specs;
    };
    let mut end = (anchor.start() + 1500).min(text.len());
    while end < text.len() && !text.is_char_boundary(end) {
        end += 1;
    }
    let window = &text[anchor.start()..end];

    let rows: [(&str, [&str; 3]); 2] = [
        ("exterior", ["ext_width_in", "ext_depth_in", "ext_height_in"]),
        ("interior", ["int_width_in", "int_depth_in", "int_height_in"]),
    ];
    for (row_label, names) in rows {
        let Some((cells, raws)) = dimension_row(window, row_label) else {
            continue;
        };
        for (i, canon) in names.iter().enumerate() {
            specs.push(
                ExtractedSpec::new(*canon, raws[i].as_str())
                    .canonical(*canon)
                    .with_value(SpecValue::numeric_with_unit(cells[i], "in"))
                    .with_section("dimensions"),
            );
        }
    }

    for (regex, canon) in [(&*DOOR_SWING, "door_swing_in"), (&*TOTAL_OPEN_DEPTH, "total_open_depth_in")] {
        if let Some(caps) = regex.captures(window) {
            if let Some(value) = parse_fraction(&caps[1]) {
                specs.push(
                    ExtractedSpec::new(canon, caps[1].trim())
                        .canonical(canon)
                        .with_value(SpecValue::numeric_with_unit(value, "in"))
                        .with_section("dimensions"),
                );
            }
        }
    }

    specs
}

/// Find a `Exterior    28 3/8    36 3/4    81 3/4` style row and parse
/// its first three cells.
fn dimension_row(window: &str, row_label: &str) -> Option<([f64; 3], [String; 3])> {
    for line in window.lines() {
        let trimmed = line.trim();
        let lower = trimmed.to_lowercase();
        if !lower.starts_with(row_label) {
            continue;
        }
        let rest = trimmed[row_label.len()..].trim_start();
        let cells: Vec<(f64, String)> = KV_SPLIT
            .split(rest)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .filter_map(|c| parse_fraction(c).map(|v| (v, c.to_string())))
            .collect();
        if cells.len() >= 3 {
            return Some((
                [cells[0].0, cells[1].0, cells[2].0],
                [cells[0].1.clone(), cells[1].1.clone(), cells[2].1.clone()],
            ));
        }
    }
    None
}

/// Uniformity, stability, energy, noise, and related performance metrics.
pub fn extract_performance(text: &str) -> Vec<ExtractedSpec> {
    let mut specs = Vec::new();
    for (regex, canon, unit) in PERFORMANCE_REGEXES.iter() {
        if let Some(caps) = regex.captures(text) {
            let raw = caps[1].trim().to_string();
            let numeric: String = raw
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            if let Ok(value) = numeric.parse::<f64>() {
                specs.push(
                    ExtractedSpec::new(*canon, raw)
                        .canonical(*canon)
                        .with_value(SpecValue::numeric_with_unit(value, *unit))
                        .with_section("performance"),
                );
            }
        }
    }
    specs
}

/// Cryogenic product metrics: capacities, holding time, vacuum warranty.
pub fn extract_cryogenic(text: &str) -> Vec<ExtractedSpec> {
    let mut specs = Vec::new();
    for (regex, canon, unit) in CRYO_REGEXES.iter() {
        if specs.iter().any(|s: &ExtractedSpec| s.canonical_name.as_deref() == Some(*canon)) {
            continue;
        }
        if let Some(caps) = regex.captures(text) {
            if let Ok(value) = caps[1].parse::<f64>() {
                let mut spec = ExtractedSpec::new(*canon, caps[1].trim())
                    .canonical(*canon)
                    .with_value(SpecValue::numeric(value))
                    .with_section("cryogenic");
                if !unit.is_empty() {
                    spec.unit = Some((*unit).to_string());
                    spec.value = Some(SpecValue::numeric_with_unit(value, *unit));
                }
                specs.push(spec);
            }
        }
    }

    if let Some(caps) = VACUUM_WARRANTY.captures(text) {
        let years = match caps[1].to_lowercase().as_str() {
            "one" => Some(1.0),
            "two" => Some(2.0),
            "three" => Some(3.0),
            "four" => Some(4.0),
            "five" => Some(5.0),
            "six" => Some(6.0),
            "seven" => Some(7.0),
            digits => digits.parse().ok(),
        };
        if let Some(years) = years {
            specs.push(
                ExtractedSpec::new("vacuum_warranty_years", &caps[0])
                    .canonical("vacuum_warranty_years")
                    .with_value(SpecValue::numeric_with_unit(years, "years"))
                    .with_section("cryogenic"),
            );
        }
    }

    specs
}

/// Parse the compact one-row spec table on cut sheets:
/// `Cu. Ft | Defrost | Door | ... | H.P. | Amps | Weight`.
pub fn extract_cut_sheet_table(text: &str) -> Vec<ExtractedSpec> {
    let mut specs = Vec::new();

    let Some(header) = CUT_SHEET_HEADER.find(text) else {
        return specs;
    };
    let after = &text[header.start()..];
    let lines: Vec<&str> = after.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 2 {
        return specs;
    }
    let data = lines[1..lines.len().min(3)].join(" ");

    if let Some(caps) = CUT_CAPACITY.captures(&data) {
        if let Ok(value) = caps[1].parse::<f64>() {
            specs.push(
                ExtractedSpec::new("Cu. Ft", &caps[1])
                    .canonical("storage_capacity_cuft")
                    .with_value(SpecValue::numeric_with_unit(value, "cu.ft."))
                    .with_section("cut_sheet_table"),
            );
        }
    }
    if let Some(caps) = CUT_DEFROST.captures(&data) {
        specs.push(
            ExtractedSpec::new("Defrost", &caps[1])
                .canonical("defrost_type")
                .with_value(SpecValue::Enum(caps[1].to_lowercase()))
                .with_section("cut_sheet_table"),
        );
    }
    if let Some(caps) = CUT_DOOR.captures(&data) {
        let door = caps[1]
            .to_lowercase()
            .replace("(sliding)", "_sliding")
            .replace(' ', "");
        specs.push(
            ExtractedSpec::new("Door", &caps[0])
                .canonical("door_type")
                .with_value(SpecValue::Enum(door))
                .with_section("cut_sheet_table"),
        );
    }
    if let Some(refrigerant) = parse_refrigerant(&data) {
        specs.push(
            ExtractedSpec::new("Refrigerant", &refrigerant)
                .canonical("refrigerant")
                .with_value(SpecValue::Enum(refrigerant.clone()))
                .with_section("cut_sheet_table"),
        );
    }
    if let Some(caps) = CUT_HP.captures(&data) {
        specs.push(
            ExtractedSpec::new("H.P.", &caps[1])
                .canonical("horsepower")
                .with_value(SpecValue::Text(caps[1].replace('⁄', "/")))
                .with_section("cut_sheet_table"),
        );
    }
    if let Some(caps) = CUT_AMPS.captures(&data) {
        if let Ok(value) = caps[1].parse::<f64>() {
            specs.push(
                ExtractedSpec::new("Amps", &caps[1])
                    .canonical("amperage")
                    .with_value(SpecValue::numeric_with_unit(value, "A"))
                    .with_section("cut_sheet_table"),
            );
        }
    }
    if let Some(caps) = CUT_WEIGHT.captures(&data) {
        if let Ok(value) = caps[1].parse::<f64>() {
            specs.push(
                ExtractedSpec::new("Weight", &caps[1])
                    .canonical("product_weight_lbs")
                    .with_value(SpecValue::numeric_with_unit(value, "lbs"))
                    .with_section("cut_sheet_table"),
            );
        }
    }

    specs
}

/// Unstructured feature lists: pattern-anchored scalars plus raw door and
/// shelf lines for the compound parsers.
pub fn extract_feature_list(text: &str) -> Harvest {
    let mut out = Harvest::default();

    if let Some(caps) = FEATURE_NAME.captures(text) {
        out.specs.push(
            ExtractedSpec::new("Product Name", caps[1].trim())
                .canonical("product_name")
                .with_value(SpecValue::text(caps[1].trim())),
        );
    }
    if let Some(caps) = FEATURE_DESC.captures(text) {
        out.specs.push(
            ExtractedSpec::new("Description", caps[1].trim())
                .canonical("description")
                .with_value(SpecValue::text(caps[1].trim())),
        );
    }
    if let Some(caps) = FEATURE_CAPACITY.captures(text) {
        if let Ok(value) = caps[1].parse::<f64>() {
            out.specs.push(
                ExtractedSpec::new("Capacity", &caps[1])
                    .canonical("storage_capacity_cuft")
                    .with_value(SpecValue::numeric_with_unit(value, "cu.ft.")),
            );
        }
    }
    if let Some(caps) = FEATURE_TEMP.captures(text) {
        let raw = caps[1].trim();
        let (min, max) = parse_temp_range(raw);
        if let Some(min) = min {
            out.specs.push(
                ExtractedSpec::new("Temp Range Min", raw)
                    .canonical("temp_range_min_c")
                    .with_value(SpecValue::numeric_with_unit(min, "°C")),
            );
        }
        if let Some(max) = max {
            out.specs.push(
                ExtractedSpec::new("Temp Range Max", raw)
                    .canonical("temp_range_max_c")
                    .with_value(SpecValue::numeric_with_unit(max, "°C")),
            );
        }
    }
    if let Some(caps) = FEATURE_ELECTRICAL.captures(text) {
        let raw = caps[1].trim().to_string();
        let parsed = parse_electrical(&raw);
        if !parsed.is_empty() {
            out.pairs.push(("Facility Electrical Requirement".to_string(), raw));
        }
    }
    if let Some(refrigerant) = parse_refrigerant(text) {
        out.specs.push(
            ExtractedSpec::new("Refrigerant", &refrigerant)
                .canonical("refrigerant")
                .with_value(SpecValue::Enum(refrigerant.clone())),
        );
    }
    if let Some(caps) = FEATURE_DEFROST.captures(text) {
        out.specs.push(
            ExtractedSpec::new("Defrost", &caps[0])
                .canonical("defrost_type")
                .with_value(SpecValue::Enum(caps[1].to_lowercase())),
        );
    }
    if let Some(caps) = FEATURE_EXT_DIMS.captures(text) {
        for (i, canon) in ["ext_width_in", "ext_depth_in", "ext_height_in"].iter().enumerate() {
            if let Some(value) = parse_fraction(&caps[i + 1]) {
                out.specs.push(
                    ExtractedSpec::new(*canon, caps[i + 1].trim())
                        .canonical(*canon)
                        .with_value(SpecValue::numeric_with_unit(value, "in")),
                );
            }
        }
    }
    if let Some(caps) = FEATURE_SHIP_WEIGHT.captures(text) {
        if let Ok(value) = caps[1].parse::<f64>() {
            out.specs.push(
                ExtractedSpec::new("Shipping Weight", &caps[1])
                    .canonical("shipping_weight_lbs")
                    .with_value(SpecValue::numeric_with_unit(value, "lbs")),
            );
        }
    }
    if let Some(caps) = FEATURE_DOOR.captures(text) {
        out.pairs.push(("Door".to_string(), caps[1].trim().to_string()));
    }
    if let Some(caps) = FEATURE_SHELVES.captures(text) {
        out.pairs.push(("Shelves".to_string(), caps[1].trim().to_string()));
    }

    out
}
