//! Model-number resolution.
//!
//! A priority-ordered pattern table is the sole source of brand-model
//! decoding: each pattern names the brand, family, and product line, and
//! maps regex capture groups onto canonical spec values (capacity digits,
//! door-type letters).

use std::collections::HashMap;

use regex::Regex;
use tracing::trace;

use coldspec_core::{ControllerTier, SpecValue};

/// One row of the model pattern table.
#[derive(Debug, Clone)]
pub struct ModelPattern {
    pub brand_code: String,
    pub regex: Regex,
    pub family_code: String,
    pub product_line: Option<String>,
    pub controller_tier: Option<ControllerTier>,
    /// Capture-group index -> canonical spec name for decoded numerics.
    pub field_map: Vec<(usize, String)>,
    /// Per-group mapping of captured literal to canonical enum value.
    pub value_map: HashMap<usize, HashMap<String, String>>,
    /// Higher priority patterns are checked first.
    pub priority: i32,
}

impl ModelPattern {
    fn new(brand: &str, pattern: &str, family: &str, priority: i32) -> Self {
        Self {
            brand_code: brand.to_string(),
            regex: Regex::new(pattern).expect("model pattern must compile"),
            family_code: family.to_string(),
            product_line: None,
            controller_tier: None,
            field_map: Vec::new(),
            value_map: HashMap::new(),
            priority,
        }
    }

    fn line(mut self, line: &str) -> Self {
        self.product_line = Some(line.to_string());
        self
    }

    fn tier(mut self, tier: ControllerTier) -> Self {
        self.controller_tier = Some(tier);
        self
    }

    fn capacity_group(mut self, group: usize) -> Self {
        self.field_map.push((group, "storage_capacity_cuft".to_string()));
        self
    }

    fn door_group(mut self, group: usize) -> Self {
        let map = HashMap::from([
            ("S".to_string(), "solid".to_string()),
            ("G".to_string(), "glass".to_string()),
        ]);
        self.value_map.insert(group, map);
        self
    }
}

/// A resolved model-number candidate with decoded fixed-column values.
#[derive(Debug, Clone)]
pub struct ModelCandidate {
    pub model_number: String,
    pub brand_code: String,
    pub family_code: String,
    pub product_line: Option<String>,
    pub controller_tier: Option<ControllerTier>,
    pub decoded: Vec<(String, SpecValue)>,
}

pub struct ModelResolver {
    patterns: Vec<ModelPattern>,
}

impl ModelResolver {
    pub fn new(mut patterns: Vec<ModelPattern>) -> Self {
        patterns.sort_by_key(|p| std::cmp::Reverse(p.priority));
        Self { patterns }
    }

    /// The curated pattern table for the known brands.
    pub fn with_defaults() -> Self {
        Self::new(default_patterns())
    }

    /// Resolve zero or more model candidates from extracted text.
    ///
    /// Patterns whose brand matches the hint (or all, with no hint) are
    /// tried in descending priority; the first match per distinct model
    /// number wins and later patterns do not overwrite it.
    pub fn resolve(&self, text: &str, brand_hint: Option<&str>) -> Vec<ModelCandidate> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut candidates: Vec<ModelCandidate> = Vec::new();

        for pattern in &self.patterns {
            if let Some(hint) = brand_hint {
                if !pattern.brand_code.eq_ignore_ascii_case(hint) {
                    continue;
                }
            }
            for caps in pattern.regex.captures_iter(text) {
                let model_number = caps[0].trim().to_string();
                let key = model_number.to_uppercase();
                if model_number.len() <= 2 || seen.contains_key(&key) {
                    continue;
                }
                // A shorter token inside an already-claimed model number is
                // the same physical model, not a second product
                // (`PH-ABT-HC-23S` also contains `ABT-HC-23S`).
                if seen.keys().any(|existing| existing.contains(&key)) {
                    continue;
                }

                let mut decoded = Vec::new();
                for (group, canonical) in &pattern.field_map {
                    if let Some(m) = caps.get(*group) {
                        if let Ok(value) = m.as_str().parse::<f64>() {
                            decoded.push((canonical.clone(), SpecValue::numeric(value)));
                        }
                    }
                }
                for (group, map) in &pattern.value_map {
                    if let Some(m) = caps.get(*group) {
                        let literal = m.as_str().to_uppercase();
                        let mapped = map.get(&literal).cloned().unwrap_or_else(|| literal.to_lowercase());
                        decoded.push(("door_type".to_string(), SpecValue::Enum(mapped)));
                    }
                }

                trace!(model = %model_number, family = %pattern.family_code, "Model pattern matched");
                seen.insert(key, candidates.len());
                candidates.push(ModelCandidate {
                    model_number,
                    brand_code: pattern.brand_code.clone(),
                    family_code: pattern.family_code.clone(),
                    product_line: pattern.product_line.clone(),
                    controller_tier: pattern.controller_tier,
                    decoded,
                });
            }
        }

        candidates
    }
}

fn default_patterns() -> Vec<ModelPattern> {
    vec![
        // ABS pharmacy lines outrank the generic ABT prefix patterns.
        ModelPattern::new("ABS", r"\bPH-ABT-HC-(\d+)(S|G)\b", "pharmacy_vaccine_ref", 95)
            .line("Pharmacy Premier")
            .capacity_group(1)
            .door_group(2),
        ModelPattern::new("ABS", r"\bPH-ABT-NSF-UCFS-(\w+)\b", "pharmacy_nsf_ref", 95)
            .line("Pharmacy NSF"),
        ModelPattern::new("ABS", r"\bABT-HC-BBR-(\d+)\b", "blood_bank_ref", 94)
            .line("Blood Bank")
            .capacity_group(1),
        ModelPattern::new("ABS", r"\bABT-HC-FRP-(\d+)\b", "flammable_storage_ref", 94)
            .line("Flammable Storage")
            .capacity_group(1),
        ModelPattern::new("ABS", r"\bABT-HC-CS-(\d+)\b", "chromatography_ref", 93)
            .line("Premier")
            .capacity_group(1),
        ModelPattern::new("ABS", r"\bABT-HC-(\d+)(S|G)\b", "premier_lab_ref", 90)
            .line("Premier")
            .capacity_group(1)
            .door_group(2),
        ModelPattern::new("ABS", r"\bABT-HC-(\d+)R\b", "standard_lab_ref", 90)
            .line("Standard")
            .capacity_group(1),
        ModelPattern::new("LABRepCo", r"\bLHT-(\d+)-FMP\b", "manual_defrost_freezer", 85)
            .line("Ultra Touch")
            .tier(ControllerTier::UltraTouch)
            .capacity_group(1),
        ModelPattern::new("LABRepCo", r"\bLHT-(\d+)-FASS\b", "auto_defrost_freezer", 85)
            .line("Ultra Touch FUTURA")
            .tier(ControllerTier::UltraTouch)
            .capacity_group(1),
        ModelPattern::new("LABRepCo", r"\bLHT-(\d+)-FM\b", "manual_defrost_freezer", 84)
            .line("FUTURA")
            .tier(ControllerTier::UltraTouch)
            .capacity_group(1),
        ModelPattern::new("LABRepCo", r"\bLHT-(\d+)-RFP\b", "flammable_storage_ref", 85)
            .line("Ultra Touch")
            .tier(ControllerTier::UltraTouch)
            .capacity_group(1),
        ModelPattern::new("LABRepCo", r"\bLHT-(\d+)-RFGS?\b", "premier_lab_ref", 84)
            .line("Ultra Touch")
            .tier(ControllerTier::UltraTouch)
            .capacity_group(1),
        ModelPattern::new("LABRepCo", r"\bLPVT-(\d+)-FA\b", "precision_freezer", 85)
            .line("Precision")
            .tier(ControllerTier::Precision)
            .capacity_group(1),
        ModelPattern::new("Corepoint", r"\bNSBR(\d+)(\w+)/(\d)\b", "premier_lab_ref", 80)
            .line("Corepoint"),
        ModelPattern::new("Corepoint", r"\bCP-(\w+)-(\d+)-(S|G)-HC\b", "premier_lab_ref", 80)
            .line("Corepoint")
            .capacity_group(2)
            .door_group(3),
        ModelPattern::new("Celsius", r"\bCEL-HC-BB-(\d+)\b", "blood_bank_ref", 80)
            .line("Celsius")
            .capacity_group(1),
        // Cryogenic dewars use a deliberately low priority: the short
        // V-{n} token is prone to false hits inside longer identifiers.
        ModelPattern::new("CBS", r"\bV-(\d+)\b", "cryo_dewar", 10).line("CryoSafe"),
    ]
}
