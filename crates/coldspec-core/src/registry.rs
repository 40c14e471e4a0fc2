//! Spec registry entries: the canonical catalog of spec fields.
//!
//! The registry is the source of truth for normalization. Every key stored
//! under a product's `specs` map must resolve to an entry here; synonyms
//! feed label mapping only and never act as write keys.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{SpecDataType, UnitSystem};

/// How an alternate unit converts into the canonical unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum UnitConversion {
    /// Multiply the incoming value by this factor.
    Factor(f64),
    /// Apply a named conversion function (e.g. `convert_f_to_c`), resolved
    /// by the registry service's dispatch table.
    Named(String),
}

/// Closed value set for enum specs, or bounds for numeric ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AllowedValues {
    Enum(Vec<String>),
    NumericRange { min: f64, max: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecRegistryEntry {
    /// The single write key. Identifier-like, e.g. `storage_capacity_cuft`.
    pub canonical_name: String,
    pub display_name: String,
    pub data_type: SpecDataType,
    /// Canonical unit label, empty for unitless specs.
    #[serde(default)]
    pub unit: String,
    pub unit_system: UnitSystem,
    /// Family codes this spec applies to; empty means all families.
    #[serde(default)]
    pub family_scope: BTreeSet<String>,
    /// Case-insensitive label aliases used by the field mapper.
    #[serde(default)]
    pub synonyms: BTreeSet<String>,
    /// Alternate-unit label -> conversion into the canonical unit.
    #[serde(default)]
    pub unit_conversions: BTreeMap<String, UnitConversion>,
    #[serde(default)]
    pub allowed_values: Option<AllowedValues>,
    #[serde(default = "default_true")]
    pub is_filterable: bool,
    #[serde(default = "default_true")]
    pub is_comparable: bool,
    #[serde(default = "default_true")]
    pub is_searchable: bool,
    /// Any disagreement on a critical spec raises a `critical` conflict.
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default = "default_sort_order")]
    pub sort_order: i32,
    #[serde(default)]
    pub auto_discovered: bool,
    #[serde(default = "default_true")]
    pub approved: bool,
}

fn default_true() -> bool {
    true
}

fn default_sort_order() -> i32 {
    100
}

impl SpecRegistryEntry {
    pub fn new(canonical_name: impl Into<String>, data_type: SpecDataType) -> Self {
        let canonical_name = canonical_name.into();
        let display_name = display_name_for(&canonical_name);
        Self {
            canonical_name,
            display_name,
            data_type,
            unit: String::new(),
            unit_system: UnitSystem::None,
            family_scope: BTreeSet::new(),
            synonyms: BTreeSet::new(),
            unit_conversions: BTreeMap::new(),
            allowed_values: None,
            is_filterable: true,
            is_comparable: true,
            is_searchable: true,
            is_critical: false,
            sort_order: 100,
            auto_discovered: false,
            approved: true,
        }
    }

    /// A pending entry created by field-mapper auto-discovery.
    pub fn auto_discovered(canonical_name: impl Into<String>, data_type: SpecDataType) -> Self {
        let mut entry = Self::new(canonical_name, data_type);
        entry.auto_discovered = true;
        entry.approved = false;
        entry
    }

    pub fn with_unit(mut self, unit: impl Into<String>, system: UnitSystem) -> Self {
        self.unit = unit.into();
        self.unit_system = system;
        self
    }

    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms
            .extend(synonyms.into_iter().map(|s| s.into().to_lowercase()));
        self
    }

    pub fn with_conversion(mut self, alt_unit: impl Into<String>, conversion: UnitConversion) -> Self {
        self.unit_conversions.insert(alt_unit.into(), conversion);
        self
    }

    pub fn with_family_scope<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.family_scope.extend(families.into_iter().map(Into::into));
        self
    }

    pub fn critical(mut self) -> Self {
        self.is_critical = true;
        self
    }

    /// Empty scope matches every family.
    pub fn applies_to_family(&self, family_code: &str) -> bool {
        self.family_scope.is_empty() || self.family_scope.contains(family_code)
    }

    /// Adding a synonym is idempotent and never rewrites product data.
    pub fn add_synonym(&mut self, synonym: &str) -> bool {
        self.synonyms.insert(synonym.trim().to_lowercase())
    }
}

/// Per-family equivalence rule: which specs must match exactly, per-spec
/// numeric tolerances, and the tiebreak ordering used when ranking
/// near-equivalent products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquivalenceRule {
    pub family_code: String,
    #[serde(default)]
    pub required_match: Vec<String>,
    #[serde(default)]
    pub tolerance_map: BTreeMap<String, f64>,
    #[serde(default)]
    pub priority_specs: Vec<String>,
}

impl EquivalenceRule {
    pub fn new(family_code: impl Into<String>) -> Self {
        Self {
            family_code: family_code.into(),
            required_match: vec![
                "door_type".to_string(),
                "refrigerant".to_string(),
                "voltage_v".to_string(),
            ],
            // Catalog capacity figures are precise to a tenth of a cubic
            // foot, so the capacity tolerance is much tighter than the
            // electrical and weight ones.
            tolerance_map: BTreeMap::from([
                ("storage_capacity_cuft".to_string(), 0.005),
                ("amperage".to_string(), 0.10),
                ("product_weight_lbs".to_string(), 0.20),
            ]),
            priority_specs: vec![
                "uniformity_c".to_string(),
                "stability_c".to_string(),
                "energy_kwh_day".to_string(),
            ],
        }
    }

    pub fn tolerance_for(&self, spec_name: &str) -> Option<f64> {
        self.tolerance_map.get(spec_name).copied()
    }
}

fn display_name_for(canonical: &str) -> String {
    canonical
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_derivation() {
        let entry = SpecRegistryEntry::new("storage_capacity_cuft", SpecDataType::Numeric);
        assert_eq!(entry.display_name, "Storage Capacity Cuft");
    }

    #[test]
    fn test_empty_scope_matches_all_families() {
        let entry = SpecRegistryEntry::new("noise_dba", SpecDataType::Numeric);
        assert!(entry.applies_to_family("premier_lab_ref"));
        assert!(entry.applies_to_family("cryo_dewar"));
    }

    #[test]
    fn test_scoped_entry() {
        let entry = SpecRegistryEntry::new("ln2_capacity_liters", SpecDataType::Numeric)
            .with_family_scope(["cryo_dewar"]);
        assert!(entry.applies_to_family("cryo_dewar"));
        assert!(!entry.applies_to_family("premier_lab_ref"));
    }

    #[test]
    fn test_synonym_idempotence() {
        let mut entry = SpecRegistryEntry::new("storage_capacity_cuft", SpecDataType::Numeric);
        assert!(entry.add_synonym("Capacity"));
        assert!(!entry.add_synonym("capacity"));
        assert!(!entry.add_synonym("  CAPACITY "));
        assert_eq!(entry.synonyms.len(), 1);
    }

    #[test]
    fn test_auto_discovered_defaults() {
        let entry = SpecRegistryEntry::auto_discovered("mystery_field", SpecDataType::Text);
        assert!(entry.auto_discovered);
        assert!(!entry.approved);
        assert!(!entry.is_critical);
    }
}
