//! Spec registry service: cached label resolution, auto-discovery, and
//! unit normalization.
//!
//! The registry is read-mostly. Lookups are served from an in-memory cache;
//! writes go through the store and invalidate the cache so long-running
//! workers pick up auto-discovered specs without a restart.

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use regex::Regex;
use tracing::{debug, info};

use coldspec_core::{SpecDataType, SpecRegistryEntry, SpecValue, UnitConversion};

use crate::store::CatalogStore;
use crate::Result;

lazy_static! {
    /// Footnote markers and decorations stripped during label normalization.
    static ref LABEL_NOISE: Regex = Regex::new(r"[¹²³⁴*†]+").unwrap();
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9\s]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

#[derive(Default)]
struct Cache {
    by_name: HashMap<String, SpecRegistryEntry>,
    by_synonym: HashMap<String, String>,
}

pub struct SpecRegistry {
    store: Arc<dyn CatalogStore>,
    cache: RwLock<Cache>,
}

impl SpecRegistry {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(Cache::default()),
        }
    }

    /// Load (or reload) the cache from the store.
    pub async fn refresh(&self) -> Result<()> {
        let entries = self.store.registry_entries().await?;
        let mut cache = Cache::default();
        for entry in entries {
            for synonym in &entry.synonyms {
                cache
                    .by_synonym
                    .insert(normalize_label(synonym), entry.canonical_name.clone());
            }
            // A canonical name always resolves to itself.
            cache
                .by_synonym
                .insert(normalize_label(&entry.canonical_name), entry.canonical_name.clone());
            cache.by_name.insert(entry.canonical_name.clone(), entry);
        }
        debug!(entries = cache.by_name.len(), "Spec registry cache refreshed");
        *self.cache.write() = cache;
        Ok(())
    }

    pub fn lookup(&self, canonical_name: &str) -> Option<SpecRegistryEntry> {
        self.cache.read().by_name.get(canonical_name).cloned()
    }

    /// Resolve a raw document label to a canonical name. Pure and
    /// idempotent; matching is exact after normalization.
    pub fn resolve(&self, label: &str) -> Option<String> {
        self.cache.read().by_synonym.get(&normalize_label(label)).cloned()
    }

    pub fn entries(&self) -> Vec<SpecRegistryEntry> {
        self.cache.read().by_name.values().cloned().collect()
    }

    /// Register an unknown label as a pending auto-discovered spec.
    /// Idempotent on canonical name: re-registering returns the existing
    /// name without rewriting anything.
    pub async fn register_auto(&self, label: &str, sample_value: &str) -> Result<String> {
        if let Some(existing) = self.resolve(label) {
            return Ok(existing);
        }

        let canonical = canonical_name_for(label);
        if self.lookup(&canonical).is_some() {
            return Ok(canonical);
        }

        let data_type = infer_data_type(sample_value);
        let entry = SpecRegistryEntry::auto_discovered(canonical.clone(), data_type)
            .with_synonyms([label.to_string()]);
        self.store.upsert_registry_entry(entry).await?;
        self.refresh().await?;

        info!(canonical = %canonical, ?data_type, "Auto-discovered spec registered");
        Ok(canonical)
    }

    /// Approve a pending auto-discovered entry.
    pub async fn approve(&self, canonical_name: &str) -> Result<bool> {
        let Some(mut entry) = self.lookup(canonical_name) else {
            return Ok(false);
        };
        if entry.approved {
            return Ok(true);
        }
        entry.approved = true;
        self.store.upsert_registry_entry(entry).await?;
        self.refresh().await?;
        Ok(true)
    }

    /// Add a synonym to an existing entry. Idempotent; never rewrites
    /// product data.
    pub async fn add_synonym(&self, canonical_name: &str, synonym: &str) -> Result<bool> {
        let Some(mut entry) = self.lookup(canonical_name) else {
            return Ok(false);
        };
        if !entry.add_synonym(synonym) {
            return Ok(true);
        }
        self.store.upsert_registry_entry(entry).await?;
        self.refresh().await?;
        Ok(true)
    }

    /// Normalize an incoming numeric value into the entry's canonical
    /// unit. Values already labeled with the canonical unit (or with no
    /// unit at all) pass through untouched, which makes conversion
    /// idempotent.
    pub fn normalize_numeric(&self, entry: &SpecRegistryEntry, value: f64, unit_label: Option<&str>) -> f64 {
        let Some(label) = unit_label else {
            return value;
        };
        let label = label.trim();
        if label.is_empty() || label.eq_ignore_ascii_case(&entry.unit) {
            return value;
        }
        match entry.unit_conversions.get(label) {
            Some(UnitConversion::Factor(factor)) => value * factor,
            Some(UnitConversion::Named(name)) => named_conversion(name, value).unwrap_or(value),
            None => value,
        }
    }

    /// Coerce a parsed value into the variant the registry entry declares.
    pub fn coerce(&self, entry: &SpecRegistryEntry, value: SpecValue) -> SpecValue {
        match (entry.data_type, value) {
            (SpecDataType::Numeric, v) => match v.as_f64() {
                Some(n) => SpecValue::Numeric {
                    value: n,
                    unit: if entry.unit.is_empty() {
                        None
                    } else {
                        Some(entry.unit.clone())
                    },
                },
                None => v,
            },
            (SpecDataType::Boolean, SpecValue::Text(s)) => match parse_boolean(&s) {
                Some(b) => SpecValue::Boolean(b),
                None => SpecValue::Text(s),
            },
            (SpecDataType::Enum, SpecValue::Text(s)) => SpecValue::Enum(s),
            (SpecDataType::List, SpecValue::Text(s)) => SpecValue::List(
                s.split(',')
                    .map(|part| part.trim().to_string())
                    .filter(|part| !part.is_empty())
                    .collect(),
            ),
            (_, v) => v,
        }
    }
}

/// The fixed dispatch table for named conversions.
fn named_conversion(name: &str, value: f64) -> Option<f64> {
    match name {
        "convert_f_to_c" => Some(((value - 32.0) * 5.0 / 9.0 * 10.0).round() / 10.0),
        "convert_c_to_f" => Some(((value * 9.0 / 5.0 + 32.0) * 10.0).round() / 10.0),
        _ => None,
    }
}

/// Lowercase, strip footnote markers and punctuation, collapse whitespace.
pub fn normalize_label(label: &str) -> String {
    let lowered = label.trim().trim_end_matches(':').to_lowercase();
    let cleaned = LABEL_NOISE.replace_all(&lowered, "");
    let cleaned = NON_ALNUM.replace_all(&cleaned, " ");
    WHITESPACE.replace_all(cleaned.trim(), " ").to_string()
}

/// Derive an identifier-like canonical name from a raw label.
pub fn canonical_name_for(label: &str) -> String {
    normalize_label(label).replace(' ', "_")
}

/// Value-shape inference for auto-discovered specs: decimal -> numeric,
/// yes/no/true/false -> boolean, comma list -> list, else text.
pub fn infer_data_type(raw_value: &str) -> SpecDataType {
    let trimmed = raw_value.trim();
    if trimmed.parse::<f64>().is_ok() {
        return SpecDataType::Numeric;
    }
    if parse_boolean(trimmed).is_some() {
        return SpecDataType::Boolean;
    }
    if trimmed.contains(',') {
        return SpecDataType::List;
    }
    SpecDataType::Text
}

fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" => Some(true),
        "no" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCatalogStore;
    use coldspec_core::UnitSystem;

    async fn registry_with(entries: Vec<SpecRegistryEntry>) -> SpecRegistry {
        let store = Arc::new(MemoryCatalogStore::new(4));
        for entry in entries {
            store.upsert_registry_entry(entry).await.unwrap();
        }
        let registry = SpecRegistry::new(store);
        registry.refresh().await.unwrap();
        registry
    }

    #[test]
    fn test_label_normalization() {
        assert_eq!(normalize_label("Storage Capacity (cu. ft.)"), "storage capacity cu ft");
        assert_eq!(normalize_label("Uniformity¹ (Cabinet Air):"), "uniformity cabinet air");
        assert_eq!(normalize_label("  Rated   Amperage "), "rated amperage");
    }

    #[tokio::test]
    async fn test_resolve_via_synonym() {
        let registry = registry_with(vec![SpecRegistryEntry::new(
            "storage_capacity_cuft",
            SpecDataType::Numeric,
        )
        .with_synonyms(["Storage capacity (cu. ft)", "Cu. Ft"])])
        .await;

        assert_eq!(
            registry.resolve("STORAGE CAPACITY (CU. FT.)").as_deref(),
            Some("storage_capacity_cuft")
        );
        assert_eq!(registry.resolve("cu. ft").as_deref(), Some("storage_capacity_cuft"));
        assert_eq!(registry.resolve("storage_capacity_cuft").as_deref(), Some("storage_capacity_cuft"));
        assert_eq!(registry.resolve("flux capacitance"), None);
    }

    #[tokio::test]
    async fn test_register_auto_is_idempotent() {
        let registry = registry_with(vec![]).await;

        let first = registry.register_auto("Noise Pressure Level (dBA)", "41").await.unwrap();
        let second = registry.register_auto("Noise Pressure Level (dBA)", "41").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "noise_pressure_level_dba");

        let entry = registry.lookup(&first).unwrap();
        assert!(entry.auto_discovered);
        assert!(!entry.approved);
        assert_eq!(entry.data_type, SpecDataType::Numeric);
    }

    #[tokio::test]
    async fn test_approve_flips_pending_entry() {
        let registry = registry_with(vec![]).await;
        let name = registry.register_auto("Mystery Field", "hello").await.unwrap();
        assert!(!registry.lookup(&name).unwrap().approved);

        assert!(registry.approve(&name).await.unwrap());
        assert!(registry.lookup(&name).unwrap().approved);
    }

    #[test]
    fn test_data_type_inference() {
        assert_eq!(infer_data_type("26.5"), SpecDataType::Numeric);
        assert_eq!(infer_data_type("Yes"), SpecDataType::Boolean);
        assert_eq!(infer_data_type("false"), SpecDataType::Boolean);
        assert_eq!(infer_data_type("ETL, C-ETL, UL471"), SpecDataType::List);
        assert_eq!(infer_data_type("Hermetic"), SpecDataType::Text);
    }

    #[tokio::test]
    async fn test_unit_conversion_factor_and_idempotence() {
        let registry = registry_with(vec![SpecRegistryEntry::new(
            "product_weight_lbs",
            SpecDataType::Numeric,
        )
        .with_unit("lbs", UnitSystem::Imperial)
        .with_conversion("kg", UnitConversion::Factor(2.20462))])
        .await;

        let entry = registry.lookup("product_weight_lbs").unwrap();
        let converted = registry.normalize_numeric(&entry, 100.0, Some("kg"));
        assert!((converted - 220.462).abs() < 1e-9);

        // Once in canonical units, converting again is a no-op.
        let twice = registry.normalize_numeric(&entry, converted, Some("lbs"));
        assert_eq!(twice, converted);
        let no_unit = registry.normalize_numeric(&entry, converted, None);
        assert_eq!(no_unit, converted);
    }

    #[tokio::test]
    async fn test_named_conversion_fahrenheit() {
        let registry = registry_with(vec![SpecRegistryEntry::new(
            "temp_range_min_c",
            SpecDataType::Numeric,
        )
        .with_unit("°C", UnitSystem::Metric)
        .with_conversion("°F", UnitConversion::Named("convert_f_to_c".into()))])
        .await;

        let entry = registry.lookup("temp_range_min_c").unwrap();
        assert_eq!(registry.normalize_numeric(&entry, 36.0, Some("°F")), 2.2);
        assert_eq!(registry.normalize_numeric(&entry, 2.2, Some("°C")), 2.2);
    }

    #[tokio::test]
    async fn test_coerce_follows_registry_type() {
        let registry = registry_with(vec![
            SpecRegistryEntry::new("battery_backup", SpecDataType::Boolean),
            SpecRegistryEntry::new("certifications", SpecDataType::List),
        ])
        .await;

        let boolean = registry.lookup("battery_backup").unwrap();
        assert_eq!(
            registry.coerce(&boolean, SpecValue::text("Yes")),
            SpecValue::Boolean(true)
        );

        let list = registry.lookup("certifications").unwrap();
        assert_eq!(
            registry.coerce(&list, SpecValue::text("ETL, C-ETL")),
            SpecValue::List(vec!["ETL".into(), "C-ETL".into()])
        );
    }
}
