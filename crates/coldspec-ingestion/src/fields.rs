//! Field mapping: raw labelled values to canonical specs.
//!
//! Labels route three ways: compound labels go to the matching parser in
//! [`crate::compound`], scalar labels resolve through the registry's
//! synonym table, and anything else is returned as unknown so the caller
//! can trigger registry auto-discovery.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use coldspec_catalog::registry::{normalize_label, SpecRegistry};
use coldspec_core::{ExtractedSpec, SpecDataType, SpecValue};

use crate::compound::{
    parse_certifications, parse_door_config, parse_electrical, parse_refrigerant,
    parse_shelf_config, parse_temp_range, parse_warranty,
};

lazy_static! {
    static ref LEADING_NUMBER: Regex = Regex::new(r"-?\d+(?:\.\d+)?").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompoundKind {
    Door,
    Shelf,
    TempRange,
    Electrical,
    Refrigerant,
    Certifications,
    WarrantyGeneral,
    WarrantyCompressor,
}

/// Normalized label -> compound parser routing. Checked before registry
/// synonyms so these labels never resolve as plain scalars.
const COMPOUND_ROUTES: &[(&str, CompoundKind)] = &[
    ("door", CompoundKind::Door),
    ("int door", CompoundKind::Door),
    ("interior door", CompoundKind::Door),
    ("shelves", CompoundKind::Shelf),
    ("shelving", CompoundKind::Shelf),
    ("adjustable temperature range", CompoundKind::TempRange),
    ("temperature setpoint range", CompoundKind::TempRange),
    ("temperature range", CompoundKind::TempRange),
    ("operating temperature range", CompoundKind::TempRange),
    ("facility electrical requirement", CompoundKind::Electrical),
    ("electrical", CompoundKind::Electrical),
    ("refrigerant", CompoundKind::Refrigerant),
    ("agency listing and certification", CompoundKind::Certifications),
    ("agency listing", CompoundKind::Certifications),
    ("certifications", CompoundKind::Certifications),
    ("general warranty", CompoundKind::WarrantyGeneral),
    ("compressor warranty", CompoundKind::WarrantyCompressor),
    ("compressor parts warranty", CompoundKind::WarrantyCompressor),
];

/// Labels the positional extractors already consume; they never reach
/// synonym lookup or auto-discovery.
const IGNORED_LABELS: &[&str] = &["exterior", "interior", "dimensions", "product data sheet"];

/// Output of a mapping pass.
#[derive(Debug, Clone, Default)]
pub struct MappedFields {
    pub specs: Vec<ExtractedSpec>,
    /// Labels nothing matched; the pipeline registers these as
    /// auto-discovered specs.
    pub unknown: Vec<(String, String)>,
}

pub struct FieldMapper {
    registry: Arc<SpecRegistry>,
}

impl FieldMapper {
    pub fn new(registry: Arc<SpecRegistry>) -> Self {
        Self { registry }
    }

    /// Map raw `(label, value)` pairs into canonical extracted specs.
    pub fn map_pairs(&self, pairs: &[(String, String)]) -> MappedFields {
        let mut out = MappedFields::default();

        for (label, raw) in pairs {
            let normalized = normalize_label(label);
            if IGNORED_LABELS.contains(&normalized.as_str()) {
                continue;
            }

            if let Some((_, kind)) = COMPOUND_ROUTES.iter().find(|(key, _)| *key == normalized) {
                if !self.expand_compound(*kind, label, raw, &mut out.specs) {
                    // Outside the parser's grammar: soft-fail to unknown
                    // so the raw text is still kept, as text.
                    out.unknown.push((label.clone(), raw.clone()));
                }
                continue;
            }

            if let Some(canonical) = self.registry.resolve(label) {
                out.specs.push(self.scalar_spec(label, raw, &canonical));
                continue;
            }

            out.unknown.push((label.clone(), raw.clone()));
        }

        out
    }

    /// Expand one compound value into its canonical parts. Returns false
    /// when the parser produced nothing.
    fn expand_compound(
        &self,
        kind: CompoundKind,
        label: &str,
        raw: &str,
        specs: &mut Vec<ExtractedSpec>,
    ) -> bool {
        let confidence = 0.85;
        let push = |specs: &mut Vec<ExtractedSpec>, canonical: &str, value: SpecValue| {
            specs.push(
                ExtractedSpec::new(label, raw)
                    .canonical(canonical)
                    .with_value(value)
                    .with_confidence(confidence),
            );
        };

        match kind {
            CompoundKind::Door => {
                let door = parse_door_config(raw);
                if door.is_empty() {
                    return false;
                }
                if let Some(count) = door.door_count {
                    push(specs, "door_count", SpecValue::numeric(count as f64));
                }
                if let Some(door_type) = door.door_type {
                    push(specs, "door_type", SpecValue::Enum(door_type));
                }
                if let Some(hinge) = door.door_hinge {
                    push(specs, "door_hinge", SpecValue::Enum(hinge.as_str().to_string()));
                }
                if !door.door_features.is_empty() {
                    push(specs, "door_features", SpecValue::List(door.door_features));
                }
            }
            CompoundKind::Shelf => {
                let shelf = parse_shelf_config(raw);
                if shelf.is_empty() {
                    return false;
                }
                if let Some(count) = shelf.shelf_count {
                    push(specs, "shelf_count", SpecValue::numeric(count as f64));
                }
                if let Some(shelf_type) = shelf.shelf_type {
                    push(specs, "shelf_type", SpecValue::Enum(shelf_type.as_str().to_string()));
                }
                if let Some(increment) = shelf.shelf_adjustment_increment {
                    push(
                        specs,
                        "shelf_adjustment_increment",
                        SpecValue::numeric_with_unit(increment, "in"),
                    );
                }
            }
            CompoundKind::TempRange => {
                let (min, max) = parse_temp_range(raw);
                if min.is_none() && max.is_none() {
                    return false;
                }
                if let Some(min) = min {
                    push(specs, "temp_range_min_c", SpecValue::numeric_with_unit(min, "°C"));
                }
                if let Some(max) = max {
                    push(specs, "temp_range_max_c", SpecValue::numeric_with_unit(max, "°C"));
                }
            }
            CompoundKind::Electrical => {
                let e = parse_electrical(raw);
                if e.is_empty() {
                    return false;
                }
                if let Some(v) = e.voltage_v {
                    push(specs, "voltage_v", SpecValue::numeric_with_unit(v, "V"));
                }
                if let Some(v) = e.voltage_min {
                    push(specs, "voltage_min_v", SpecValue::numeric_with_unit(v, "V"));
                }
                if let Some(v) = e.voltage_max {
                    push(specs, "voltage_max_v", SpecValue::numeric_with_unit(v, "V"));
                }
                if let Some(v) = e.frequency_hz {
                    push(specs, "frequency_hz", SpecValue::numeric_with_unit(v, "Hz"));
                }
                if let Some(v) = e.amperage {
                    push(specs, "amperage", SpecValue::numeric_with_unit(v, "A"));
                }
                if let Some(hp) = e.horsepower {
                    push(specs, "horsepower", SpecValue::Text(hp));
                }
                if let Some(v) = e.phase {
                    push(specs, "phase", SpecValue::numeric(v as f64));
                }
                if let Some(plug) = e.plug_type {
                    push(specs, "plug_type", SpecValue::Text(plug));
                }
                if let Some(v) = e.breaker_amps {
                    push(specs, "breaker_amps", SpecValue::numeric_with_unit(v, "A"));
                }
            }
            CompoundKind::Refrigerant => {
                let Some(refrigerant) = parse_refrigerant(raw) else {
                    return false;
                };
                push(specs, "refrigerant", SpecValue::Enum(refrigerant));
            }
            CompoundKind::Certifications => {
                let certs = parse_certifications(raw);
                if certs.is_empty() {
                    return false;
                }
                push(specs, "certifications", SpecValue::List(certs));
            }
            CompoundKind::WarrantyGeneral | CompoundKind::WarrantyCompressor => {
                let warranty = parse_warranty(raw);
                let mut any = false;
                if let Some(years) = warranty.general {
                    push(
                        specs,
                        "warranty_general_years",
                        SpecValue::numeric_with_unit(years as f64, "years"),
                    );
                    any = true;
                }
                if let Some(years) = warranty.compressor {
                    push(
                        specs,
                        "warranty_compressor_years",
                        SpecValue::numeric_with_unit(years as f64, "years"),
                    );
                    any = true;
                }
                if !any {
                    return false;
                }
            }
        }
        true
    }

    /// Map a scalar label through the registry, coercing the raw text to
    /// the declared data type. Numeric entries that fail to parse keep
    /// the raw text flagged `parse_failed`.
    fn scalar_spec(&self, label: &str, raw: &str, canonical: &str) -> ExtractedSpec {
        let base = ExtractedSpec::new(label, raw).canonical(canonical).with_confidence(0.9);

        let Some(entry) = self.registry.lookup(canonical) else {
            return base.with_value(SpecValue::text(raw));
        };

        if entry.data_type == SpecDataType::Numeric {
            if let Some(m) = LEADING_NUMBER.find(raw) {
                if let Ok(value) = m.as_str().parse::<f64>() {
                    let value = self.registry.normalize_numeric(&entry, value, None);
                    let unit = if entry.unit.is_empty() {
                        None
                    } else {
                        Some(entry.unit.clone())
                    };
                    return base.with_value(SpecValue::Numeric { value, unit });
                }
            }
            return base.failed();
        }

        let coerced = self.registry.coerce(&entry, SpecValue::text(raw));
        base.with_value(coerced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldspec_catalog::memory::MemoryCatalogStore;
    use coldspec_catalog::seed;
    use coldspec_catalog::store::CatalogStore;

    async fn mapper() -> FieldMapper {
        let store: Arc<dyn CatalogStore> = Arc::new(MemoryCatalogStore::new(4));
        seed::seed_store(&store).await.unwrap();
        let registry = SpecRegistry::new(store);
        registry.refresh().await.unwrap();
        FieldMapper::new(Arc::new(registry))
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn value_of<'a>(mapped: &'a MappedFields, canonical: &str) -> Option<&'a SpecValue> {
        mapped
            .specs
            .iter()
            .find(|s| s.canonical_name.as_deref() == Some(canonical))
            .and_then(|s| s.value.as_ref())
    }

    #[tokio::test]
    async fn test_scalar_mapping_via_synonyms() {
        let mapper = mapper().await;
        let mapped = mapper.map_pairs(&pairs(&[
            ("Storage capacity (cu. ft)", "26"),
            ("Rated Amperage", "3"),
            ("Compressor", "Hermetic"),
        ]));

        assert_eq!(value_of(&mapped, "storage_capacity_cuft").unwrap().as_f64(), Some(26.0));
        assert_eq!(value_of(&mapped, "amperage").unwrap().as_f64(), Some(3.0));
        assert_eq!(
            value_of(&mapped, "compressor_type").unwrap().as_str(),
            Some("Hermetic")
        );
        assert!(mapped.unknown.is_empty());
    }

    #[tokio::test]
    async fn test_door_compound_expansion() {
        let mapper = mapper().await;
        let mapped = mapper.map_pairs(&pairs(&[(
            "Door",
            "One swing solid door, self-closing, right hinged",
        )]));

        assert_eq!(value_of(&mapped, "door_count").unwrap().as_f64(), Some(1.0));
        assert_eq!(value_of(&mapped, "door_type"), Some(&SpecValue::Enum("solid".into())));
        assert_eq!(value_of(&mapped, "door_hinge"), Some(&SpecValue::Enum("right".into())));
        assert_eq!(
            value_of(&mapped, "door_features"),
            Some(&SpecValue::List(vec!["self_closing".into()]))
        );
    }

    #[tokio::test]
    async fn test_temp_range_compound() {
        let mapper = mapper().await;
        let mapped = mapper.map_pairs(&pairs(&[("Adjustable Temperature Range", "1°C to 10°C")]));
        assert_eq!(value_of(&mapped, "temp_range_min_c").unwrap().as_f64(), Some(1.0));
        assert_eq!(value_of(&mapped, "temp_range_max_c").unwrap().as_f64(), Some(10.0));
    }

    #[tokio::test]
    async fn test_certifications_compound() {
        let mapper = mapper().await;
        let mapped = mapper.map_pairs(&pairs(&[(
            "Agency Listing and Certification",
            "ETL, C-ETL listed and certified to UL471 standard, Energy Star Certified",
        )]));
        assert_eq!(
            value_of(&mapped, "certifications"),
            Some(&SpecValue::List(vec![
                "ETL".into(),
                "C-ETL".into(),
                "UL471".into(),
                "Energy_Star".into()
            ]))
        );
    }

    #[tokio::test]
    async fn test_warranty_compound() {
        let mapper = mapper().await;
        let mapped = mapper.map_pairs(&pairs(&[
            ("General Warranty", "Two (2) year parts and labor"),
            ("Compressor Warranty", "Five (5) year compressor parts"),
        ]));
        assert_eq!(value_of(&mapped, "warranty_general_years").unwrap().as_f64(), Some(2.0));
        assert_eq!(
            value_of(&mapped, "warranty_compressor_years").unwrap().as_f64(),
            Some(5.0)
        );
    }

    #[tokio::test]
    async fn test_unknown_labels_surface_for_discovery() {
        let mapper = mapper().await;
        let mapped = mapper.map_pairs(&pairs(&[("Quantum Flux Rating", "7.5")]));
        assert!(mapped.specs.is_empty());
        assert_eq!(mapped.unknown.len(), 1);
        assert_eq!(mapped.unknown[0].0, "Quantum Flux Rating");
    }

    #[tokio::test]
    async fn test_unparseable_compound_falls_to_unknown() {
        let mapper = mapper().await;
        let mapped = mapper.map_pairs(&pairs(&[("Door", "n/a")]));
        assert!(mapped.specs.is_empty());
        assert_eq!(mapped.unknown.len(), 1);
    }

    #[tokio::test]
    async fn test_positional_labels_are_ignored() {
        let mapper = mapper().await;
        let mapped = mapper.map_pairs(&pairs(&[
            ("Exterior", "28 3/8    36 3/4    81 3/4"),
            ("Interior", "23 3/4    28    52 1/4"),
        ]));
        assert!(mapped.specs.is_empty());
        assert!(mapped.unknown.is_empty());
    }

    #[tokio::test]
    async fn test_numeric_entry_with_garbage_is_parse_failed() {
        let mapper = mapper().await;
        let mapped = mapper.map_pairs(&pairs(&[("Rated Amperage", "see manual")]));
        let spec = &mapped.specs[0];
        assert!(spec.parse_failed);
        assert_eq!(spec.value, Some(SpecValue::Text("see manual".into())));
    }
}
