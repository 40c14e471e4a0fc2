//! Curated reference data: brands, families, the canonical spec registry,
//! and per-family equivalence rules.
//!
//! Loaded into the store at startup and by tests. The synonym sets mirror
//! the field labels observed across the product literature corpus.

use std::sync::Arc;

use coldspec_core::{
    Brand, EquivalenceRule, Family, SpecDataType, SpecRegistryEntry, SuperCategory,
    UnitConversion, UnitSystem,
};

use crate::store::CatalogStore;
use crate::Result;

pub fn brands() -> Vec<Brand> {
    vec![
        Brand::new("ABS", "American BioTech Supply"),
        Brand::new("LABRepCo", "LABRepCo"),
        Brand::new("Corepoint", "Corepoint Scientific"),
        Brand::new("Celsius", "Celsius Scientific"),
        Brand::new("CBS", "Custom BioGenic Systems"),
    ]
}

pub fn families() -> Vec<Family> {
    vec![
        Family::new("premier_lab_ref", "Premier Laboratory Refrigerator", SuperCategory::Refrigerator),
        Family::new("standard_lab_ref", "Standard Laboratory Refrigerator", SuperCategory::Refrigerator),
        Family::new("chromatography_ref", "Chromatography Refrigerator", SuperCategory::Refrigerator),
        Family::new("pharmacy_vaccine_ref", "Pharmacy Vaccine Refrigerator", SuperCategory::Refrigerator),
        Family::new("pharmacy_nsf_ref", "Pharmacy NSF Refrigerator", SuperCategory::Refrigerator),
        Family::new("blood_bank_ref", "Blood Bank Refrigerator", SuperCategory::Refrigerator),
        Family::new("flammable_storage_ref", "Flammable Storage Refrigerator", SuperCategory::Refrigerator),
        Family::new("manual_defrost_freezer", "Manual Defrost Freezer", SuperCategory::Freezer),
        Family::new("auto_defrost_freezer", "Auto Defrost Freezer", SuperCategory::Freezer),
        Family::new("precision_freezer", "Precision Freezer", SuperCategory::Freezer),
        Family::new("plasma_freezer", "Plasma Freezer", SuperCategory::Freezer),
        Family::new("cryo_dewar", "Cryogenic Dewar", SuperCategory::Cryogenic),
    ]
}

pub fn registry_entries() -> Vec<SpecRegistryEntry> {
    use SpecDataType::*;

    let numeric = |name: &str, unit: &str, system: UnitSystem| {
        SpecRegistryEntry::new(name, Numeric).with_unit(unit, system)
    };

    vec![
        numeric("storage_capacity_cuft", "cu.ft.", UnitSystem::Imperial)
            .with_synonyms([
                "storage capacity (cu. ft)",
                "storage capacity (cu. ft.)",
                "storage capacity",
                "cu. ft",
                "capacity",
                "volume",
                "cubic feet",
                "storage space",
            ])
            .with_conversion("liters", UnitConversion::Factor(0.0353147)),
        numeric("temp_range_min_c", "°C", UnitSystem::Metric)
            .with_synonyms(["minimum temperature", "min temp", "lowest temp", "coldest"])
            .with_conversion("°F", UnitConversion::Named("convert_f_to_c".into()))
            .critical(),
        numeric("temp_range_max_c", "°C", UnitSystem::Metric)
            .with_synonyms(["maximum temperature", "max temp", "highest temp", "warmest"])
            .with_conversion("°F", UnitConversion::Named("convert_f_to_c".into()))
            .critical(),
        numeric("voltage_v", "V", UnitSystem::Imperial)
            .with_synonyms(["voltage", "volts", "rated voltage"])
            .critical(),
        numeric("amperage", "A", UnitSystem::Imperial)
            .with_synonyms(["rated amperage", "amps", "current draw"])
            .critical(),
        SpecRegistryEntry::new("certifications", List)
            .with_synonyms([
                "agency listing and certification",
                "agency listing",
                "certification",
                "certified",
                "listed",
            ])
            .critical(),
        SpecRegistryEntry::new("refrigerant", Enum)
            .with_synonyms(["refrigerant type", "natural refrigerant", "gas type"])
            .critical(),
        numeric("voltage_min_v", "V", UnitSystem::Imperial),
        numeric("voltage_max_v", "V", UnitSystem::Imperial),
        numeric("frequency_hz", "Hz", UnitSystem::Imperial).with_synonyms(["frequency"]),
        SpecRegistryEntry::new("horsepower", Text).with_synonyms(["h.p.", "hp", "compressor hp"]),
        numeric("door_count", "", UnitSystem::None).with_synonyms(["number of doors"]),
        SpecRegistryEntry::new("door_type", Enum).with_synonyms(["door style"]),
        SpecRegistryEntry::new("door_hinge", Enum).with_synonyms(["hinge", "hinge side"]),
        SpecRegistryEntry::new("door_features", List),
        numeric("shelf_count", "", UnitSystem::None).with_synonyms(["number of shelves", "total shelves"]),
        SpecRegistryEntry::new("shelf_type", Enum),
        numeric("shelf_adjustment_increment", "in", UnitSystem::Imperial)
            .with_synonyms(["shelf increment"]),
        SpecRegistryEntry::new("defrost_type", Enum).with_synonyms(["defrost"]),
        SpecRegistryEntry::new("compressor_type", Text).with_synonyms(["compressor"]),
        SpecRegistryEntry::new("condenser_type", Text).with_synonyms(["condenser"]),
        SpecRegistryEntry::new("evaporator_type", Text).with_synonyms(["evaporator"]),
        SpecRegistryEntry::new("controller_type", Text).with_synonyms(["controller technology", "controller"]),
        SpecRegistryEntry::new("display_type", Text).with_synonyms(["display technology", "display"]),
        SpecRegistryEntry::new("digital_comm", Text)
            .with_synonyms(["digital communication", "data communication"]),
        SpecRegistryEntry::new("data_transfer", Text),
        SpecRegistryEntry::new("interior_lighting", Text),
        SpecRegistryEntry::new("mounting_type", Text).with_synonyms(["mounting", "mounting and installation"]),
        SpecRegistryEntry::new("insulation_type", Text).with_synonyms(["insulation"]),
        SpecRegistryEntry::new("exterior_material", Text).with_synonyms(["exterior materials"]),
        SpecRegistryEntry::new("access_control", Text),
        SpecRegistryEntry::new("battery_backup", Boolean),
        SpecRegistryEntry::new("chart_recorder", Text),
        SpecRegistryEntry::new("plug_type", Text).with_synonyms(["power plug/power cord", "nema plug"]),
        numeric("breaker_amps", "A", UnitSystem::Imperial).with_synonyms(["breaker"]),
        numeric("phase", "", UnitSystem::None),
        numeric("product_weight_lbs", "lbs", UnitSystem::Imperial)
            .with_synonyms(["product weight (lbs)", "product weight", "weight empty"])
            .with_conversion("kg", UnitConversion::Factor(2.20462)),
        numeric("shipping_weight_lbs", "lbs", UnitSystem::Imperial)
            .with_synonyms(["shipping weight (lbs)", "shipping weight"])
            .with_conversion("kg", UnitConversion::Factor(2.20462)),
        numeric("ext_width_in", "in", UnitSystem::Imperial)
            .with_synonyms(["exterior width", "width"])
            .with_conversion("cm", UnitConversion::Factor(0.393701)),
        numeric("ext_depth_in", "in", UnitSystem::Imperial)
            .with_synonyms(["exterior depth", "depth"])
            .with_conversion("cm", UnitConversion::Factor(0.393701)),
        numeric("ext_height_in", "in", UnitSystem::Imperial)
            .with_synonyms(["exterior height", "height"])
            .with_conversion("cm", UnitConversion::Factor(0.393701)),
        numeric("int_width_in", "in", UnitSystem::Imperial).with_synonyms(["interior width"]),
        numeric("int_depth_in", "in", UnitSystem::Imperial).with_synonyms(["interior depth"]),
        numeric("int_height_in", "in", UnitSystem::Imperial).with_synonyms(["interior height"]),
        numeric("door_swing_in", "in", UnitSystem::Imperial).with_synonyms(["door swing"]),
        numeric("total_open_depth_in", "in", UnitSystem::Imperial).with_synonyms(["total open depth"]),
        numeric("uniformity_c", "±°C", UnitSystem::Metric)
            .with_synonyms(["uniformity (cabinet air)", "uniformity", "temperature uniformity"]),
        numeric("stability_c", "±°C", UnitSystem::Metric)
            .with_synonyms(["stability (cabinet air)", "stability", "temperature stability"]),
        numeric("max_temp_variation_c", "°C", UnitSystem::Metric)
            .with_synonyms(["maximum temperature variation"]),
        numeric("energy_kwh_day", "kWh/day", UnitSystem::Metric)
            .with_synonyms(["energy consumption (kwh/day)", "energy consumption", "power consumption"]),
        numeric("heat_rejection_btu_hr", "BTU/hr", UnitSystem::Imperial)
            .with_synonyms(["average heat rejection (btu/hr)", "heat rejection"]),
        numeric("noise_dba", "dBA", UnitSystem::None)
            .with_synonyms(["noise pressure level (dba)", "noise level", "noise"]),
        numeric("pulldown_time_min", "min", UnitSystem::None)
            .with_synonyms(["pull down time to nominal operating temp", "pulldown time"]),
        numeric("warranty_general_years", "years", UnitSystem::None)
            .with_synonyms(["general warranty"]),
        numeric("warranty_compressor_years", "years", UnitSystem::None)
            .with_synonyms(["compressor warranty", "compressor parts warranty"]),
        numeric("vacuum_warranty_years", "years", UnitSystem::None)
            .with_family_scope(["cryo_dewar"]),
        numeric("ln2_capacity_liters", "liters", UnitSystem::Metric)
            .with_synonyms(["liquid nitrogen capacity", "liter capacity"])
            .with_family_scope(["cryo_dewar"]),
        numeric("static_holding_time_days", "days", UnitSystem::None)
            .with_synonyms(["static holding time"])
            .with_family_scope(["cryo_dewar"]),
        numeric("vial_capacity_2ml", "", UnitSystem::None)
            .with_synonyms(["vial capacity", "2ml vial capacity"])
            .with_family_scope(["cryo_dewar"]),
        numeric("evaporation_rate_l_day", "L/day", UnitSystem::Metric)
            .with_synonyms(["static evaporation rate"])
            .with_family_scope(["cryo_dewar"]),
        SpecRegistryEntry::new("alarms", Text).with_synonyms(["alarm management"]),
        SpecRegistryEntry::new("probe_access", Text).with_synonyms(["external probe access"]),
        SpecRegistryEntry::new("airflow_type", Text).with_synonyms(["airflow management", "airflow"]),
    ]
}

pub fn equivalence_rules() -> Vec<EquivalenceRule> {
    families()
        .into_iter()
        .map(|family| {
            let mut rule = EquivalenceRule::new(family.code.clone());
            if family.super_category == SuperCategory::Cryogenic {
                rule.required_match = vec![];
                rule.tolerance_map = [
                    ("ln2_capacity_liters".to_string(), 0.15),
                    ("static_holding_time_days".to_string(), 0.20),
                ]
                .into();
                rule.priority_specs = vec![
                    "static_holding_time_days".to_string(),
                    "ln2_capacity_liters".to_string(),
                ];
            }
            rule
        })
        .collect()
}

/// Write all curated reference data into a store.
pub async fn seed_store(store: &Arc<dyn CatalogStore>) -> Result<()> {
    for brand in brands() {
        store.upsert_brand(brand).await?;
    }
    for family in families() {
        store.upsert_family(family).await?;
    }
    for entry in registry_entries() {
        store.upsert_registry_entry(entry).await?;
    }
    for rule in equivalence_rules() {
        store.upsert_equivalence_rule(rule).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCatalogStore;
    use crate::registry::SpecRegistry;

    #[test]
    fn test_registry_has_no_duplicate_names() {
        let entries = registry_entries();
        let mut names: Vec<&str> = entries.iter().map(|e| e.canonical_name.as_str()).collect();
        names.sort();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }

    #[test]
    fn test_critical_specs_flagged() {
        let entries = registry_entries();
        for name in [
            "temp_range_min_c",
            "temp_range_max_c",
            "voltage_v",
            "certifications",
            "refrigerant",
        ] {
            let entry = entries.iter().find(|e| e.canonical_name == name).unwrap();
            assert!(entry.is_critical, "{name} should be critical");
        }
        // A capacity disagreement reads as a data-entry drift, not a
        // safety issue; it stays at medium severity.
        let capacity = entries
            .iter()
            .find(|e| e.canonical_name == "storage_capacity_cuft")
            .unwrap();
        assert!(!capacity.is_critical);
    }

    #[tokio::test]
    async fn test_seeded_registry_resolves_document_labels() {
        let store: Arc<dyn CatalogStore> = Arc::new(MemoryCatalogStore::new(4));
        seed_store(&store).await.unwrap();

        let registry = SpecRegistry::new(store);
        registry.refresh().await.unwrap();

        assert_eq!(
            registry.resolve("Storage capacity (cu. ft)").as_deref(),
            Some("storage_capacity_cuft")
        );
        assert_eq!(registry.resolve("Rated Amperage").as_deref(), Some("amperage"));
        assert_eq!(
            registry.resolve("Uniformity¹ (Cabinet Air)").as_deref(),
            Some("uniformity_c")
        );
        assert_eq!(
            registry.resolve("Agency Listing and Certification").as_deref(),
            Some("certifications")
        );
    }

    #[test]
    fn test_every_family_has_an_equivalence_rule() {
        let rules = equivalence_rules();
        for family in families() {
            assert!(
                rules.iter().any(|r| r.family_code == family.code),
                "missing rule for {}",
                family.code
            );
        }
    }
}
