//! Use-case profiles: named scoring templates for the recommendation
//! engine, plus free-text resolution over profile keywords.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-spec scoring band. The feature scores 1.0 inside `[low, high]`
/// and decays linearly to 0.0 at one band-width beyond either edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpecBand {
    pub weight: f64,
    pub low: f64,
    pub high: f64,
    /// Missing values on a required spec score 0.0 instead of being
    /// skipped.
    pub required: bool,
}

impl SpecBand {
    pub fn new(weight: f64, low: f64, high: f64) -> Self {
        Self {
            weight,
            low,
            high,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UseCaseProfile {
    pub key: String,
    pub name: String,
    pub description: String,
    /// Allowed family codes; empty means any.
    pub families: Vec<String>,
    pub required_certifications: Vec<String>,
    /// Hard constraint: the product's temperature range must cover this
    /// span.
    pub temp_must_cover: Option<(f64, f64)>,
    /// Hard constraint used by installation-limited profiles.
    pub max_height_in: Option<f64>,
    /// Per-spec weights and target bands.
    pub bands: BTreeMap<String, SpecBand>,
    /// Free-text keywords that resolve to this profile.
    pub keywords: Vec<String>,
}

impl UseCaseProfile {
    fn new(key: &str, name: &str, description: &str) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            families: Vec::new(),
            required_certifications: Vec::new(),
            temp_must_cover: None,
            max_height_in: None,
            bands: BTreeMap::new(),
            keywords: Vec::new(),
        }
    }

    fn families(mut self, families: &[&str]) -> Self {
        self.families = families.iter().map(|f| f.to_string()).collect();
        self
    }

    fn certs(mut self, certs: &[&str]) -> Self {
        self.required_certifications = certs.iter().map(|c| c.to_string()).collect();
        self
    }

    fn temp_cover(mut self, low: f64, high: f64) -> Self {
        self.temp_must_cover = Some((low, high));
        self
    }

    fn band(mut self, spec: &str, band: SpecBand) -> Self {
        self.bands.insert(spec.to_string(), band);
        self
    }

    fn keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }
}

/// The curated profile catalog.
pub fn use_case_profiles() -> Vec<UseCaseProfile> {
    vec![
        UseCaseProfile::new(
            "vaccine_storage",
            "Vaccine Storage",
            "CDC-compliant vaccine storage per VFC program requirements",
        )
        .families(&["pharmacy_vaccine_ref", "pharmacy_nsf_ref"])
        .certs(&["NSF_ANSI_456"])
        .temp_cover(2.0, 8.0)
        .band("uniformity_c", SpecBand::new(0.25, 0.0, 1.5).required())
        .band("stability_c", SpecBand::new(0.20, 0.0, 1.5))
        .band("noise_dba", SpecBand::new(0.10, 0.0, 45.0))
        .band("energy_kwh_day", SpecBand::new(0.15, 0.0, 1.5))
        .keywords(&["vaccine", "vfc", "cdc", "immunization"]),
        UseCaseProfile::new(
            "pharmacy_general",
            "General Pharmacy Storage",
            "Medication storage for retail and hospital pharmacy",
        )
        .families(&["pharmacy_vaccine_ref", "pharmacy_nsf_ref", "premier_lab_ref"])
        .temp_cover(2.0, 8.0)
        .band("storage_capacity_cuft", SpecBand::new(0.20, 5.0, 30.0))
        .band("uniformity_c", SpecBand::new(0.20, 0.0, 2.0))
        .band("noise_dba", SpecBand::new(0.15, 0.0, 45.0))
        .band("energy_kwh_day", SpecBand::new(0.15, 0.0, 2.0))
        .keywords(&["pharmacy", "medication", "drug storage"]),
        UseCaseProfile::new(
            "laboratory_general",
            "General Laboratory Storage",
            "Reagent, sample, and media storage for research labs",
        )
        .families(&["premier_lab_ref", "standard_lab_ref", "chromatography_ref"])
        .band("storage_capacity_cuft", SpecBand::new(0.25, 10.0, 50.0))
        .band("uniformity_c", SpecBand::new(0.20, 0.0, 2.0))
        .band("energy_kwh_day", SpecBand::new(0.15, 0.0, 2.0))
        .band("shelf_count", SpecBand::new(0.10, 3.0, 10.0))
        .keywords(&["lab", "laboratory", "reagent", "sample", "research"]),
        UseCaseProfile::new(
            "chromatography",
            "Chromatography Column Storage",
            "HPLC and FPLC column storage needing stable, uniform temperatures",
        )
        .families(&["chromatography_ref"])
        .band("uniformity_c", SpecBand::new(0.30, 0.0, 1.0).required())
        .band("stability_c", SpecBand::new(0.30, 0.0, 1.0))
        .band("storage_capacity_cuft", SpecBand::new(0.15, 10.0, 50.0))
        .keywords(&["chromatography", "hplc", "fplc", "column storage"]),
        UseCaseProfile::new(
            "blood_bank",
            "Blood Bank Storage",
            "FDA and AABB compliant blood product storage at 1-6\u{b0}C",
        )
        .families(&["blood_bank_ref"])
        .certs(&["FDA", "AABB"])
        .temp_cover(1.0, 6.0)
        .band("uniformity_c", SpecBand::new(0.30, 0.0, 1.0).required())
        .band("stability_c", SpecBand::new(0.25, 0.0, 1.0))
        .band("storage_capacity_cuft", SpecBand::new(0.15, 10.0, 60.0))
        .keywords(&["blood bank", "blood product", "transfusion"]),
        UseCaseProfile::new(
            "flammable_storage",
            "Flammable Material Storage",
            "Flammable solvent and reagent storage per NFPA 30/45",
        )
        .families(&["flammable_storage_ref"])
        .certs(&["NFPA_45"])
        .band("storage_capacity_cuft", SpecBand::new(0.30, 5.0, 50.0))
        .band("energy_kwh_day", SpecBand::new(0.15, 0.0, 2.5))
        .keywords(&["flammable", "solvent", "nfpa"]),
        UseCaseProfile::new(
            "sample_freezing",
            "Laboratory Sample Freezing",
            "General lab freezer for samples, enzymes, and reagents",
        )
        .families(&[
            "manual_defrost_freezer",
            "auto_defrost_freezer",
            "precision_freezer",
        ])
        .band("storage_capacity_cuft", SpecBand::new(0.25, 5.0, 30.0))
        .band("temp_range_min_c", SpecBand::new(0.25, -40.0, -15.0))
        .band("energy_kwh_day", SpecBand::new(0.15, 0.0, 3.0))
        .band("uniformity_c", SpecBand::new(0.15, 0.0, 3.0))
        .keywords(&["freezer", "freeze", "frozen", "enzyme"]),
        UseCaseProfile::new(
            "plasma_storage",
            "Plasma Freezing & Storage",
            "Plasma storage at -30\u{b0}C or below per FDA and AABB",
        )
        .families(&["plasma_freezer", "precision_freezer"])
        .certs(&["FDA"])
        .band("temp_range_min_c", SpecBand::new(0.30, -45.0, -30.0).required())
        .band("uniformity_c", SpecBand::new(0.25, 0.0, 1.5))
        .band("storage_capacity_cuft", SpecBand::new(0.15, 5.0, 30.0))
        .keywords(&["plasma"]),
        UseCaseProfile::new(
            "undercounter",
            "Undercounter Installation",
            "Compact units for built-in or under-bench installation",
        )
        .families(&["pharmacy_nsf_ref", "pharmacy_vaccine_ref", "premier_lab_ref"])
        .band("storage_capacity_cuft", SpecBand::new(0.25, 3.0, 7.0))
        .band("noise_dba", SpecBand::new(0.25, 0.0, 42.0))
        .band("energy_kwh_day", SpecBand::new(0.15, 0.0, 1.0))
        .keywords(&["undercounter", "under counter", "built-in", "compact"]),
        UseCaseProfile::new(
            "cryogenic_storage",
            "Cryogenic / LN2 Storage",
            "Long-term storage in liquid nitrogen dewars",
        )
        .families(&["cryo_dewar"])
        .band("ln2_capacity_liters", SpecBand::new(0.30, 10.0, 100.0))
        .band("static_holding_time_days", SpecBand::new(0.35, 60.0, 400.0))
        .band("vial_capacity_2ml", SpecBand::new(0.20, 100.0, 10_000.0))
        .keywords(&["cryogenic", "liquid nitrogen", "ln2", "dewar", "vapor shipper"]),
        UseCaseProfile::new(
            "energy_efficient",
            "Energy Efficient",
            "Prioritize low energy consumption and Energy Star certification",
        )
        .certs(&["Energy_Star"])
        .band("energy_kwh_day", SpecBand::new(0.45, 0.0, 1.0).required())
        .band("noise_dba", SpecBand::new(0.20, 0.0, 42.0))
        .keywords(&["energy", "energy star", "green", "efficient"]),
    ]
}

impl UseCaseProfile {
    /// The undercounter profile carries an implicit height limit.
    pub fn effective_max_height(&self) -> Option<f64> {
        if self.max_height_in.is_some() {
            return self.max_height_in;
        }
        if self.key == "undercounter" {
            return Some(36.0);
        }
        None
    }
}

/// Resolve a free-text use-case description to a profile by keyword
/// scoring; the profile with the most keyword hits wins.
pub fn resolve_use_case(text: &str) -> Option<UseCaseProfile> {
    let lowered = text.to_lowercase();
    let mut best: Option<(usize, UseCaseProfile)> = None;
    for profile in use_case_profiles() {
        let hits = profile
            .keywords
            .iter()
            .filter(|keyword| lowered.contains(keyword.as_str()))
            .count();
        if hits == 0 {
            continue;
        }
        match &best {
            Some((best_hits, _)) if *best_hits >= hits => {}
            _ => best = Some((hits, profile)),
        }
    }
    best.map(|(_, profile)| profile)
}

/// Look up a profile by its key.
pub fn profile_by_key(key: &str) -> Option<UseCaseProfile> {
    use_case_profiles().into_iter().find(|p| p.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_keys_unique() {
        let profiles = use_case_profiles();
        let mut keys: Vec<&str> = profiles.iter().map(|p| p.key.as_str()).collect();
        let before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(before, keys.len());
    }

    #[test]
    fn test_vaccine_profile_shape() {
        let profile = profile_by_key("vaccine_storage").unwrap();
        assert_eq!(profile.required_certifications, vec!["NSF_ANSI_456"]);
        assert_eq!(profile.temp_must_cover, Some((2.0, 8.0)));
        let uniformity = profile.bands.get("uniformity_c").unwrap();
        assert_eq!(uniformity.weight, 0.25);
        assert_eq!((uniformity.low, uniformity.high), (0.0, 1.5));
        assert!(uniformity.required);
    }

    #[test]
    fn test_free_text_resolution() {
        assert_eq!(
            resolve_use_case("I need CDC compliant vaccine storage").unwrap().key,
            "vaccine_storage"
        );
        assert_eq!(
            resolve_use_case("storage for HPLC columns").unwrap().key,
            "chromatography"
        );
        assert_eq!(
            resolve_use_case("a dewar for liquid nitrogen").unwrap().key,
            "cryogenic_storage"
        );
        assert!(resolve_use_case("something entirely unrelated").is_none());
    }

    #[test]
    fn test_undercounter_height_limit() {
        let profile = profile_by_key("undercounter").unwrap();
        assert_eq!(profile.effective_max_height(), Some(36.0));
        let lab = profile_by_key("laboratory_general").unwrap();
        assert_eq!(lab.effective_max_height(), None);
    }
}
