//! Product records and their taxonomy (brands, families, relationships).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ControllerTier, ProductId, ProductStatus, RelationKind, SpecValue, SuperCategory};

/// A curated brand. The `code` is the stable key used in documents,
/// model patterns, and queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub parent_org: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Brand {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            parent_org: None,
            is_active: true,
        }
    }
}

/// A curated product family (e.g. `premier_lab_ref`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub code: String,
    pub name: String,
    pub super_category: SuperCategory,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Family {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        super_category: SuperCategory,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            super_category,
            description: None,
            is_active: true,
        }
    }
}

fn default_active() -> bool {
    true
}

/// Names of the denormalized fixed columns on [`Product`]. Every fixed
/// column is a projection of the same canonical spec; `Product::spec_value`
/// and `Product::set_spec_value` keep the two views consistent.
pub const FIXED_COLUMNS: &[&str] = &[
    "storage_capacity_cuft",
    "temp_range_min_c",
    "temp_range_max_c",
    "door_count",
    "door_type",
    "shelf_count",
    "refrigerant",
    "voltage_v",
    "amperage",
    "product_weight_lbs",
    "ext_width_in",
    "ext_depth_in",
    "ext_height_in",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub model_number: String,
    pub brand_code: String,
    pub family_code: String,
    #[serde(default)]
    pub product_line: Option<String>,
    #[serde(default)]
    pub controller_tier: Option<ControllerTier>,
    pub status: ProductStatus,

    // Universal specs, denormalized for fast filtering.
    #[serde(default)]
    pub storage_capacity_cuft: Option<f64>,
    #[serde(default)]
    pub temp_range_min_c: Option<f64>,
    #[serde(default)]
    pub temp_range_max_c: Option<f64>,
    #[serde(default)]
    pub door_count: Option<u32>,
    #[serde(default)]
    pub door_type: Option<String>,
    #[serde(default)]
    pub shelf_count: Option<u32>,
    #[serde(default)]
    pub refrigerant: Option<String>,
    #[serde(default)]
    pub voltage_v: Option<f64>,
    #[serde(default)]
    pub amperage: Option<f64>,
    #[serde(default)]
    pub product_weight_lbs: Option<f64>,
    #[serde(default)]
    pub ext_width_in: Option<f64>,
    #[serde(default)]
    pub ext_depth_in: Option<f64>,
    #[serde(default)]
    pub ext_height_in: Option<f64>,

    /// Dynamic specs keyed by canonical name.
    #[serde(default)]
    pub specs: BTreeMap<String, SpecValue>,
    /// De-duplicated, sorted certification codes.
    #[serde(default)]
    pub certifications: Vec<String>,

    #[serde(default)]
    pub effective_from: Option<NaiveDate>,
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
    /// Monotonically increasing per model number; each increment snapshots
    /// the prior record.
    pub version: u32,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        model_number: impl Into<String>,
        brand_code: impl Into<String>,
        family_code: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ProductId::new(),
            model_number: model_number.into(),
            brand_code: brand_code.into(),
            family_code: family_code.into(),
            product_line: None,
            controller_tier: None,
            status: ProductStatus::Active,
            storage_capacity_cuft: None,
            temp_range_min_c: None,
            temp_range_max_c: None,
            door_count: None,
            door_type: None,
            shelf_count: None,
            refrigerant: None,
            voltage_v: None,
            amperage: None,
            product_weight_lbs: None,
            ext_width_in: None,
            ext_depth_in: None,
            ext_height_in: None,
            specs: BTreeMap::new(),
            certifications: Vec::new(),
            effective_from: None,
            effective_to: None,
            version: 1,
            revision: None,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Read a spec value, consulting the fixed columns first and the
    /// dynamic map second.
    pub fn spec_value(&self, canonical_name: &str) -> Option<SpecValue> {
        let fixed = match canonical_name {
            "storage_capacity_cuft" => self.storage_capacity_cuft.map(SpecValue::numeric),
            "temp_range_min_c" => self.temp_range_min_c.map(SpecValue::numeric),
            "temp_range_max_c" => self.temp_range_max_c.map(SpecValue::numeric),
            "door_count" => self.door_count.map(|n| SpecValue::numeric(n as f64)),
            "door_type" => self.door_type.clone().map(SpecValue::Enum),
            "shelf_count" => self.shelf_count.map(|n| SpecValue::numeric(n as f64)),
            "refrigerant" => self.refrigerant.clone().map(SpecValue::Enum),
            "voltage_v" => self.voltage_v.map(SpecValue::numeric),
            "amperage" => self.amperage.map(SpecValue::numeric),
            "product_weight_lbs" => self.product_weight_lbs.map(SpecValue::numeric),
            "ext_width_in" => self.ext_width_in.map(SpecValue::numeric),
            "ext_depth_in" => self.ext_depth_in.map(SpecValue::numeric),
            "ext_height_in" => self.ext_height_in.map(SpecValue::numeric),
            "certifications" => {
                if self.certifications.is_empty() {
                    None
                } else {
                    Some(SpecValue::List(self.certifications.clone()))
                }
            }
            _ => None,
        };
        fixed.or_else(|| self.specs.get(canonical_name).cloned())
    }

    /// Write a spec value, projecting into the matching fixed column when
    /// one exists and into the dynamic map otherwise.
    pub fn set_spec_value(&mut self, canonical_name: &str, value: SpecValue) {
        match canonical_name {
            "storage_capacity_cuft" => self.storage_capacity_cuft = value.as_f64(),
            "temp_range_min_c" => self.temp_range_min_c = value.as_f64(),
            "temp_range_max_c" => self.temp_range_max_c = value.as_f64(),
            "door_count" => self.door_count = value.as_f64().map(|v| v.round() as u32),
            "door_type" => self.door_type = value.as_str().map(str::to_string),
            "shelf_count" => self.shelf_count = value.as_f64().map(|v| v.round() as u32),
            "refrigerant" => self.refrigerant = value.as_str().map(str::to_string),
            "voltage_v" => self.voltage_v = value.as_f64(),
            "amperage" => self.amperage = value.as_f64(),
            "product_weight_lbs" => self.product_weight_lbs = value.as_f64(),
            "ext_width_in" => self.ext_width_in = value.as_f64(),
            "ext_depth_in" => self.ext_depth_in = value.as_f64(),
            "ext_height_in" => self.ext_height_in = value.as_f64(),
            "certifications" => {
                if let SpecValue::List(items) = value {
                    self.merge_certifications(items);
                    return;
                }
                self.specs.insert(canonical_name.to_string(), value);
            }
            _ => {
                self.specs.insert(canonical_name.to_string(), value);
            }
        }
        self.updated_at = Utc::now();
    }

    /// Certifications accumulate as a sorted set union.
    pub fn merge_certifications<I>(&mut self, incoming: I) -> bool
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.certifications.len();
        for cert in incoming {
            if !self.certifications.contains(&cert) {
                self.certifications.push(cert);
            }
        }
        self.certifications.sort();
        let changed = self.certifications.len() != before;
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }

    pub fn has_certification(&self, cert: &str) -> bool {
        let needle = normalize_cert(cert);
        self.certifications.iter().any(|c| normalize_cert(c) == needle)
    }
}

fn normalize_cert(cert: &str) -> String {
    cert.trim()
        .to_ascii_uppercase()
        .replace([' ', '-', '/'], "_")
}

/// Immutable pre-image of a product, written whenever the record mutates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub version: u32,
    pub record: Product,
    pub change_summary: String,
    pub changed_by: String,
    pub created_at: DateTime<Utc>,
}

impl ProductSnapshot {
    pub fn of(product: &Product, change_summary: impl Into<String>, changed_by: impl Into<String>) -> Self {
        Self {
            product_id: product.id,
            version: product.version,
            record: product.clone(),
            change_summary: change_summary.into(),
            changed_by: changed_by.into(),
            created_at: Utc::now(),
        }
    }
}

/// Directed relationship edge between two products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRelationship {
    pub source: ProductId,
    pub target: ProductId,
    pub kind: RelationKind,
    pub confidence: f64,
    #[serde(default)]
    pub auto_detected: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ProductRelationship {
    pub fn new(source: ProductId, target: ProductId, kind: RelationKind) -> Self {
        Self {
            source,
            target,
            kind,
            confidence: 1.0,
            auto_detected: false,
            notes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_column_projection() {
        let mut p = Product::new("ABT-HC-26S", "ABS", "premier_lab_ref");
        p.set_spec_value("storage_capacity_cuft", SpecValue::numeric(26.0));
        p.set_spec_value("door_type", SpecValue::Enum("solid".into()));

        assert_eq!(p.storage_capacity_cuft, Some(26.0));
        assert_eq!(p.door_type.as_deref(), Some("solid"));
        assert_eq!(p.spec_value("storage_capacity_cuft"), Some(SpecValue::numeric(26.0)));
        // Fixed columns are projections, not duplicate map entries.
        assert!(!p.specs.contains_key("storage_capacity_cuft"));
    }

    #[test]
    fn test_dynamic_spec_round_trip() {
        let mut p = Product::new("ABT-HC-26S", "ABS", "premier_lab_ref");
        p.set_spec_value("uniformity_c", SpecValue::numeric(1.4));
        assert_eq!(p.spec_value("uniformity_c"), Some(SpecValue::numeric(1.4)));
        assert_eq!(p.spec_value("stability_c"), None);
    }

    #[test]
    fn test_certification_union() {
        let mut p = Product::new("ABT-HC-26S", "ABS", "premier_lab_ref");
        assert!(p.merge_certifications(vec!["ETL".into(), "UL471".into()]));
        assert!(!p.merge_certifications(vec!["ETL".into()]));
        assert!(p.merge_certifications(vec!["Energy_Star".into()]));
        assert_eq!(p.certifications, vec!["ETL", "Energy_Star", "UL471"]);
    }

    #[test]
    fn test_certification_lookup_is_normalized() {
        let mut p = Product::new("PH-ABT-NSF-UCFS-0504", "ABS", "pharmacy_nsf_ref");
        p.merge_certifications(vec!["NSF_ANSI_456".into()]);
        assert!(p.has_certification("NSF/ANSI 456"));
        assert!(p.has_certification("nsf_ansi_456"));
        assert!(!p.has_certification("AABB"));
    }

    #[test]
    fn test_snapshot_preserves_pre_image() {
        let mut p = Product::new("ABT-HC-26S", "ABS", "premier_lab_ref");
        p.set_spec_value("storage_capacity_cuft", SpecValue::numeric(26.0));
        let snap = ProductSnapshot::of(&p, "initial", "system");

        p.set_spec_value("storage_capacity_cuft", SpecValue::numeric(25.8));
        p.version += 1;

        assert_eq!(snap.version, 1);
        assert_eq!(snap.record.storage_capacity_cuft, Some(26.0));
        assert_eq!(p.storage_capacity_cuft, Some(25.8));
    }

    #[test]
    fn test_snapshot_serde_round_trip() {
        let mut p = Product::new("ABT-HC-26S", "ABS", "premier_lab_ref");
        p.set_spec_value("uniformity_c", SpecValue::numeric(1.4));
        p.merge_certifications(vec!["ETL".into()]);
        let snap = ProductSnapshot::of(&p, "initial", "system");

        let json = serde_json::to_string(&snap).unwrap();
        let back: ProductSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
