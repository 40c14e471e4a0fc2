use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Newtype wrappers for type safety

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

id_type!(
    /// Identifier for a catalog product.
    ProductId
);
id_type!(
    /// Identifier for an ingested document.
    DocumentId
);
id_type!(
    /// Identifier for a retrieval chunk.
    ChunkId
);
id_type!(
    /// Identifier for a spec conflict row.
    ConflictId
);
id_type!(
    /// Identifier for an ingestion job.
    JobId
);

// Product lifecycle

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Draft,
    PendingReview,
    Active,
    Discontinued,
    Deprecated,
}

impl ProductStatus {
    /// Discontinued and deprecated products are excluded from
    /// recommendation candidate pools by default.
    pub fn is_sellable(&self) -> bool {
        matches!(self, ProductStatus::Active | ProductStatus::PendingReview)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuperCategory {
    Refrigerator,
    Freezer,
    Cryogenic,
    Accessory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerTier {
    Standard,
    UltraTouch,
    Precision,
    PidBloodBank,
}

// Documents

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    ProductDataSheet,
    CutSheet,
    FeatureList,
    PerformanceDataSheet,
    DimensionalDrawing,
    ProductImage,
    SelectionGuide,
    InstallManual,
    Marketing,
    Catalog,
    Other,
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocType::ProductDataSheet => "product_data_sheet",
            DocType::CutSheet => "cut_sheet",
            DocType::FeatureList => "feature_list",
            DocType::PerformanceDataSheet => "performance_data_sheet",
            DocType::DimensionalDrawing => "dimensional_drawing",
            DocType::ProductImage => "product_image",
            DocType::SelectionGuide => "selection_guide",
            DocType::InstallManual => "install_manual",
            DocType::Marketing => "marketing",
            DocType::Catalog => "catalog",
            DocType::Other => "other",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocStatus {
    Pending,
    Processing,
    Processed,
    Failed,
    Superseded,
    Quarantined,
}

// Relationships

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Supersedes,
    EquivalentTo,
    CompatibleWith,
    AccessoryFor,
    VariantOf,
    RebrandOf,
}

impl RelationKind {
    /// Symmetric kinds may participate in cycles; directed kinds may not.
    pub fn is_symmetric(&self) -> bool {
        matches!(self, RelationKind::EquivalentTo | RelationKind::CompatibleWith)
    }
}

// Conflicts

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    Pending,
    KeepExisting,
    AcceptNew,
    ManualOverride,
    Dismissed,
}

impl ConflictResolution {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConflictResolution::Pending)
    }
}

// Chunks

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Text,
    Table,
    SpecBlock,
    Header,
    PerformanceData,
    Dimensional,
    Description,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRelevance {
    Primary,
    Mentioned,
    Accessory,
    Related,
}

// Jobs

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

// Callers

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    SalesEngineer,
    ProductManager,
    Admin,
}

impl UserRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Some(UserRole::Customer),
            "sales_engineer" => Some(UserRole::SalesEngineer),
            "product_manager" => Some(UserRole::ProductManager),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::SalesEngineer => "sales_engineer",
            UserRole::ProductManager => "product_manager",
            UserRole::Admin => "admin",
        }
    }
}

// Spec values

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecDataType {
    Numeric,
    Text,
    Boolean,
    Enum,
    Range,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    Imperial,
    Metric,
    None,
}

/// A typed spec value keyed by canonical name on a product.
///
/// The registry entry's `data_type` decides which variant is stored; free
/// text that a compound parser could not interpret is kept as `Text` so the
/// conflict engine can still compare it case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SpecValue {
    Numeric { value: f64, unit: Option<String> },
    Text(String),
    Boolean(bool),
    Enum(String),
    Range { min: f64, max: f64 },
    List(Vec<String>),
}

impl SpecValue {
    pub fn numeric(value: f64) -> Self {
        SpecValue::Numeric { value, unit: None }
    }

    pub fn numeric_with_unit(value: f64, unit: impl Into<String>) -> Self {
        SpecValue::Numeric {
            value,
            unit: Some(unit.into()),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        SpecValue::Text(value.into())
    }

    pub fn data_type(&self) -> SpecDataType {
        match self {
            SpecValue::Numeric { .. } => SpecDataType::Numeric,
            SpecValue::Text(_) => SpecDataType::Text,
            SpecValue::Boolean(_) => SpecDataType::Boolean,
            SpecValue::Enum(_) => SpecDataType::Enum,
            SpecValue::Range { .. } => SpecDataType::Range,
            SpecValue::List(_) => SpecDataType::List,
        }
    }

    /// Numeric view of the value, when one exists.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SpecValue::Numeric { value, .. } => Some(*value),
            SpecValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            SpecValue::Text(s) | SpecValue::Enum(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SpecValue::Text(s) | SpecValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            SpecValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl std::fmt::Display for SpecValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecValue::Numeric { value, unit: Some(u) } => write!(f, "{value} {u}"),
            SpecValue::Numeric { value, unit: None } => write!(f, "{value}"),
            SpecValue::Text(s) | SpecValue::Enum(s) => write!(f, "{s}"),
            SpecValue::Boolean(b) => write!(f, "{b}"),
            SpecValue::Range { min, max } => write!(f, "{min}..{max}"),
            SpecValue::List(items) => write!(f, "{}", items.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_uniqueness() {
        assert_ne!(ProductId::new(), ProductId::new());
        assert_ne!(DocumentId::new(), DocumentId::new());
    }

    #[test]
    fn test_id_round_trip() {
        let id = ProductId::new();
        let parsed: ProductId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_relation_symmetry() {
        assert!(RelationKind::EquivalentTo.is_symmetric());
        assert!(RelationKind::CompatibleWith.is_symmetric());
        assert!(!RelationKind::Supersedes.is_symmetric());
        assert!(!RelationKind::RebrandOf.is_symmetric());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ConflictSeverity::Critical > ConflictSeverity::High);
        assert!(ConflictSeverity::High > ConflictSeverity::Medium);
        assert!(ConflictSeverity::Medium > ConflictSeverity::Low);
    }

    #[test]
    fn test_resolution_terminality() {
        assert!(!ConflictResolution::Pending.is_terminal());
        assert!(ConflictResolution::AcceptNew.is_terminal());
        assert!(ConflictResolution::Dismissed.is_terminal());
    }

    #[test]
    fn test_spec_value_as_f64() {
        assert_eq!(SpecValue::numeric(26.0).as_f64(), Some(26.0));
        assert_eq!(SpecValue::text("25.8").as_f64(), Some(25.8));
        assert_eq!(SpecValue::Boolean(true).as_f64(), Some(1.0));
        assert_eq!(SpecValue::text("solid").as_f64(), None);
    }

    #[test]
    fn test_spec_value_serde_shape() {
        let v = SpecValue::numeric_with_unit(26.0, "cu.ft.");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["kind"], "numeric");
        assert_eq!(json["value"]["value"], 26.0);

        let back: SpecValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(UserRole::parse("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("Sales_Engineer"), Some(UserRole::SalesEngineer));
        assert_eq!(UserRole::parse("root"), None);
    }
}
