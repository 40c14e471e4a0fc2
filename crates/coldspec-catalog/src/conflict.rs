//! Spec conflict detection and resolution.
//!
//! For each incoming spec the engine compares the stored value by data type
//! and per-spec tolerance, then decides between writing, ignoring,
//! overwriting (newer revision wins), or flagging a pending conflict row.

use chrono::{Datelike, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use coldspec_core::{
    ConflictResolution, ConflictSeverity, SpecConflict, SpecRegistryEntry, SpecValue,
};

use crate::{CatalogError, Result};

lazy_static! {
    /// `Rev_03.18.25`, `Rev 3-18-2025`, `Rev.03/18/25`
    static ref REVISION_DATE: Regex =
        Regex::new(r"(?i)Rev[_\s.\-]*(\d{1,2})[.\-/](\d{1,2})[.\-/](\d{2,4})").unwrap();
    /// Compact form: `Rev_07232025`
    static ref REVISION_COMPACT: Regex =
        Regex::new(r"(?i)Rev[_\s.\-]*(\d{2})(\d{2})(\d{4})").unwrap();
}

#[derive(Debug, Clone)]
pub struct ConflictConfig {
    /// Relative numeric tolerance when the equivalence rule has none.
    pub default_tolerance: f64,
    /// Numeric disagreement at or above this escalates severity to high.
    pub numeric_critical_threshold: f64,
    /// Precedence when only the incoming document carries a revision.
    /// True (default): the dated document wins over the undated one.
    /// False: treat it as a tie and take the conflict path. An undated
    /// incoming document never wins either way.
    pub dated_beats_undated: bool,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            default_tolerance: 0.05,
            numeric_critical_threshold: 0.20,
            dated_beats_undated: true,
        }
    }
}

/// Outcome of comparing an incoming spec against the stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictDecision {
    /// No stored value: write the new one, no conflict.
    Write,
    /// Equal under the type rule: nothing to do.
    NoOp,
    /// Values disagree and the incoming document's revision is strictly
    /// newer: overwrite and audit, no conflict row.
    Overwrite,
    /// Values disagree with tied or missing revisions: flag for review,
    /// keep the stored value.
    Flag(ConflictSeverity),
}

#[derive(Debug, Clone, Default)]
pub struct ConflictEngine {
    config: ConflictConfig,
}

impl ConflictEngine {
    pub fn new(config: ConflictConfig) -> Self {
        Self { config }
    }

    /// Apply the decision table for one `(product, spec)` pair.
    ///
    /// `tolerance` comes from the family's equivalence rule when present.
    pub fn decide(
        &self,
        entry: Option<&SpecRegistryEntry>,
        tolerance: Option<f64>,
        existing: Option<&SpecValue>,
        incoming: &SpecValue,
        existing_revision: Option<&str>,
        incoming_revision: Option<&str>,
    ) -> ConflictDecision {
        let Some(existing) = existing else {
            return ConflictDecision::Write;
        };

        let tolerance = tolerance.unwrap_or(self.config.default_tolerance);
        if values_equal(existing, incoming, tolerance) {
            return ConflictDecision::NoOp;
        }

        if self.incoming_wins(incoming_revision, existing_revision) {
            return ConflictDecision::Overwrite;
        }

        ConflictDecision::Flag(self.severity(entry, existing, incoming))
    }

    /// True when the incoming document's revision date is strictly newer
    /// than the stored one by at least a day.
    pub fn incoming_wins(&self, incoming_revision: Option<&str>, existing_revision: Option<&str>) -> bool {
        let new_date = incoming_revision.and_then(parse_revision_date);
        let old_date = existing_revision.and_then(parse_revision_date);
        match (new_date, old_date) {
            (Some(new), Some(old)) => new > old,
            (Some(_), None) => self.config.dated_beats_undated,
            _ => false,
        }
    }

    fn severity(
        &self,
        entry: Option<&SpecRegistryEntry>,
        existing: &SpecValue,
        incoming: &SpecValue,
    ) -> ConflictSeverity {
        // Unapproved auto-discovered specs never rise above medium.
        if let Some(entry) = entry {
            if entry.auto_discovered && !entry.approved {
                return ConflictSeverity::Medium;
            }
            if entry.is_critical {
                return ConflictSeverity::Critical;
            }
        }
        if let (Some(a), Some(b)) = (existing.as_f64(), incoming.as_f64()) {
            if relative_delta(a, b) >= self.config.numeric_critical_threshold {
                return ConflictSeverity::High;
            }
        }
        ConflictSeverity::Medium
    }

    /// Close a pending conflict exactly once. Returns the value to write
    /// to the product, when the resolution carries one.
    pub fn resolve(
        &self,
        conflict: &mut SpecConflict,
        resolution: ConflictResolution,
        override_value: Option<SpecValue>,
    ) -> Result<Option<SpecValue>> {
        if conflict.resolution.is_terminal() {
            return Err(CatalogError::ConflictClosed(conflict.id.to_string()));
        }
        let applied = match resolution {
            ConflictResolution::Pending => {
                return Err(CatalogError::InvalidWrite(
                    "cannot resolve a conflict back to pending".into(),
                ))
            }
            ConflictResolution::AcceptNew => conflict.new_value.clone(),
            ConflictResolution::KeepExisting | ConflictResolution::Dismissed => None,
            ConflictResolution::ManualOverride => {
                let value = override_value.ok_or_else(|| {
                    CatalogError::InvalidWrite("manual_override requires a value".into())
                })?;
                Some(value)
            }
        };
        conflict.resolution = resolution;
        conflict.resolved_value = applied.clone();
        conflict.resolved_at = Some(Utc::now());
        Ok(applied)
    }
}

/// Type-directed equality. Numeric values compare under relative
/// tolerance (the boundary counts as equal), text case-folds, lists
/// compare as multisets, booleans compare exactly.
pub fn values_equal(a: &SpecValue, b: &SpecValue, tolerance: f64) -> bool {
    match (a, b) {
        (SpecValue::Boolean(x), SpecValue::Boolean(y)) => x == y,
        (SpecValue::List(x), SpecValue::List(y)) => {
            let mut xs: Vec<String> = x.iter().map(|s| s.trim().to_lowercase()).collect();
            let mut ys: Vec<String> = y.iter().map(|s| s.trim().to_lowercase()).collect();
            xs.sort();
            ys.sort();
            xs == ys
        }
        (SpecValue::Range { min: amin, max: amax }, SpecValue::Range { min: bmin, max: bmax }) => {
            relative_delta(*amin, *bmin) <= tolerance && relative_delta(*amax, *bmax) <= tolerance
        }
        _ => {
            if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
                return relative_delta(x, y) <= tolerance;
            }
            match (text_of(a), text_of(b)) {
                (Some(x), Some(y)) => normalize_text(x) == normalize_text(y),
                _ => false,
            }
        }
    }
}

fn text_of(value: &SpecValue) -> Option<&str> {
    match value {
        SpecValue::Text(s) | SpecValue::Enum(s) => Some(s),
        _ => None,
    }
}

fn normalize_text(s: &str) -> String {
    s.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// |a−b| / max(|a|,|b|,ε)
pub fn relative_delta(a: f64, b: f64) -> f64 {
    let denom = a.abs().max(b.abs()).max(1e-9);
    (a - b).abs() / denom
}

/// Parse revision strings like `Rev_03.18.25` or `Rev_07232025` into a
/// date. Two-digit years resolve to the century nearest today: the 2000s,
/// unless that lands more than a year in the future.
pub fn parse_revision_date(revision: &str) -> Option<NaiveDate> {
    if let Some(caps) = REVISION_DATE.captures(revision) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let mut year: i32 = caps[3].parse().ok()?;
        if year < 100 {
            year += 2000;
            if year > Utc::now().year() + 1 {
                year -= 100;
            }
        }
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    if let Some(caps) = REVISION_COMPACT.captures(revision) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldspec_core::{ProductId, SpecDataType};

    fn engine() -> ConflictEngine {
        ConflictEngine::new(ConflictConfig::default())
    }

    #[test]
    fn test_revision_parsing() {
        assert_eq!(
            parse_revision_date("Rev_03.18.25"),
            NaiveDate::from_ymd_opt(2025, 3, 18)
        );
        assert_eq!(
            parse_revision_date("Rev 01-10-2025"),
            NaiveDate::from_ymd_opt(2025, 1, 10)
        );
        assert_eq!(
            parse_revision_date("Rev_07232025"),
            NaiveDate::from_ymd_opt(2025, 7, 23)
        );
        assert_eq!(parse_revision_date("no revision here"), None);
    }

    #[test]
    fn test_two_digit_years_resolve_to_nearest_century() {
        assert_eq!(
            parse_revision_date("Rev_06.01.99"),
            NaiveDate::from_ymd_opt(1999, 6, 1)
        );
        assert_eq!(
            parse_revision_date("Rev_06.01.24"),
            NaiveDate::from_ymd_opt(2024, 6, 1)
        );
    }

    #[test]
    fn test_no_existing_value_writes() {
        let decision = engine().decide(
            None,
            None,
            None,
            &SpecValue::numeric(26.0),
            None,
            Some("Rev_03.18.25"),
        );
        assert_eq!(decision, ConflictDecision::Write);
    }

    #[test]
    fn test_tolerance_boundary_is_equal() {
        // 5% exactly: 100 vs 95.2381 gives delta == 0.047..; use 100 vs 95
        // for delta == 0.05 under max-denominator.
        let decision = engine().decide(
            None,
            None,
            Some(&SpecValue::numeric(100.0)),
            &SpecValue::numeric(95.0),
            None,
            None,
        );
        assert_eq!(decision, ConflictDecision::NoOp);
    }

    #[test]
    fn test_text_case_fold_equality() {
        assert!(values_equal(
            &SpecValue::text("Hermetic  Compressor"),
            &SpecValue::text("hermetic compressor"),
            0.05
        ));
    }

    #[test]
    fn test_list_multiset_equality() {
        assert!(values_equal(
            &SpecValue::List(vec!["ETL".into(), "UL471".into()]),
            &SpecValue::List(vec!["ul471".into(), "etl".into()]),
            0.05
        ));
        assert!(!values_equal(
            &SpecValue::List(vec!["ETL".into()]),
            &SpecValue::List(vec!["ETL".into(), "UL471".into()]),
            0.05
        ));
    }

    #[test]
    fn test_newer_revision_overwrites() {
        let decision = engine().decide(
            None,
            None,
            Some(&SpecValue::numeric(26.0)),
            &SpecValue::numeric(25.8),
            Some("Rev_01.10.25"),
            Some("Rev_03.18.25"),
        );
        assert_eq!(decision, ConflictDecision::Overwrite);
    }

    #[test]
    fn test_tied_revision_flags_medium() {
        let decision = engine().decide(
            None,
            None,
            Some(&SpecValue::numeric(26.0)),
            &SpecValue::numeric(25.8),
            Some("Rev_01.10.25"),
            Some("Rev_01.10.25"),
        );
        assert_eq!(decision, ConflictDecision::Flag(ConflictSeverity::Medium));
    }

    #[test]
    fn test_missing_incoming_revision_flags() {
        let decision = engine().decide(
            None,
            None,
            Some(&SpecValue::numeric(26.0)),
            &SpecValue::numeric(25.8),
            Some("Rev_01.10.25"),
            None,
        );
        assert_eq!(decision, ConflictDecision::Flag(ConflictSeverity::Medium));
    }

    #[test]
    fn test_dated_incoming_beats_undated_stored() {
        let decision = engine().decide(
            None,
            None,
            Some(&SpecValue::numeric(26.0)),
            &SpecValue::numeric(25.8),
            None,
            Some("Rev_03.18.25"),
        );
        assert_eq!(decision, ConflictDecision::Overwrite);

        // The conservative policy treats it as a tie instead.
        let conservative = ConflictEngine::new(ConflictConfig {
            dated_beats_undated: false,
            ..ConflictConfig::default()
        });
        let decision = conservative.decide(
            None,
            None,
            Some(&SpecValue::numeric(26.0)),
            &SpecValue::numeric(25.8),
            None,
            Some("Rev_03.18.25"),
        );
        assert_eq!(decision, ConflictDecision::Flag(ConflictSeverity::Medium));
    }

    #[test]
    fn test_critical_spec_escalates() {
        let entry = SpecRegistryEntry::new("voltage_v", SpecDataType::Numeric).critical();
        let decision = engine().decide(
            Some(&entry),
            None,
            Some(&SpecValue::numeric(115.0)),
            &SpecValue::numeric(220.0),
            None,
            None,
        );
        assert_eq!(decision, ConflictDecision::Flag(ConflictSeverity::Critical));
    }

    #[test]
    fn test_large_numeric_delta_is_high() {
        let entry = SpecRegistryEntry::new("shelf_count", SpecDataType::Numeric);
        let decision = engine().decide(
            Some(&entry),
            None,
            Some(&SpecValue::numeric(4.0)),
            &SpecValue::numeric(8.0),
            None,
            None,
        );
        assert_eq!(decision, ConflictDecision::Flag(ConflictSeverity::High));
    }

    #[test]
    fn test_unapproved_auto_discovered_caps_at_medium() {
        let mut entry = SpecRegistryEntry::auto_discovered("mystery", SpecDataType::Numeric);
        entry.is_critical = true;
        let decision = engine().decide(
            Some(&entry),
            None,
            Some(&SpecValue::numeric(1.0)),
            &SpecValue::numeric(100.0),
            None,
            None,
        );
        assert_eq!(decision, ConflictDecision::Flag(ConflictSeverity::Medium));
    }

    #[test]
    fn test_resolution_happens_exactly_once() {
        let engine = engine();
        let mut conflict = SpecConflict::pending(
            ProductId::new(),
            "storage_capacity_cuft",
            Some(SpecValue::numeric(26.0)),
            Some(SpecValue::numeric(25.8)),
            ConflictSeverity::Medium,
        );

        let applied = engine
            .resolve(&mut conflict, ConflictResolution::AcceptNew, None)
            .unwrap();
        assert_eq!(applied, Some(SpecValue::numeric(25.8)));
        assert!(conflict.resolved_at.is_some());

        let err = engine
            .resolve(&mut conflict, ConflictResolution::Dismissed, None)
            .unwrap_err();
        assert!(matches!(err, CatalogError::ConflictClosed(_)));
    }

    #[test]
    fn test_manual_override_requires_value() {
        let engine = engine();
        let mut conflict = SpecConflict::pending(
            ProductId::new(),
            "voltage_v",
            Some(SpecValue::numeric(115.0)),
            Some(SpecValue::numeric(220.0)),
            ConflictSeverity::Critical,
        );
        let err = engine
            .resolve(&mut conflict, ConflictResolution::ManualOverride, None)
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidWrite(_)));

        let applied = engine
            .resolve(
                &mut conflict,
                ConflictResolution::ManualOverride,
                Some(SpecValue::numeric(115.0)),
            )
            .unwrap();
        assert_eq!(applied, Some(SpecValue::numeric(115.0)));
    }
}
