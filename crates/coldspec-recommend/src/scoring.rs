//! Feature scoring for recommendation ranking.

use serde::{Deserialize, Serialize};

use coldspec_core::Product;

use crate::profiles::SpecBand;

/// One scored feature in a recommendation's breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandScore {
    pub spec: String,
    pub weight: f64,
    pub value: Option<f64>,
    /// Feature value in [0, 1].
    pub feature: f64,
    /// weight * feature.
    pub contribution: f64,
    pub missing_required: bool,
}

/// Score a value against a target band: 1.0 inside `[low, high]`,
/// decaying linearly to 0.0 at one band-width beyond either edge.
pub fn band_score(value: f64, band: &SpecBand) -> f64 {
    let width = (band.high - band.low).abs().max(1e-9);
    if value >= band.low && value <= band.high {
        return 1.0;
    }
    let distance = if value < band.low {
        band.low - value
    } else {
        value - band.high
    };
    (1.0 - distance / width).max(0.0)
}

/// Score a product's spec against a band, honoring the required flag.
pub fn score_spec(product: &Product, spec: &str, band: &SpecBand) -> BandScore {
    let value = product.spec_value(spec).and_then(|v| v.as_f64());
    match value {
        Some(value) => {
            let feature = band_score(value, band);
            BandScore {
                spec: spec.to_string(),
                weight: band.weight,
                value: Some(value),
                feature,
                contribution: band.weight * feature,
                missing_required: false,
            }
        }
        None => BandScore {
            spec: spec.to_string(),
            weight: band.weight,
            value: None,
            feature: 0.0,
            contribution: 0.0,
            missing_required: band.required,
        },
    }
}

/// Certification coverage: `(all_present, missing)`.
pub fn certification_coverage(product: &Product, required: &[String]) -> (bool, Vec<String>) {
    let missing: Vec<String> = required
        .iter()
        .filter(|cert| !product.has_certification(cert))
        .cloned()
        .collect();
    (missing.is_empty(), missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldspec_core::SpecValue;

    #[test]
    fn test_band_score_inside_band() {
        let band = SpecBand::new(0.25, 0.0, 1.5);
        assert_eq!(band_score(0.0, &band), 1.0);
        assert_eq!(band_score(1.0, &band), 1.0);
        assert_eq!(band_score(1.5, &band), 1.0);
    }

    #[test]
    fn test_band_score_linear_decay() {
        let band = SpecBand::new(0.25, 0.0, 1.5);
        // Half a band-width past the edge: feature 0.5.
        assert!((band_score(2.25, &band) - 0.5).abs() < 1e-9);
        // One full band-width past the edge: feature 0.0.
        assert_eq!(band_score(3.0, &band), 0.0);
        assert_eq!(band_score(10.0, &band), 0.0);
    }

    #[test]
    fn test_band_score_below_band() {
        let band = SpecBand::new(0.2, 10.0, 20.0);
        assert!((band_score(5.0, &band) - 0.5).abs() < 1e-9);
        assert_eq!(band_score(0.0, &band), 0.0);
    }

    #[test]
    fn test_missing_required_scores_zero() {
        let product = Product::new("X-1", "ABS", "premier_lab_ref");
        let band = SpecBand::new(0.25, 0.0, 1.5).required();
        let scored = score_spec(&product, "uniformity_c", &band);
        assert!(scored.missing_required);
        assert_eq!(scored.contribution, 0.0);
    }

    #[test]
    fn test_present_spec_contributes() {
        let mut product = Product::new("X-1", "ABS", "premier_lab_ref");
        product.set_spec_value("uniformity_c", SpecValue::numeric(1.0));
        let band = SpecBand::new(0.25, 0.0, 1.5);
        let scored = score_spec(&product, "uniformity_c", &band);
        assert_eq!(scored.feature, 1.0);
        assert_eq!(scored.contribution, 0.25);
    }

    #[test]
    fn test_certification_coverage() {
        let mut product = Product::new("X-1", "ABS", "pharmacy_nsf_ref");
        product.merge_certifications(vec!["NSF_ANSI_456".into(), "ETL".into()]);

        let (ok, missing) = certification_coverage(&product, &["NSF/ANSI 456".to_string()]);
        assert!(ok);
        assert!(missing.is_empty());

        let (ok, missing) =
            certification_coverage(&product, &["NSF/ANSI 456".to_string(), "AABB".to_string()]);
        assert!(!ok);
        assert_eq!(missing, vec!["AABB"]);
    }
}
