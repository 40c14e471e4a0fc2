//! The recommendation engine: candidate filtering, weighted scoring,
//! comparison, and equivalence lookup.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use coldspec_catalog::conflict::relative_delta;
use coldspec_catalog::store::{CatalogStore, ProductFilter};
use coldspec_core::{EquivalenceRule, Product, ProductId, RelationKind};

use crate::profiles::{profile_by_key, resolve_use_case, UseCaseProfile};
use crate::scoring::{certification_coverage, score_spec, BandScore};
use crate::{RecommendError, Result};

/// Hard filters supplied by the caller, merged with the resolved
/// profile's own constraints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constraints {
    pub capacity_min: Option<f64>,
    pub capacity_max: Option<f64>,
    pub temp_min_c: Option<f64>,
    pub temp_max_c: Option<f64>,
    pub door_type: Option<String>,
    #[serde(default)]
    pub certifications_required: Vec<String>,
    pub voltage_v: Option<f64>,
    pub max_width_in: Option<f64>,
    pub max_depth_in: Option<f64>,
    pub max_height_in: Option<f64>,
    #[serde(default)]
    pub brands: Vec<String>,
    #[serde(default)]
    pub families: Vec<String>,
    #[serde(default)]
    pub include_discontinued: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendRequest {
    /// Named profile key.
    pub use_case: Option<String>,
    /// Free-text use-case description, resolved by keyword matching.
    pub use_case_text: Option<String>,
    #[serde(default)]
    pub constraints: Constraints,
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub product_id: ProductId,
    pub model_number: String,
    pub brand_code: String,
    pub family_code: String,
    pub score: f64,
    pub breakdown: Vec<BandScore>,
    pub certifications_ok: bool,
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub step: String,
    pub detail: String,
    pub products_remaining: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub use_case: Option<String>,
    pub products: Vec<Recommendation>,
    /// Best-scoring candidates that failed a hard constraint, annotated
    /// with the reasons; returned when too few candidates pass.
    pub alternates: Vec<Recommendation>,
    pub clarifications: Vec<String>,
    pub diagnostics: Vec<String>,
    pub trace: Vec<TraceStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareRow {
    pub spec: String,
    pub display_name: String,
    pub values: BTreeMap<String, Option<String>>,
    pub differs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareResponse {
    pub products: Vec<String>,
    pub rows: Vec<CompareRow>,
    pub summary: String,
}

pub struct RecommendationEngine {
    store: Arc<dyn CatalogStore>,
    max_equivalence_depth: usize,
}

impl RecommendationEngine {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            max_equivalence_depth: 3,
        }
    }

    pub async fn recommend(&self, request: &RecommendRequest) -> Result<RecommendResponse> {
        let mut trace = Vec::new();
        let max_results = request.max_results.unwrap_or(5);

        // Resolve the use-case profile.
        let profile = request
            .use_case
            .as_deref()
            .and_then(profile_by_key)
            .or_else(|| request.use_case.as_deref().and_then(resolve_use_case))
            .or_else(|| request.use_case_text.as_deref().and_then(resolve_use_case));
        trace.push(TraceStep {
            step: "use_case_resolution".into(),
            detail: match &profile {
                Some(p) => format!("{} ({})", p.name, p.key),
                None => "no profile matched, generic matching".into(),
            },
            products_remaining: 0,
        });

        // Candidate pool.
        let candidates = self
            .store
            .find_products(&ProductFilter {
                include_discontinued: request.constraints.include_discontinued,
                ..ProductFilter::default()
            })
            .await?;
        trace.push(TraceStep {
            step: "candidate_pool".into(),
            detail: format!("{} products", candidates.len()),
            products_remaining: candidates.len(),
        });

        // Hard constraints.
        let mut passing: Vec<(Product, Vec<BandScore>, f64, bool)> = Vec::new();
        let mut failing: Vec<(Product, Vec<String>)> = Vec::new();
        for product in candidates {
            let reasons = hard_fail_reasons(&product, &request.constraints, profile.as_ref());
            if reasons.is_empty() {
                let (score, breakdown) = self.score(&product, profile.as_ref());
                passing.push((product, breakdown, score, true));
            } else {
                failing.push((product, reasons));
            }
        }
        trace.push(TraceStep {
            step: "hard_filter".into(),
            detail: format!("{} pass, {} filtered out", passing.len(), failing.len()),
            products_remaining: passing.len(),
        });

        let mut diagnostics = Vec::new();
        if passing.is_empty() {
            diagnostics.push(
                "No products satisfy every hard constraint; try relaxing capacity, \
certification, or dimension requirements."
                    .to_string(),
            );
        }

        // Rank, then tie-break on the family's priority specs.
        let rule = match passing.first() {
            Some((product, _, _, _)) => self.store.equivalence_rule(&product.family_code).await?,
            None => None,
        };
        passing.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| priority_tiebreak(&a.0, &b.0, rule.as_ref()))
        });
        trace.push(TraceStep {
            step: "ranking".into(),
            detail: format!("top {}", passing.len().min(max_results)),
            products_remaining: passing.len().min(max_results),
        });

        let products: Vec<Recommendation> = passing
            .iter()
            .take(max_results)
            .map(|(product, breakdown, score, certifications_ok)| {
                to_recommendation(product, breakdown.clone(), *score, *certifications_ok, Vec::new())
            })
            .collect();

        // Offer best-failing candidates as annotated alternates when the
        // primary list comes up short.
        let mut alternates = Vec::new();
        if products.len() < max_results && !failing.is_empty() {
            let mut scored_failing: Vec<(Product, Vec<String>, f64, Vec<BandScore>)> = failing
                .into_iter()
                .map(|(product, reasons)| {
                    let (score, breakdown) = self.score(&product, profile.as_ref());
                    (product, reasons, score, breakdown)
                })
                .collect();
            scored_failing
                .sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
            for (product, reasons, score, breakdown) in scored_failing.into_iter().take(3) {
                alternates.push(to_recommendation(&product, breakdown, score, false, reasons));
            }
        }

        let clarifications = build_clarifications(request);

        info!(
            use_case = profile.as_ref().map(|p| p.key.as_str()).unwrap_or("-"),
            recommended = products.len(),
            alternates = alternates.len(),
            "Recommendation produced"
        );

        Ok(RecommendResponse {
            use_case: profile.map(|p| p.key),
            products,
            alternates,
            clarifications,
            diagnostics,
            trace,
        })
    }

    /// Weighted band score with full breakdown. Without a profile every
    /// candidate scores a neutral 0.5.
    fn score(&self, product: &Product, profile: Option<&UseCaseProfile>) -> (f64, Vec<BandScore>) {
        let Some(profile) = profile else {
            return (0.5, Vec::new());
        };
        let mut breakdown = Vec::new();
        let mut total = 0.0;
        for (spec, band) in &profile.bands {
            let scored = score_spec(product, spec, band);
            total += scored.contribution;
            breakdown.push(scored);
        }
        (total, breakdown)
    }

    /// Side-by-side comparison of 2 to 4 products.
    pub async fn compare(
        &self,
        product_refs: &[String],
        highlight_differences: bool,
    ) -> Result<CompareResponse> {
        let mut products = Vec::new();
        for reference in product_refs {
            let product = match reference.parse::<ProductId>().ok() {
                Some(id) => self.store.product(id).await?,
                None => None,
            };
            let product = match product {
                Some(p) => Some(p),
                None => self.store.product_by_model(reference).await?,
            };
            let product =
                product.ok_or_else(|| RecommendError::NotFound(reference.clone()))?;
            products.push(product);
        }
        if products.len() < 2 {
            return Err(RecommendError::NotFound(
                "comparison requires at least two products".into(),
            ));
        }

        // Union of populated spec names across the set.
        let mut spec_names: Vec<String> = Vec::new();
        for product in &products {
            for name in coldspec_core::product::FIXED_COLUMNS {
                if product.spec_value(name).is_some() && !spec_names.contains(&name.to_string()) {
                    spec_names.push(name.to_string());
                }
            }
            for name in product.specs.keys() {
                if !spec_names.contains(name) {
                    spec_names.push(name.clone());
                }
            }
        }
        if products.iter().any(|p| !p.certifications.is_empty())
            && !spec_names.contains(&"certifications".to_string())
        {
            spec_names.push("certifications".to_string());
        }

        let mut rows = Vec::new();
        for spec in spec_names {
            let mut values: BTreeMap<String, Option<String>> = BTreeMap::new();
            let mut distinct: HashSet<String> = HashSet::new();
            for product in &products {
                let value = product.spec_value(&spec).map(|v| v.to_string());
                if let Some(v) = &value {
                    distinct.insert(v.clone());
                }
                values.insert(product.model_number.clone(), value);
            }
            let differs = distinct.len() > 1
                || values.values().any(|v| v.is_none()) && !distinct.is_empty();
            if highlight_differences && !differs {
                continue;
            }
            rows.push(CompareRow {
                display_name: display_name(&spec),
                spec,
                values,
                differs,
            });
        }

        let differing: Vec<&str> = rows
            .iter()
            .filter(|r| r.differs)
            .take(6)
            .map(|r| r.display_name.as_str())
            .collect();
        let summary = if differing.is_empty() {
            format!(
                "{} products compared; no differing specs found.",
                products.len()
            )
        } else {
            format!(
                "{} products compared; they differ in {}.",
                products.len(),
                differing.join(", ")
            )
        };

        Ok(CompareResponse {
            products: products.iter().map(|p| p.model_number.clone()).collect(),
            rows,
            summary,
        })
    }

    /// Equivalents of a product: stored symmetric relationship edges
    /// followed to a bounded depth with cycle detection, plus a
    /// rule-driven similarity scan across the catalog.
    pub async fn equivalents(&self, model_number: &str) -> Result<Vec<(Product, f64)>> {
        let Some(origin) = self.store.product_by_model(model_number).await? else {
            return Err(RecommendError::NotFound(model_number.to_string()));
        };
        let rule = self
            .store
            .equivalence_rule(&origin.family_code)
            .await?
            .unwrap_or_else(|| EquivalenceRule::new(origin.family_code.clone()));

        let mut results: Vec<(Product, f64)> = Vec::new();
        let mut visited: HashSet<ProductId> = HashSet::new();
        visited.insert(origin.id);

        // Stored edges first: traversal is depth-bounded and cycles stop
        // at the visited set.
        let mut frontier = vec![origin.id];
        for _ in 0..self.max_equivalence_depth {
            let mut next = Vec::new();
            for id in frontier.drain(..) {
                for edge in self.store.relationships_from(id).await? {
                    if edge.kind != RelationKind::EquivalentTo || !visited.insert(edge.target) {
                        continue;
                    }
                    if let Some(product) = self.store.product(edge.target).await? {
                        next.push(product.id);
                        results.push((product, edge.confidence));
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        // Rule-driven scan over the rest of the catalog.
        let all = self.store.find_products(&ProductFilter::default()).await?;
        for candidate in all {
            if visited.contains(&candidate.id) {
                continue;
            }
            if let Some(similarity) = similarity(&origin, &candidate, &rule) {
                results.push((candidate, similarity));
            }
        }

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        debug!(model = model_number, equivalents = results.len(), "Equivalence lookup");
        Ok(results)
    }
}

/// Evaluate every hard constraint, returning the reasons a product
/// fails. Empty means it passes.
fn hard_fail_reasons(
    product: &Product,
    constraints: &Constraints,
    profile: Option<&UseCaseProfile>,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if let Some(profile) = profile {
        if !profile.families.is_empty() && !profile.families.contains(&product.family_code) {
            reasons.push(format!(
                "family {} outside profile families",
                product.family_code
            ));
        }
        for cert in &profile.required_certifications {
            if !product.has_certification(cert) {
                reasons.push(format!("missing required certification {cert}"));
            }
        }
        if let Some((low, high)) = profile.temp_must_cover {
            match (product.temp_range_min_c, product.temp_range_max_c) {
                (Some(min), Some(max)) if min <= low && max >= high => {}
                _ => reasons.push(format!(
                    "temperature range does not cover {low}\u{b0}C to {high}\u{b0}C"
                )),
            }
        }
        if let Some(limit) = profile.effective_max_height() {
            if let Some(height) = product.ext_height_in {
                if height > limit {
                    reasons.push(format!("height {height}\" exceeds {limit}\""));
                }
            }
        }
    }

    if !constraints.families.is_empty() && !constraints.families.contains(&product.family_code) {
        reasons.push(format!("family {} excluded by filter", product.family_code));
    }
    if !constraints.brands.is_empty() && !constraints.brands.contains(&product.brand_code) {
        reasons.push(format!("brand {} excluded by filter", product.brand_code));
    }
    if let Some(min) = constraints.capacity_min {
        match product.storage_capacity_cuft {
            Some(capacity) if capacity >= min => {}
            _ => reasons.push(format!("capacity below {min} cu.ft.")),
        }
    }
    if let Some(max) = constraints.capacity_max {
        match product.storage_capacity_cuft {
            Some(capacity) if capacity <= max => {}
            _ => reasons.push(format!("capacity above {max} cu.ft.")),
        }
    }
    if let Some(required_min) = constraints.temp_min_c {
        match product.temp_range_min_c {
            Some(min) if min <= required_min => {}
            _ => reasons.push(format!("cannot reach {required_min}\u{b0}C")),
        }
    }
    if let Some(required_max) = constraints.temp_max_c {
        match product.temp_range_max_c {
            Some(max) if max >= required_max => {}
            _ => reasons.push(format!("cannot reach {required_max}\u{b0}C")),
        }
    }
    if let Some(door) = &constraints.door_type {
        match &product.door_type {
            Some(d) if d.eq_ignore_ascii_case(door) => {}
            _ => reasons.push(format!("door type is not {door}")),
        }
    }
    for cert in &constraints.certifications_required {
        if !product.has_certification(cert) {
            reasons.push(format!("missing required certification {cert}"));
        }
    }
    if let Some(required) = constraints.voltage_v {
        if let Some(voltage) = product.voltage_v {
            if (voltage - required).abs() > 1.0 {
                reasons.push(format!("voltage {voltage}V does not match {required}V"));
            }
        }
    }
    for (limit, actual, label) in [
        (constraints.max_width_in, product.ext_width_in, "width"),
        (constraints.max_depth_in, product.ext_depth_in, "depth"),
        (constraints.max_height_in, product.ext_height_in, "height"),
    ] {
        if let (Some(limit), Some(actual)) = (limit, actual) {
            if actual > limit {
                reasons.push(format!("{label} {actual}\" exceeds {limit}\""));
            }
        }
    }

    reasons
}

/// Tie-break equal scores by the family's priority specs; lower values
/// win (uniformity, stability, and energy all read better when smaller).
fn priority_tiebreak(a: &Product, b: &Product, rule: Option<&EquivalenceRule>) -> std::cmp::Ordering {
    let Some(rule) = rule else {
        return a.model_number.cmp(&b.model_number);
    };
    for spec in &rule.priority_specs {
        let left = a.spec_value(spec).and_then(|v| v.as_f64());
        let right = b.spec_value(spec).and_then(|v| v.as_f64());
        match (left, right) {
            (Some(l), Some(r)) if (l - r).abs() > 1e-9 => {
                return l.partial_cmp(&r).unwrap_or(std::cmp::Ordering::Equal)
            }
            (Some(_), None) => return std::cmp::Ordering::Less,
            (None, Some(_)) => return std::cmp::Ordering::Greater,
            _ => {}
        }
    }
    a.model_number.cmp(&b.model_number)
}

/// Rule-driven similarity: required-match specs must agree exactly,
/// tolerance-mapped specs contribute linearly; anything beyond twice its
/// tolerance disqualifies the pair.
fn similarity(origin: &Product, candidate: &Product, rule: &EquivalenceRule) -> Option<f64> {
    for spec in &rule.required_match {
        let left = origin.spec_value(spec);
        let right = candidate.spec_value(spec);
        if let (Some(left), Some(right)) = (left, right) {
            if left.to_string().to_lowercase() != right.to_string().to_lowercase() {
                return None;
            }
        }
    }

    let mut scores = Vec::new();
    for (spec, tolerance) in &rule.tolerance_map {
        let left = origin.spec_value(spec).and_then(|v| v.as_f64());
        let right = candidate.spec_value(spec).and_then(|v| v.as_f64());
        if let (Some(left), Some(right)) = (left, right) {
            let delta = relative_delta(left, right);
            if delta > tolerance * 2.0 {
                return None;
            }
            scores.push((1.0 - delta / tolerance).max(0.0));
        }
    }

    if scores.is_empty() {
        return None;
    }
    let similarity = scores.iter().sum::<f64>() / scores.len() as f64;
    (similarity >= 0.5).then_some(similarity)
}

fn to_recommendation(
    product: &Product,
    breakdown: Vec<BandScore>,
    score: f64,
    certifications_ok: bool,
    notes: Vec<String>,
) -> Recommendation {
    Recommendation {
        product_id: product.id,
        model_number: product.model_number.clone(),
        brand_code: product.brand_code.clone(),
        family_code: product.family_code.clone(),
        score: (score * 1e4).round() / 1e4,
        breakdown,
        certifications_ok,
        notes,
    }
}

fn build_clarifications(request: &RecommendRequest) -> Vec<String> {
    let mut clarifications = Vec::new();
    if request.constraints.capacity_min.is_none()
        && request.constraints.capacity_max.is_none()
        && request.use_case.is_none()
    {
        clarifications.push(
            "What storage capacity do you need? Common sizes run 5 to 49 cu.ft.".to_string(),
        );
    }
    if request.constraints.voltage_v.is_none() {
        clarifications.push(
            "Assuming 115V/60Hz standard power; confirm if 220V or other is needed.".to_string(),
        );
    }
    clarifications
}

fn display_name(spec: &str) -> String {
    spec.split('_')
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
    use coldspec_catalog::memory::MemoryCatalogStore;
    use coldspec_catalog::seed;
    use coldspec_core::{ProductRelationship, SpecValue};

    async fn engine_with_products() -> (RecommendationEngine, Arc<dyn CatalogStore>) {
        let store: Arc<dyn CatalogStore> = Arc::new(MemoryCatalogStore::new(4));
        seed::seed_store(&store).await.unwrap();

        // A: NSF-certified pharmacy unit with tight uniformity.
        let mut a = Product::new("PH-ABT-HC-15S", "ABS", "pharmacy_vaccine_ref");
        a.storage_capacity_cuft = Some(14.8);
        a.temp_range_min_c = Some(1.0);
        a.temp_range_max_c = Some(10.0);
        a.door_type = Some("solid".into());
        a.voltage_v = Some(115.0);
        a.refrigerant = Some("R290".into());
        a.set_spec_value("uniformity_c", SpecValue::numeric(1.0));
        a.merge_certifications(vec!["NSF_ANSI_456".into(), "ETL".into()]);
        store.create_product(a).await.unwrap();

        // B: similar size, no certifications, looser uniformity.
        let mut b = Product::new("ABT-HC-15S", "ABS", "premier_lab_ref");
        b.storage_capacity_cuft = Some(15.0);
        b.temp_range_min_c = Some(1.0);
        b.temp_range_max_c = Some(10.0);
        b.door_type = Some("solid".into());
        b.voltage_v = Some(115.0);
        b.refrigerant = Some("R290".into());
        b.set_spec_value("uniformity_c", SpecValue::numeric(2.0));
        store.create_product(b).await.unwrap();

        (RecommendationEngine::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_vaccine_storage_filters_and_scores() {
        let (engine, _) = engine_with_products().await;

        let response = engine
            .recommend(&RecommendRequest {
                use_case: Some("vaccine_storage".into()),
                use_case_text: None,
                constraints: Constraints {
                    capacity_min: Some(10.0),
                    capacity_max: Some(20.0),
                    certifications_required: vec!["NSF/ANSI 456".into()],
                    ..Constraints::default()
                },
                max_results: Some(5),
            })
            .await
            .unwrap();

        assert_eq!(response.products.len(), 1);
        let only = &response.products[0];
        assert_eq!(only.model_number, "PH-ABT-HC-15S");
        assert!(only.certifications_ok);

        let uniformity = only
            .breakdown
            .iter()
            .find(|b| b.spec == "uniformity_c")
            .unwrap();
        assert!(uniformity.contribution > 0.0);

        // The uncertified unit appears only as an annotated alternate.
        assert!(response
            .alternates
            .iter()
            .any(|alt| alt.model_number == "ABT-HC-15S" && !alt.notes.is_empty()));
    }

    #[tokio::test]
    async fn test_empty_result_has_diagnostic() {
        let (engine, _) = engine_with_products().await;
        let response = engine
            .recommend(&RecommendRequest {
                use_case: None,
                use_case_text: None,
                constraints: Constraints {
                    capacity_min: Some(500.0),
                    ..Constraints::default()
                },
                max_results: Some(5),
            })
            .await
            .unwrap();
        assert!(response.products.is_empty());
        assert!(!response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_free_text_use_case_resolution() {
        let (engine, _) = engine_with_products().await;
        let response = engine
            .recommend(&RecommendRequest {
                use_case: None,
                use_case_text: Some("CDC vaccine storage for a clinic".into()),
                constraints: Constraints::default(),
                max_results: Some(5),
            })
            .await
            .unwrap();
        assert_eq!(response.use_case.as_deref(), Some("vaccine_storage"));
    }

    #[tokio::test]
    async fn test_compare_highlights_differences() {
        let (engine, _) = engine_with_products().await;
        let response = engine
            .compare(&["PH-ABT-HC-15S".into(), "ABT-HC-15S".into()], true)
            .await
            .unwrap();

        assert_eq!(response.products.len(), 2);
        // Identical specs (door type, voltage) are suppressed.
        assert!(!response.rows.iter().any(|r| r.spec == "door_type"));
        assert!(response.rows.iter().any(|r| r.spec == "uniformity_c"));
        assert!(response.summary.contains("differ"));
    }

    #[tokio::test]
    async fn test_compare_requires_two_products() {
        let (engine, _) = engine_with_products().await;
        let err = engine.compare(&["PH-ABT-HC-15S".into()], true).await.unwrap_err();
        assert!(matches!(err, RecommendError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_equivalents_by_similarity_and_edges() {
        let (engine, store) = engine_with_products().await;

        let a = store.product_by_model("PH-ABT-HC-15S").await.unwrap().unwrap();
        let b = store.product_by_model("ABT-HC-15S").await.unwrap().unwrap();
        store
            .insert_relationship(ProductRelationship::new(a.id, b.id, RelationKind::EquivalentTo))
            .await
            .unwrap();

        let equivalents = engine.equivalents("PH-ABT-HC-15S").await.unwrap();
        assert!(equivalents.iter().any(|(p, _)| p.model_number == "ABT-HC-15S"));
    }

    #[tokio::test]
    async fn test_equivalents_cycle_terminates() {
        let (engine, store) = engine_with_products().await;
        let a = store.product_by_model("PH-ABT-HC-15S").await.unwrap().unwrap();
        let b = store.product_by_model("ABT-HC-15S").await.unwrap().unwrap();
        // Symmetric cycle: A <-> B.
        store
            .insert_relationship(ProductRelationship::new(a.id, b.id, RelationKind::EquivalentTo))
            .await
            .unwrap();
        store
            .insert_relationship(ProductRelationship::new(b.id, a.id, RelationKind::EquivalentTo))
            .await
            .unwrap();

        let equivalents = engine.equivalents("PH-ABT-HC-15S").await.unwrap();
        // The origin is never returned and the traversal terminates.
        assert!(equivalents.iter().all(|(p, _)| p.model_number != "PH-ABT-HC-15S"));
    }
}
