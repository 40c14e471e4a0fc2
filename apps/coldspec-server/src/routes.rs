//! HTTP routes: a thin adapter over the ingestion and query engines.

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::middleware as axum_middleware;
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::{Extension, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use coldspec_catalog::store::ProductFilter;
use coldspec_core::{
    AuditEntry, ConflictResolution, GenerationParams, Product, ProductSnapshot, SpecValue,
    UserRole,
};
use coldspec_ingestion::pipeline::IngestFile;
use coldspec_recommend::{CompareResponse, RecommendRequest, RecommendResponse};
use coldspec_retrieval::render_prompt;

use crate::auth::{auth_middleware, AuthContext};
use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.ingestion.max_upload_bytes() as usize + 1024 * 1024;
    let authed = Router::new()
        .route("/ingest", post(ingest))
        .route("/jobs/:id", get(get_job))
        .route("/products", get(list_products))
        .route("/products/:model", get(get_product))
        .route("/recommend", post(recommend))
        .route("/compare", post(compare))
        .route("/ask", post(ask))
        .route("/conflicts", get(list_conflicts))
        .route("/conflicts/:id", put(resolve_conflict))
        .route("/equivalents/:model", get(equivalents))
        .route("/stats", get(stats))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(authed)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// Ingestion

#[derive(Debug, Serialize)]
struct IngestResponse {
    job_id: String,
    accepted: Vec<String>,
    rejected: Vec<RejectedFile>,
}

#[derive(Debug, Serialize)]
struct RejectedFile {
    filename: String,
    reason: String,
}

async fn ingest(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, ApiError> {
    auth.require(UserRole::SalesEngineer)?;

    let supported = state.config.ingestion.supported_extension_list();
    let max_bytes = state.config.ingestion.max_upload_bytes();

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("malformed multipart body: {e}")))?
    {
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("failed to read {filename}: {e}")))?;

        let extension = filename
            .rfind('.')
            .map(|i| filename[i..].to_lowercase())
            .unwrap_or_default();
        if !supported.contains(&extension) {
            rejected.push(RejectedFile {
                filename,
                reason: format!("unsupported extension {extension:?}"),
            });
            continue;
        }
        if bytes.len() as u64 > max_bytes {
            rejected.push(RejectedFile {
                filename,
                reason: format!("exceeds {} byte upload limit", max_bytes),
            });
            continue;
        }

        accepted.push(filename.clone());
        let mut file = IngestFile::new(filename, bytes.to_vec());
        if let Some(mime) = content_type {
            file.mime_type = Some(mime);
        }
        files.push(file);
    }

    if files.is_empty() {
        return Err(ApiError::validation("no acceptable files in upload"));
    }

    // Run the job in the background; the caller polls /jobs/{id}.
    let pipeline = state.pipeline.clone();
    let retrieval = state.retrieval.clone();
    let role = auth.role;
    let job = pipeline.prepare_job(files.len(), &auth.caller_id).await?;
    let job_id = job.id;
    tokio::spawn(async move {
        match pipeline.run_prepared(job, files, role).await {
            Ok(job) => {
                info!(job_id = %job.id, "Background ingestion finished");
                if let Err(e) = retrieval.refresh().await {
                    error!(error = %e, "Index refresh after ingestion failed");
                }
            }
            Err(e) => error!(error = %e, "Background ingestion failed"),
        }
    });

    Ok(Json(IngestResponse {
        job_id: job_id.to_string(),
        accepted,
        rejected,
    }))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let job_id = id
        .parse()
        .map_err(|_| ApiError::validation("malformed job id"))?;
    let job = state
        .store
        .job(job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {id}")))?;
    Ok(Json(serde_json::to_value(job).unwrap_or_default()))
}

// Products

#[derive(Debug, Deserialize)]
struct ProductQuery {
    brand: Option<String>,
    family: Option<String>,
    capacity_min: Option<f64>,
    capacity_max: Option<f64>,
    temp_min_c: Option<f64>,
    temp_max_c: Option<f64>,
    door_type: Option<String>,
    /// Comma-separated; every listed certification must be present.
    certifications: Option<String>,
    q: Option<String>,
    #[serde(default)]
    include_discontinued: bool,
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filter = ProductFilter {
        brand_code: query.brand,
        family_code: query.family,
        capacity_min: query.capacity_min,
        capacity_max: query.capacity_max,
        temp_min_c: query.temp_min_c,
        temp_max_c: query.temp_max_c,
        door_type: query.door_type,
        certifications_all: query
            .certifications
            .map(|c| c.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default(),
        text: query.q,
        include_discontinued: query.include_discontinued,
        ..ProductFilter::default()
    };
    let products = state.store.find_products(&filter).await?;
    Ok(Json(json!({
        "total": products.len(),
        "products": products,
    })))
}

async fn get_product(
    State(state): State<AppState>,
    Path(model): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product = state
        .store
        .product_by_model(&model)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("product {model}")))?;
    Ok(Json(product))
}

// Recommendation

async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, ApiError> {
    if request.use_case.is_none() && request.use_case_text.is_none() {
        let has_constraints = serde_json::to_value(&request.constraints)
            .map(|v| v != serde_json::to_value(coldspec_recommend::Constraints::default()).unwrap())
            .unwrap_or(false);
        if !has_constraints {
            return Err(ApiError::validation(
                "provide a use_case, use_case_text, or at least one constraint",
            ));
        }
    }
    let response = state.recommend.recommend(&request).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct CompareRequestBody {
    product_ids: Vec<String>,
    #[serde(default = "default_true")]
    highlight_differences: bool,
}

fn default_true() -> bool {
    true
}

async fn compare(
    State(state): State<AppState>,
    Json(request): Json<CompareRequestBody>,
) -> Result<Json<CompareResponse>, ApiError> {
    if request.product_ids.len() < 2 || request.product_ids.len() > 4 {
        return Err(ApiError::validation("compare takes between 2 and 4 products"));
    }
    let response = state
        .recommend
        .compare(&request.product_ids, request.highlight_differences)
        .await?;
    Ok(Json(response))
}

// Grounded question answering

#[derive(Debug, Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Debug, Serialize)]
struct AskSource {
    doc_id: String,
    page: Option<u32>,
    section: Option<String>,
    snippet: String,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<AskSource>,
    lexical_only: bool,
}

async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::validation("question must not be empty"));
    }

    let pack = state.retrieval.query(&request.question).await?;
    let products = state.retrieval.products_for_pack(&pack).await?;
    let prompt = render_prompt(&request.question, &pack, &products);

    let params = GenerationParams {
        max_tokens: state.config.generator.max_tokens,
        temperature: state.config.generator.temperature,
    };
    let answer = state
        .generator
        .generate(&prompt, &params)
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_GATEWAY, "generator_error", e.to_string()))?;

    let sources = pack
        .chunks
        .iter()
        .map(|chunk| AskSource {
            doc_id: chunk.source_doc_id.to_string(),
            page: chunk.page_number,
            section: chunk.section_title.clone(),
            snippet: chunk.content.chars().take(200).collect(),
        })
        .collect();

    Ok(Json(AskResponse {
        answer,
        sources,
        lexical_only: pack.lexical_only,
    }))
}

// Conflicts

#[derive(Debug, Deserialize)]
struct ConflictQuery {
    product: Option<String>,
}

async fn list_conflicts(
    State(state): State<AppState>,
    Query(query): Query<ConflictQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let product_id = match query.product {
        Some(model) => {
            let product = state
                .store
                .product_by_model(&model)
                .await?
                .ok_or_else(|| ApiError::not_found(format!("product {model}")))?;
            Some(product.id)
        }
        None => None,
    };
    let conflicts = state.store.pending_conflicts(product_id).await?;
    Ok(Json(json!({
        "total": conflicts.len(),
        "conflicts": conflicts,
    })))
}

#[derive(Debug, Deserialize)]
struct ResolveConflictRequest {
    resolution: ConflictResolution,
    override_value: Option<SpecValue>,
}

async fn resolve_conflict(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(request): Json<ResolveConflictRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    auth.require(UserRole::ProductManager)?;

    let conflict_id = id
        .parse()
        .map_err(|_| ApiError::validation("malformed conflict id"))?;
    let mut conflict = state
        .store
        .conflict(conflict_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("conflict {id}")))?;

    let applied =
        state
            .conflict_engine
            .resolve(&mut conflict, request.resolution, request.override_value)?;
    state.store.update_conflict(&conflict).await?;

    // A resolution that carries a value mutates the product, with the
    // usual version bump and snapshot.
    if let Some(value) = applied {
        if let Some(product) = state.store.product(conflict.product_id).await? {
            let pre = product.clone();
            let mut updated = product;
            updated.set_spec_value(&conflict.spec_name, value);
            updated.version = pre.version + 1;
            let snapshot = ProductSnapshot::of(
                &pre,
                format!("conflict {} resolved", conflict.id),
                &auth.caller_id,
            );
            state.store.update_product(updated, snapshot).await?;
        }
    }

    state
        .store
        .append_audit(AuditEntry::new(
            "spec_conflict",
            conflict.id.to_string(),
            "resolve",
            &auth.caller_id,
            auth.role,
            format!("{} -> {:?}", conflict.spec_name, conflict.resolution),
        ))
        .await?;

    Ok(Json(serde_json::to_value(conflict).unwrap_or_default()))
}

// Equivalents

async fn equivalents(
    State(state): State<AppState>,
    Path(model): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let equivalents = state.recommend.equivalents(&model).await?;
    let rows: Vec<serde_json::Value> = equivalents
        .into_iter()
        .map(|(product, similarity)| {
            json!({
                "model_number": product.model_number,
                "brand": product.brand_code,
                "family": product.family_code,
                "similarity": (similarity * 1e3).round() / 1e3,
            })
        })
        .collect();
    Ok(Json(json!({ "model": model, "equivalents": rows })))
}

// System

async fn stats(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.store.stats().await?;
    Ok(Json(serde_json::to_value(stats).unwrap_or_default()))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.store.stats().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "components": { "store": "ok" },
                "products": stats.products,
                "version": env!("CARGO_PKG_VERSION"),
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "components": { "store": e.to_string() },
            })),
        ),
    }
}
