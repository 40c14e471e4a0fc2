//! End-to-end ingestion scenarios against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use coldspec_catalog::memory::MemoryCatalogStore;
use coldspec_catalog::registry::SpecRegistry;
use coldspec_catalog::seed;
use coldspec_catalog::store::CatalogStore;
use coldspec_core::{ConflictSeverity, DocStatus, SpecValue, UserRole};
use coldspec_ingestion::pipeline::{IngestFile, IngestionPipeline, PipelineConfig};
use coldspec_providers::{
    FailingEmbeddingProvider, HashEmbeddingProvider, RetryConfig, RetryPolicy,
    TextPassthroughPdfProvider,
};

const DIM: usize = 32;

const DATA_SHEET: &str = "Product Data Sheet\n\
ABT-HC-26S Premier Laboratory Refrigerator\n\
\n\
General Description\n\
American BioTech Supply Premier 26 cu. ft. laboratory refrigerator with solid door,\n\
designed for general laboratory storage.\n\
\n\
Storage capacity (cu. ft)    26\n\
Adjustable Temperature Range    1\u{b0}C to 10\u{b0}C\n\
Door    One swing solid door, self-closing, right hinged\n\
Shelves    Four adjustable shelves (adjustable in \u{bd}\" increments)\n\
Refrigerant    Hydrocarbon, natural refrigerant (R290)\n\
Compressor    Hermetic\n\
Rated Amperage    3\n\
Controller technology    Microprocessor\n\
\n\
Dimensions\n\
Exterior    28 3/8    36 3/4    81 3/4\n\
Interior    23 3/4    28    52 1/4\n\
\n\
Product Weight (lbs)    235\n\
Shipping Weight (lbs)    275\n\
\n\
Agency Listing and Certification    ETL, C-ETL listed and certified to UL471 standard, Energy Star Certified\n\
\n\
General Warranty    Two (2) year parts and labor\n\
Compressor Warranty    Five (5) year compressor parts\n\
\n\
Rev_01.10.25\n";

struct Harness {
    store: Arc<dyn CatalogStore>,
    pipeline: Arc<IngestionPipeline>,
}

async fn harness(embedder: Arc<dyn coldspec_core::EmbeddingProvider>) -> Harness {
    let store: Arc<dyn CatalogStore> = Arc::new(MemoryCatalogStore::new(DIM));
    seed::seed_store(&store).await.unwrap();

    let registry = Arc::new(SpecRegistry::new(store.clone()));
    registry.refresh().await.unwrap();

    let pipeline = IngestionPipeline::new(
        store.clone(),
        registry,
        embedder,
        Arc::new(TextPassthroughPdfProvider),
        PipelineConfig {
            workers: 2,
            ..PipelineConfig::default()
        },
    )
    .with_retry_policy(RetryPolicy::new(
        RetryConfig::new(2).with_initial_delay(Duration::from_millis(1)),
    ));

    Harness {
        store,
        pipeline: Arc::new(pipeline),
    }
}

fn sheet_file(name: &str, text: &str) -> IngestFile {
    IngestFile::new(name, text.as_bytes().to_vec()).with_mime("text/plain")
}

#[tokio::test]
async fn test_first_ingest_builds_the_product() {
    let h = harness(Arc::new(HashEmbeddingProvider::new(DIM))).await;

    let job = h
        .pipeline
        .run_job(
            vec![sheet_file("ABS_Premier_26S_PDS.txt", DATA_SHEET)],
            "tester",
            UserRole::Admin,
        )
        .await
        .unwrap();

    assert_eq!(job.counters.processed_files, 1);
    assert_eq!(job.counters.new_products, 1);
    assert_eq!(job.counters.failed_files, 0);
    assert!(job.counters.chunks_created > 0);

    let product = h
        .store
        .product_by_model("ABT-HC-26S")
        .await
        .unwrap()
        .expect("product created");
    assert_eq!(product.storage_capacity_cuft, Some(26.0));
    assert_eq!(product.temp_range_min_c, Some(1.0));
    assert_eq!(product.temp_range_max_c, Some(10.0));
    assert_eq!(product.door_type.as_deref(), Some("solid"));
    assert_eq!(product.door_count, Some(1));
    assert_eq!(product.shelf_count, Some(4));
    assert_eq!(product.refrigerant.as_deref(), Some("R290"));
    assert_eq!(product.amperage, Some(3.0));
    assert_eq!(product.ext_width_in, Some(28.375));
    assert_eq!(product.ext_height_in, Some(81.75));
    assert_eq!(product.product_weight_lbs, Some(235.0));
    assert_eq!(product.revision.as_deref(), Some("Rev_01.10.25"));
    assert_eq!(product.version, 1);
    assert!(product.certifications.contains(&"ETL".to_string()));
    assert!(product.certifications.contains(&"Energy_Star".to_string()));
    assert_eq!(
        product.spec_value("warranty_general_years").and_then(|v| v.as_f64()),
        Some(2.0)
    );

    // Chunks carry embeddings and reference the product.
    let chunks = h.store.all_chunks().await.unwrap();
    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|c| c.embedding.is_some()));
    assert!(chunks.iter().all(|c| c.product_ids.contains(&product.id)));
}

#[tokio::test]
async fn test_second_ingest_of_same_bytes_is_noop() {
    let h = harness(Arc::new(HashEmbeddingProvider::new(DIM))).await;
    let file = sheet_file("ABS_Premier_26S_PDS.txt", DATA_SHEET);

    let first = h
        .pipeline
        .run_job(vec![file.clone()], "tester", UserRole::Admin)
        .await
        .unwrap();
    assert_eq!(first.counters.new_products, 1);
    assert_eq!(first.counters.skipped_duplicates, 0);

    let stats_before = h.store.stats().await.unwrap();

    let second = h
        .pipeline
        .run_job(vec![file], "tester", UserRole::Admin)
        .await
        .unwrap();
    assert_eq!(second.counters.new_products, 0);
    assert_eq!(second.counters.skipped_duplicates, 1);

    // No new rows anywhere.
    let stats_after = h.store.stats().await.unwrap();
    assert_eq!(stats_before.documents, stats_after.documents);
    assert_eq!(stats_before.products, stats_after.products);
    assert_eq!(stats_before.chunks, stats_after.chunks);

    let product = h.store.product_by_model("ABT-HC-26S").await.unwrap().unwrap();
    assert_eq!(product.version, 1);
}

#[tokio::test]
async fn test_newer_revision_overwrites_without_conflict() {
    let h = harness(Arc::new(HashEmbeddingProvider::new(DIM))).await;

    h.pipeline
        .run_job(
            vec![sheet_file("ABS_Premier_26S_PDS.txt", DATA_SHEET)],
            "tester",
            UserRole::Admin,
        )
        .await
        .unwrap();

    let updated_sheet = DATA_SHEET
        .replace("Storage capacity (cu. ft)    26", "Storage capacity (cu. ft)    25.8")
        .replace("Rev_01.10.25", "Rev_03.18.25");
    h.pipeline
        .run_job(
            vec![sheet_file("ABS_Premier_26S_PDS_v2.txt", &updated_sheet)],
            "tester",
            UserRole::Admin,
        )
        .await
        .unwrap();

    let product = h.store.product_by_model("ABT-HC-26S").await.unwrap().unwrap();
    assert_eq!(product.storage_capacity_cuft, Some(25.8));
    assert_eq!(product.version, 2);
    assert_eq!(product.revision.as_deref(), Some("Rev_03.18.25"));

    // The pre-image is snapshotted at its original version.
    let snapshots = h.store.snapshots(product.id).await.unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].version, 1);
    assert_eq!(snapshots[0].record.storage_capacity_cuft, Some(26.0));

    // No conflict row; the overwrite is audited instead.
    let conflicts = h.store.pending_conflicts(None).await.unwrap();
    assert!(conflicts.is_empty());
    let audit = h.store.audit_entries().await.unwrap();
    assert!(audit.iter().any(|e| e.action == "spec_overwrite"));
}

#[tokio::test]
async fn test_tied_revision_flags_conflict_and_keeps_value() {
    let h = harness(Arc::new(HashEmbeddingProvider::new(DIM))).await;

    h.pipeline
        .run_job(
            vec![sheet_file("ABS_Premier_26S_PDS.txt", DATA_SHEET)],
            "tester",
            UserRole::Admin,
        )
        .await
        .unwrap();

    // Same revision, different capacity claim.
    let disputed = DATA_SHEET
        .replace("Storage capacity (cu. ft)    26", "Storage capacity (cu. ft)    25.8");
    let job = h
        .pipeline
        .run_job(
            vec![sheet_file("ABS_Premier_26S_reprint.txt", &disputed)],
            "tester",
            UserRole::Admin,
        )
        .await
        .unwrap();
    assert_eq!(job.counters.conflicts_found, 1);

    let product = h.store.product_by_model("ABT-HC-26S").await.unwrap().unwrap();
    assert_eq!(product.storage_capacity_cuft, Some(26.0));
    assert_eq!(product.version, 1);

    let conflicts = h.store.pending_conflicts(Some(product.id)).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    let conflict = &conflicts[0];
    assert_eq!(conflict.spec_name, "storage_capacity_cuft");
    assert_eq!(conflict.severity, ConflictSeverity::Medium);
    assert_eq!(
        conflict.existing_value.as_ref().and_then(|v| v.as_f64()),
        Some(26.0)
    );
    assert_eq!(conflict.new_value.as_ref().and_then(|v| v.as_f64()), Some(25.8));
}

#[tokio::test]
async fn test_embedding_outage_degrades_but_ingests() {
    let h = harness(Arc::new(FailingEmbeddingProvider::always_transient(DIM))).await;

    let job = h
        .pipeline
        .run_job(
            vec![sheet_file("ABS_Premier_26S_PDS.txt", DATA_SHEET)],
            "tester",
            UserRole::Admin,
        )
        .await
        .unwrap();

    // The product and chunks exist; vectors are simply absent.
    assert_eq!(job.counters.new_products, 1);
    assert!(h.store.product_by_model("ABT-HC-26S").await.unwrap().is_some());

    let chunks = h.store.all_chunks().await.unwrap();
    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|c| c.embedding.is_none()));

    let stats = h.store.stats().await.unwrap();
    assert_eq!(stats.chunks_embedded, 0);
}

#[tokio::test]
async fn test_every_spec_key_resolves_in_registry() {
    let h = harness(Arc::new(HashEmbeddingProvider::new(DIM))).await;
    h.pipeline
        .run_job(
            vec![sheet_file("ABS_Premier_26S_PDS.txt", DATA_SHEET)],
            "tester",
            UserRole::Admin,
        )
        .await
        .unwrap();

    let registry_names: Vec<String> = h
        .store
        .registry_entries()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.canonical_name)
        .collect();

    let product = h.store.product_by_model("ABT-HC-26S").await.unwrap().unwrap();
    for key in product.specs.keys() {
        assert!(
            registry_names.contains(key),
            "spec key {key} missing from registry"
        );
    }
}

#[tokio::test]
async fn test_unsupported_format_marks_document_failed() {
    let h = harness(Arc::new(HashEmbeddingProvider::new(DIM))).await;

    let file = IngestFile::new("photo.png", vec![0x89, 0x50, 0x4e, 0x47])
        .with_mime("image/png");
    let job = h
        .pipeline
        .run_job(vec![file], "tester", UserRole::Admin)
        .await
        .unwrap();

    assert_eq!(job.counters.failed_files, 1);
    assert_eq!(job.counters.processed_files, 0);

    let stats = h.store.stats().await.unwrap();
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.products, 0);
}

#[tokio::test]
async fn test_documents_marked_processed_with_log() {
    let h = harness(Arc::new(HashEmbeddingProvider::new(DIM))).await;
    h.pipeline
        .run_job(
            vec![sheet_file("ABS_Premier_26S_PDS.txt", DATA_SHEET)],
            "tester",
            UserRole::Admin,
        )
        .await
        .unwrap();

    let product = h.store.product_by_model("ABT-HC-26S").await.unwrap().unwrap();
    let links = h.store.links_for_product(product.id).await.unwrap();
    assert_eq!(links.len(), 1);

    let doc = h.store.document(links[0].document_id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocStatus::Processed);
    let stages: Vec<&str> = doc.processing_log.iter().map(|e| e.stage.as_str()).collect();
    assert!(stages.contains(&"extraction"));
    assert!(stages.contains(&"classification"));
    assert!(stages.contains(&"model_resolution"));
    assert!(stages.contains(&"chunking"));
    assert!(stages.contains(&"complete"));

    // The provenance edge carries the asserted specs.
    assert_eq!(
        links[0]
            .extracted_specs
            .get("storage_capacity_cuft")
            .and_then(SpecValue::as_f64),
        Some(26.0)
    );
}
