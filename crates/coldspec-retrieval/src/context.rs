//! Token-budgeted context assembly and grounded prompt rendering.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use coldspec_core::{DocumentChunk, DocumentId, Product, ProductId};

use crate::query::{ParsedQuery, QueryIntent};

/// Structured filters derived from the parsed query, echoed back to the
/// caller for transparency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppliedFilters {
    pub model_numbers: Vec<String>,
    pub brands: Vec<String>,
    pub certifications: Vec<String>,
    pub families: Vec<String>,
}

/// One chunk included in the context pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextChunk {
    pub content: String,
    pub source_doc_id: DocumentId,
    pub product_ids: Vec<ProductId>,
    pub page_number: Option<u32>,
    pub section_title: Option<String>,
    pub score: f64,
}

/// The assembled retrieval context handed to the caller (and from there
/// to the external generator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPack {
    pub intent: QueryIntent,
    pub filters: AppliedFilters,
    pub chunks: Vec<ContextChunk>,
    pub used_products: Vec<ProductId>,
    pub total_tokens: usize,
    /// True when the embedding provider was unavailable and only the
    /// lexical ranking contributed.
    pub lexical_only: bool,
}

/// Greedy budgeted selection over the fused ranking.
///
/// Chunks are taken in fused order until the token budget is reached;
/// afterwards every product referenced by the ranking keeps at least its
/// single best chunk, even past the budget. Near-duplicate content is
/// dropped.
pub fn select_within_budget(
    ranked: &[(DocumentChunk, f64)],
    budget_tokens: usize,
) -> Vec<(DocumentChunk, f64)> {
    let mut selected: Vec<(DocumentChunk, f64)> = Vec::new();
    let mut seen_signatures: HashSet<String> = HashSet::new();
    let mut used_tokens = 0usize;

    for (chunk, score) in ranked {
        let signature = content_signature(&chunk.content);
        if seen_signatures.contains(&signature) {
            continue;
        }
        let tokens = chunk.token_count as usize;
        if used_tokens + tokens > budget_tokens && !selected.is_empty() {
            continue;
        }
        seen_signatures.insert(signature);
        used_tokens += tokens;
        selected.push((chunk.clone(), *score));
    }

    // Guarantee one chunk per distinct referenced product.
    let covered: HashSet<ProductId> = selected
        .iter()
        .flat_map(|(c, _)| c.product_ids.iter().copied())
        .collect();
    let mut missing: Vec<ProductId> = Vec::new();
    for (chunk, _) in ranked {
        for product_id in &chunk.product_ids {
            if !covered.contains(product_id) && !missing.contains(product_id) {
                missing.push(*product_id);
            }
        }
    }
    for product_id in missing {
        if let Some((chunk, score)) = ranked
            .iter()
            .find(|(c, _)| c.product_ids.contains(&product_id))
        {
            let signature = content_signature(&chunk.content);
            if seen_signatures.insert(signature) {
                selected.push((chunk.clone(), *score));
            }
        }
    }

    selected
}

pub fn into_pack(
    parsed: &ParsedQuery,
    filters: AppliedFilters,
    selected: Vec<(DocumentChunk, f64)>,
    lexical_only: bool,
) -> ContextPack {
    let mut used_products: Vec<ProductId> = Vec::new();
    let mut total_tokens = 0usize;
    let chunks: Vec<ContextChunk> = selected
        .into_iter()
        .map(|(chunk, score)| {
            total_tokens += chunk.token_count as usize;
            for product_id in &chunk.product_ids {
                if !used_products.contains(product_id) {
                    used_products.push(*product_id);
                }
            }
            ContextChunk {
                content: chunk.content,
                source_doc_id: chunk.document_id,
                product_ids: chunk.product_ids,
                page_number: chunk.page_number,
                section_title: chunk.section_title,
                score,
            }
        })
        .collect();

    ContextPack {
        intent: parsed.intent,
        filters,
        chunks,
        used_products,
        total_tokens,
        lexical_only,
    }
}

fn content_signature(text: &str) -> String {
    let normalized: String = text
        .chars()
        .take(200)
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect();
    normalized.chars().take(100).collect()
}

/// Structured spec summary for the products the context references.
pub fn format_product_summaries(products: &[Product]) -> String {
    let mut lines = Vec::new();
    for product in products {
        lines.push(format!("### {}", product.model_number));
        if let Some(line) = &product.product_line {
            lines.push(format!("Product line: {line}"));
        }
        if let Some(capacity) = product.storage_capacity_cuft {
            lines.push(format!("Capacity: {capacity} cu.ft."));
        }
        if let (Some(min), Some(max)) = (product.temp_range_min_c, product.temp_range_max_c) {
            lines.push(format!("Temperature range: {min}\u{b0}C to {max}\u{b0}C"));
        }
        if let Some(door_type) = &product.door_type {
            let count = product.door_count.unwrap_or(1);
            lines.push(format!("Door: {count}x {door_type}"));
        }
        if let Some(refrigerant) = &product.refrigerant {
            lines.push(format!("Refrigerant: {refrigerant}"));
        }
        if let (Some(v), Some(a)) = (product.voltage_v, product.amperage) {
            lines.push(format!("Electrical: {v}V, {a}A"));
        }
        if !product.certifications.is_empty() {
            lines.push(format!("Certifications: {}", product.certifications.join(", ")));
        }
        for (name, value) in &product.specs {
            lines.push(format!("{}: {}", name.replace('_', " "), value));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Render the grounded prompt for the external generator. The retrieval
/// engine produces the pack; the HTTP adapter calls the generator.
pub fn render_prompt(question: &str, pack: &ContextPack, products: &[Product]) -> String {
    let mut sections = Vec::new();

    sections.push(
        "You are a product expert for laboratory cold-storage equipment. \
Answer only from the provided product data and source passages. \
If the context does not contain the answer, say so; never guess \
specifications."
            .to_string(),
    );

    if !products.is_empty() {
        sections.push(format!(
            "<product_data>\n{}</product_data>",
            format_product_summaries(products)
        ));
    }

    if !pack.chunks.is_empty() {
        let mut passages = Vec::new();
        for (i, chunk) in pack.chunks.iter().enumerate() {
            let mut header = format!("[Source {}]", i + 1);
            if let Some(section) = &chunk.section_title {
                header.push_str(&format!(" Section: {section}"));
            }
            if let Some(page) = chunk.page_number {
                header.push_str(&format!(" Page: {page}"));
            }
            passages.push(format!("{header}\n{}", chunk.content));
        }
        sections.push(format!(
            "<source_documents>\n{}\n</source_documents>",
            passages.join("\n\n---\n\n")
        ));
    }

    sections.push(format!(
        "<question>\n{question}\n</question>\n\nCite the source numbers you used."
    ));

    sections.join("\n\n")
}
