//! End-to-end pipeline tests: hand-built PDF fixtures are ingested with
//! a deterministic stub embedder, then queried through the retrieval
//! service. Covers the two-section scenario, per-section dedup,
//! re-ingestion determinism, persist/load round-trips, and per-document
//! failure isolation.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use synapse::cancel::CancelToken;
use synapse::config::{ChunkingConfig, RetrievalConfig};
use synapse::embedding::{EmbedError, EmbeddingProvider};
use synapse::index::VectorIndex;
use synapse::ingest::ingest_batch;
use synapse::retrieve::retrieve;

const DIMS: usize = 8;

/// Deterministic embedder: a text's vector is derived from its SHA-256,
/// so identical text always embeds identically and the exact query text
/// of an indexed chunk is its own nearest neighbor.
struct HashProvider;

fn hash_vector(text: &str) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());
    digest[..DIMS]
        .iter()
        .map(|b| *b as f32 / 255.0 + 0.01)
        .collect()
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        "hash-stub"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| hash_vector(t)).collect())
    }
}

fn chunking() -> ChunkingConfig {
    ChunkingConfig {
        window_sentences: 5,
        overlap_sentences: 1,
        min_words: 5,
    }
}

fn retrieval() -> RetrievalConfig {
    RetrievalConfig {
        top_n: 5,
        overfetch_factor: 3,
        snippet_max_chars: 360,
    }
}

// ============ PDF fixture builder ============

/// Build a minimal valid PDF: one page object per entry in `pages`,
/// each page showing its lines as separate text runs. Body and xref
/// offsets are assembled by hand so `pdf-extract` can parse the result.
fn build_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let font_obj = 3;
    let first_page_obj = 4;

    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", first_page_obj + 2 * i))
        .collect();

    let mut objects: Vec<(usize, Vec<u8>)> = Vec::new();
    objects.push((1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()));
    objects.push((
        2,
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        )
        .into_bytes(),
    ));
    objects.push((
        font_obj,
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_vec(),
    ));

    for (i, lines) in pages.iter().enumerate() {
        let page_obj = first_page_obj + 2 * i;
        let content_obj = page_obj + 1;

        let mut stream = String::from("BT /F1 12 Tf 72 720 Td\n");
        for (j, line) in lines.iter().enumerate() {
            if j > 0 {
                stream.push_str("0 -24 Td\n");
            }
            stream.push_str(&format!("({}) Tj\n", line));
        }
        stream.push_str("ET\n");

        objects.push((
            page_obj,
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R \
                 /Resources << /Font << /F1 {} 0 R >> >> >>",
                content_obj, font_obj
            )
            .into_bytes(),
        ));

        let mut content = format!("<< /Length {} >> stream\n", stream.len()).into_bytes();
        content.extend_from_slice(stream.as_bytes());
        content.extend_from_slice(b"endstream");
        objects.push((content_obj, content));
    }

    objects.sort_by_key(|(num, _)| *num);

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = vec![0usize; objects.len() + 1];
    for (num, body) in &objects {
        offsets[*num] = out.len();
        out.extend_from_slice(format!("{} 0 obj ", num).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b" endobj\n");
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets[1..] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

/// Three-page document: "Intro" starts on page 1 and continues onto
/// page 2; "Methods" starts on page 3.
fn two_section_pdf() -> Vec<u8> {
    build_pdf(&[
        &[
            "Intro",
            "The introduction explains the motivation for this work in plain language.",
            "It also sketches the structure of the remaining document for readers.",
        ],
        &["The introduction continues here with additional framing sentences for context."],
        &[
            "Methods",
            "The methods section describes the measurement procedure in careful detail.",
        ],
    ])
}

async fn ingest_fixture(
    index: &VectorIndex,
    dir: &std::path::Path,
    docs: Vec<(String, Vec<u8>)>,
) -> synapse::models::IngestReport {
    ingest_batch(
        index,
        &HashProvider,
        &chunking(),
        dir,
        docs,
        &CancelToken::new(),
    )
    .await
    .unwrap()
}

// ============ Scenarios ============

#[tokio::test]
async fn two_section_document_query_hits_methods_first() {
    let dir = tempfile::tempdir().unwrap();
    let index = VectorIndex::new("hash-stub", DIMS);

    let report = ingest_fixture(
        &index,
        dir.path(),
        vec![("paper.pdf".to_string(), two_section_pdf())],
    )
    .await;
    assert_eq!(report.failed(), 0);
    assert!(report.total_chunks() >= 2, "expected chunks from both sections");

    // The Methods section body is a single sentence, so its chunk text
    // is exactly that sentence and the identical query embeds onto it.
    let query = "The methods section describes the measurement procedure in careful detail.";
    let results = retrieve(&index, &HashProvider, &retrieval(), query, 3, &CancelToken::new())
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].section_title, "Methods");
    assert_eq!(results[0].page, 3);
    assert_eq!(results[0].doc_name, "paper.pdf");
    assert!(results[0].snippet.contains("measurement procedure"));
}

#[tokio::test]
async fn intro_section_spans_pages_and_starts_on_page_one() {
    let dir = tempfile::tempdir().unwrap();
    let index = VectorIndex::new("hash-stub", DIMS);
    ingest_fixture(
        &index,
        dir.path(),
        vec![("paper.pdf".to_string(), two_section_pdf())],
    )
    .await;

    let query = "The introduction explains the motivation for this work in plain language.";
    let results = retrieve(&index, &HashProvider, &retrieval(), query, 3, &CancelToken::new())
        .await
        .unwrap();

    let intro = results.iter().find(|r| r.section_title == "Intro").unwrap();
    assert_eq!(intro.page, 1);
    assert!(intro.snippet.contains("motivation"));
}

#[tokio::test]
async fn querying_empty_library_returns_empty() {
    let index = VectorIndex::new("hash-stub", DIMS);
    let results = retrieve(
        &index,
        &HashProvider,
        &retrieval(),
        "anything at all here",
        5,
        &CancelToken::new(),
    )
    .await
    .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn one_result_per_section_after_dedup() {
    let dir = tempfile::tempdir().unwrap();
    let index = VectorIndex::new("hash-stub", DIMS);

    // A single long section chunked into several overlapping windows.
    let lines: Vec<String> = (0..12)
        .map(|i| format!("Sentence number {} talks about the very same topic again.", i))
        .collect();
    let mut page: Vec<&str> = vec!["Discussion"];
    page.extend(lines.iter().map(|s| s.as_str()));
    let pdf = build_pdf(&[&page]);

    let report = ingest_fixture(&index, dir.path(), vec![("long.pdf".to_string(), pdf)]).await;
    assert!(
        report.total_chunks() > 1,
        "fixture should produce multiple chunks of one section"
    );

    let results = retrieve(
        &index,
        &HashProvider,
        &retrieval(),
        "tell me about the topic",
        3,
        &CancelToken::new(),
    )
    .await
    .unwrap();

    let discussion: Vec<_> = results
        .iter()
        .filter(|r| r.section_title == "Discussion")
        .collect();
    assert_eq!(discussion.len(), 1, "all chunks map to one section entry");
}

#[tokio::test]
async fn reingesting_is_deterministic() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let index_a = VectorIndex::new("hash-stub", DIMS);
    let index_b = VectorIndex::new("hash-stub", DIMS);

    ingest_fixture(
        &index_a,
        dir_a.path(),
        vec![("paper.pdf".to_string(), two_section_pdf())],
    )
    .await;
    ingest_fixture(
        &index_b,
        dir_b.path(),
        vec![("paper.pdf".to_string(), two_section_pdf())],
    )
    .await;

    assert_eq!(index_a.len(), index_b.len());

    let probe = hash_vector("a fixed probe");
    let hits_a = index_a.search(&probe, 10).unwrap();
    let hits_b = index_b.search(&probe, 10).unwrap();
    assert_eq!(hits_a.len(), hits_b.len());
    for (a, b) in hits_a.iter().zip(hits_b.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.record.hash, b.record.hash);
        assert_eq!(a.record.char_offset, b.record.char_offset);
        assert!((a.distance - b.distance).abs() < 1e-6);
    }
}

#[tokio::test]
async fn persisted_index_round_trips_through_load() {
    let dir = tempfile::tempdir().unwrap();
    let index = VectorIndex::new("hash-stub", DIMS);
    ingest_fixture(
        &index,
        dir.path(),
        vec![("paper.pdf".to_string(), two_section_pdf())],
    )
    .await;

    let restored = VectorIndex::load(dir.path()).unwrap();
    assert_eq!(restored.len(), index.len());

    let query = "The methods section describes the measurement procedure in careful detail.";
    let before = retrieve(&index, &HashProvider, &retrieval(), query, 5, &CancelToken::new())
        .await
        .unwrap();
    let after = retrieve(&restored, &HashProvider, &retrieval(), query, 5, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(before.len(), after.len());
    for (x, y) in before.iter().zip(after.iter()) {
        assert_eq!(x.doc_name, y.doc_name);
        assert_eq!(x.section_title, y.section_title);
        assert_eq!(x.page, y.page);
        assert_eq!(x.snippet, y.snippet);
    }
}

#[tokio::test]
async fn bad_pdf_does_not_fail_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let index = VectorIndex::new("hash-stub", DIMS);

    let report = ingest_fixture(
        &index,
        dir.path(),
        vec![
            ("good.pdf".to_string(), two_section_pdf()),
            ("broken.pdf".to_string(), b"this is not a pdf".to_vec()),
        ],
    )
    .await;

    assert_eq!(report.documents.len(), 2);
    assert_eq!(report.failed(), 1);
    let good = &report.documents[0];
    assert_eq!(good.doc_name, "good.pdf");
    assert!(good.chunks_indexed > 0);
    let broken = &report.documents[1];
    assert!(broken.error.is_some());
    assert_eq!(broken.chunks_indexed, 0);

    // The good document remains queryable.
    let results = retrieve(
        &index,
        &HashProvider,
        &retrieval(),
        "The methods section describes the measurement procedure in careful detail.",
        3,
        &CancelToken::new(),
    )
    .await
    .unwrap();
    assert!(results.iter().all(|r| r.doc_name == "good.pdf"));
    assert!(!results.is_empty());
}

#[tokio::test]
async fn textless_pdf_is_rejected_not_indexed() {
    let dir = tempfile::tempdir().unwrap();
    let index = VectorIndex::new("hash-stub", DIMS);

    let report = ingest_fixture(
        &index,
        dir.path(),
        vec![("scan.pdf".to_string(), build_pdf(&[&[]]))],
    )
    .await;

    assert_eq!(report.failed(), 1);
    assert!(report.documents[0]
        .error
        .as_deref()
        .unwrap()
        .contains("no extractable text"));
    assert!(index.is_empty());
}

#[tokio::test]
async fn cancellation_stops_between_documents() {
    let dir = tempfile::tempdir().unwrap();
    let index = VectorIndex::new("hash-stub", DIMS);
    let cancel = CancelToken::new();
    cancel.cancel();

    let report = ingest_batch(
        &index,
        &HashProvider,
        &chunking(),
        dir.path(),
        vec![("paper.pdf".to_string(), two_section_pdf())],
        &cancel,
    )
    .await
    .unwrap();

    assert!(report.documents.is_empty());
    assert!(index.is_empty());
}

#[tokio::test]
async fn chunk_counts_group_by_document() {
    let dir = tempfile::tempdir().unwrap();
    let index = VectorIndex::new("hash-stub", DIMS);
    ingest_fixture(
        &index,
        dir.path(),
        vec![
            ("a.pdf".to_string(), two_section_pdf()),
            ("b.pdf".to_string(), two_section_pdf()),
        ],
    )
    .await;

    let counts: HashMap<String, usize> = index.document_counts().into_iter().collect();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts["a.pdf"], counts["b.pdf"]);
    assert_eq!(counts.values().sum::<usize>(), index.len());
}
