//! Ingestion pipeline orchestration.
//!
//! Coordinates the build-time flow for each document: section
//! extraction → chunking → embedding → index insertion. Batches give
//! per-document isolation — one unreadable PDF is recorded in its slot
//! of the [`IngestReport`] and the batch moves on — and the index is
//! persisted after every successfully ingested document, so each
//! on-disk snapshot sits at a document boundary.
//!
//! Cancellation is checked between documents, never mid-parse.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::embedding::EmbeddingProvider;
use crate::extract::extract_sections;
use crate::index::VectorIndex;
use crate::models::{ChunkRecord, DocumentOutcome, IngestReport};

/// Ingest a single document into the index.
///
/// Returns the number of chunks indexed. Any failure — parse, embed, or
/// insert — aborts this document before it touches the index, except
/// that an embedding batch is only requested once all sections have
/// chunked cleanly. Zero is returned for a document that parsed but
/// contained no chunkable text.
pub async fn ingest_document(
    index: &VectorIndex,
    provider: &dyn EmbeddingProvider,
    chunking: &ChunkingConfig,
    bytes: &[u8],
    doc_name: &str,
) -> Result<usize> {
    index.check_compatible(provider.model_name(), provider.dims())?;

    let document = extract_sections(bytes, doc_name)?;

    let mut records: Vec<ChunkRecord> = Vec::new();
    for section in &document.sections {
        for chunk in chunk_text(&section.body, chunking) {
            records.push(ChunkRecord {
                doc_name: document.doc_name.clone(),
                section_title: section.title.clone(),
                page: section.page,
                text: chunk.text,
                char_offset: chunk.char_offset,
                token_count: chunk.token_count,
                hash: chunk.hash,
            });
        }
    }

    if records.is_empty() {
        warn!(%doc_name, "no chunkable text extracted; nothing indexed");
        return Ok(0);
    }

    let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
    let vectors = provider
        .embed(&texts)
        .await
        .with_context(|| format!("embedding chunks of '{}' failed", doc_name))?;

    for (record, vector) in records.into_iter().zip(vectors.iter()) {
        index.insert(record, vector)?;
    }

    info!(%doc_name, sections = document.sections.len(), "document indexed");
    Ok(texts.len())
}

/// Ingest a batch of documents with per-document isolation.
///
/// Each entry is `(doc_name, pdf bytes)`. A document that fails is
/// reported in its [`DocumentOutcome`] and does not affect the rest of
/// the batch. After each successful document the index is persisted to
/// `index_dir`. A cancelled token stops the batch at the next document
/// boundary; already-ingested documents stay indexed.
pub async fn ingest_batch(
    index: &VectorIndex,
    provider: &dyn EmbeddingProvider,
    chunking: &ChunkingConfig,
    index_dir: &Path,
    documents: Vec<(String, Vec<u8>)>,
    cancel: &CancelToken,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();

    for (doc_name, bytes) in documents {
        if cancel.is_cancelled() {
            info!("ingestion cancelled; stopping at document boundary");
            break;
        }

        match ingest_document(index, provider, chunking, &bytes, &doc_name).await {
            Ok(chunks_indexed) => {
                if chunks_indexed > 0 {
                    index
                        .persist(index_dir)
                        .with_context(|| format!("persisting index after '{}'", doc_name))?;
                }
                report.documents.push(DocumentOutcome {
                    doc_name,
                    chunks_indexed,
                    error: None,
                });
            }
            Err(e) => {
                warn!(doc_name = %doc_name, error = %e, "document rejected");
                report.documents.push(DocumentOutcome {
                    doc_name,
                    chunks_indexed: 0,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbedError;
    use async_trait::async_trait;

    /// Provider that must never be reached (documents fail before
    /// embedding).
    struct NeverProvider;

    #[async_trait]
    impl EmbeddingProvider for NeverProvider {
        fn model_name(&self) -> &str {
            "never"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Err(EmbedError::Unavailable("stub provider reached".into()))
        }
    }

    fn chunking() -> ChunkingConfig {
        ChunkingConfig {
            window_sentences: 5,
            overlap_sentences: 1,
            min_words: 5,
        }
    }

    #[tokio::test]
    async fn bad_document_is_isolated_within_batch() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::new("never", 2);
        let docs = vec![
            ("first.pdf".to_string(), b"not a pdf".to_vec()),
            ("second.pdf".to_string(), b"also not a pdf".to_vec()),
        ];

        let report = ingest_batch(
            &index,
            &NeverProvider,
            &chunking(),
            dir.path(),
            docs,
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.total_chunks(), 0);
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn cancelled_batch_stops_before_first_document() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::new("never", 2);
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = ingest_batch(
            &index,
            &NeverProvider,
            &chunking(),
            dir.path(),
            vec![("doc.pdf".to_string(), b"junk".to_vec())],
            &cancel,
        )
        .await
        .unwrap();

        assert!(report.documents.is_empty());
    }

    #[tokio::test]
    async fn mismatched_provider_fails_before_parsing() {
        let index = VectorIndex::new("other-model", 2);
        let err = ingest_document(&index, &NeverProvider, &chunking(), b"junk", "doc.pdf")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model mismatch"));
    }
}
