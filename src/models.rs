//! Core data types used throughout Synapse.
//!
//! These types represent the documents, sections, and chunks that flow
//! through the ingestion pipeline, the metadata stored alongside each
//! indexed vector, and the wire shapes returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A parsed document: ordered sections under detected headings.
///
/// Immutable once produced by the section extractor; a document is
/// replaced only by re-ingestion.
#[derive(Debug, Clone)]
pub struct Document {
    /// Caller-supplied identifier, typically the uploaded file name.
    pub doc_name: String,
    /// First detected heading, or the document name without extension.
    pub title: String,
    pub sections: Vec<Section>,
    pub ingested_at: DateTime<Utc>,
}

/// One section of a document: a heading and the body text beneath it.
#[derive(Debug, Clone)]
pub struct Section {
    pub title: String,
    /// 1-based page on which the section starts.
    pub page: usize,
    pub body: String,
}

/// A bounded window of section text, the unit stored in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// Byte offset of the window's first sentence within the section body.
    pub char_offset: usize,
    /// Whitespace-delimited token count of `text`.
    pub token_count: usize,
    /// SHA-256 of `text`, hex-encoded. Stable across re-ingestion.
    pub hash: String,
}

/// Metadata stored in the index next to each vector, denormalized so a
/// search hit can be rendered without consulting any other table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub doc_name: String,
    pub section_title: String,
    pub page: usize,
    pub text: String,
    pub char_offset: usize,
    pub token_count: usize,
    pub hash: String,
}

/// A related-passage result, the on-the-wire shape of the query API.
#[derive(Debug, Clone, Serialize)]
pub struct RelatedSection {
    pub doc_name: String,
    pub section_title: String,
    pub page: usize,
    pub snippet: String,
}

/// Outcome of ingesting a single document within a batch.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub doc_name: String,
    /// Number of chunks added to the index. Zero when the document
    /// parsed but contained no chunkable text, or when it failed.
    pub chunks_indexed: usize,
    /// Failure reason; `None` for a successfully ingested document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-document results of a batch ingestion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub documents: Vec<DocumentOutcome>,
}

impl IngestReport {
    pub fn total_chunks(&self) -> usize {
        self.documents.iter().map(|d| d.chunks_indexed).sum()
    }

    pub fn failed(&self) -> usize {
        self.documents.iter().filter(|d| d.error.is_some()).count()
    }
}
