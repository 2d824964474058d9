//! Flat in-process vector index with nearest-neighbor search.
//!
//! Stores one fixed-dimension vector plus one [`ChunkRecord`] per dense
//! integer id. Ids are assigned at insertion, are stable for the life of
//! the index, and are never reused. Search is brute-force **cosine
//! distance** (1 − cosine similarity), ascending, with ties broken by
//! insertion order so results are deterministic.
//!
//! Interior state lives behind a `std::sync::RwLock`: one writer
//! (ingestion) and any number of concurrent readers (queries). A single
//! insert stores vector and metadata in one critical section, so a
//! reader observes either both or neither.
//!
//! Persistence writes two co-located artifacts that must always travel
//! together: [`VECTORS_FILE`] (raw little-endian f32, count × dims × 4
//! bytes) and [`META_FILE`] (model name, dims, and the id-ordered
//! metadata table as JSON). Loading one without the other, or with
//! mismatched counts, is [`IndexError::Corrupt`] and the index refuses
//! to serve.

use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::models::ChunkRecord;

/// Vector artifact file name within the index directory.
pub const VECTORS_FILE: &str = "index.vectors";
/// Metadata artifact file name within the index directory.
pub const META_FILE: &str = "index.meta.json";

/// Index failure.
#[derive(Debug)]
pub enum IndexError {
    /// A vector's dimension does not match the index dimension.
    DimensionMismatch { expected: usize, got: usize },
    /// The configured embedding model does not match the model the
    /// index was built with. Mixing models invalidates distances.
    ModelMismatch { expected: String, got: String },
    /// The persisted artifacts are inconsistent with each other.
    Corrupt(String),
    /// Reading or writing the persisted artifacts failed.
    Io(String),
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexError::DimensionMismatch { expected, got } => {
                write!(f, "vector dimension mismatch: index has {}, got {}", expected, got)
            }
            IndexError::ModelMismatch { expected, got } => {
                write!(f, "embedding model mismatch: index built with '{}', got '{}'", expected, got)
            }
            IndexError::Corrupt(e) => write!(f, "index is corrupt: {}", e),
            IndexError::Io(e) => write!(f, "index storage error: {}", e),
        }
    }
}

impl std::error::Error for IndexError {}

/// One search result: the entry's id, its cosine distance from the
/// query (ascending is closer), and the stored metadata.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: usize,
    pub distance: f32,
    pub record: ChunkRecord,
}

#[derive(Serialize, Deserialize)]
struct IndexMeta {
    model: String,
    dims: usize,
    count: usize,
    records: Vec<ChunkRecord>,
}

struct IndexState {
    model: String,
    dims: usize,
    /// Flattened row-major vectors; entry `id` occupies
    /// `[id * dims, (id + 1) * dims)`.
    vectors: Vec<f32>,
    records: Vec<ChunkRecord>,
}

/// In-process vector index. See the module docs for the storage and
/// concurrency model.
pub struct VectorIndex {
    state: RwLock<IndexState>,
}

impl VectorIndex {
    /// Create an empty index bound to an embedding model and dimension.
    pub fn new(model: &str, dims: usize) -> Self {
        Self {
            state: RwLock::new(IndexState {
                model: model.to_string(),
                dims,
                vectors: Vec::new(),
                records: Vec::new(),
            }),
        }
    }

    /// Open the index persisted in `dir`, or create an empty one when
    /// neither artifact exists yet.
    ///
    /// An existing index must match the configured model and dimension;
    /// a directory holding only one of the two artifacts is corrupt.
    pub fn open_or_create(dir: &Path, model: &str, dims: usize) -> Result<Self, IndexError> {
        let vectors_path = dir.join(VECTORS_FILE);
        let meta_path = dir.join(META_FILE);

        match (vectors_path.exists(), meta_path.exists()) {
            (false, false) => Ok(Self::new(model, dims)),
            (true, true) => {
                let index = Self::load(dir)?;
                index.check_compatible(model, dims)?;
                Ok(index)
            }
            (true, false) => Err(IndexError::Corrupt(format!(
                "{} exists without {}",
                VECTORS_FILE, META_FILE
            ))),
            (false, true) => Err(IndexError::Corrupt(format!(
                "{} exists without {}",
                META_FILE, VECTORS_FILE
            ))),
        }
    }

    /// Verify that the configured embedding model matches the one this
    /// index was built with.
    pub fn check_compatible(&self, model: &str, dims: usize) -> Result<(), IndexError> {
        let state = self.state.read().unwrap();
        if state.dims != dims {
            return Err(IndexError::DimensionMismatch {
                expected: state.dims,
                got: dims,
            });
        }
        if state.model != model {
            return Err(IndexError::ModelMismatch {
                expected: state.model.clone(),
                got: model.to_string(),
            });
        }
        Ok(())
    }

    /// Append one entry, returning its id.
    ///
    /// The insert is atomic: a mismatched dimension fails before any
    /// state changes, and readers never observe a vector without its
    /// metadata.
    pub fn insert(&self, record: ChunkRecord, vector: &[f32]) -> Result<usize, IndexError> {
        let mut state = self.state.write().unwrap();
        if vector.len() != state.dims {
            return Err(IndexError::DimensionMismatch {
                expected: state.dims,
                got: vector.len(),
            });
        }
        let id = state.records.len();
        state.vectors.extend_from_slice(vector);
        state.records.push(record);
        Ok(id)
    }

    /// Return the `k` nearest entries by cosine distance, closest
    /// first. Ties go to the earlier-inserted entry. An empty index
    /// yields an empty list; `k` larger than the index yields all
    /// entries.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        let state = self.state.read().unwrap();
        if state.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != state.dims {
            return Err(IndexError::DimensionMismatch {
                expected: state.dims,
                got: query.len(),
            });
        }

        let mut hits: Vec<SearchHit> = state
            .vectors
            .chunks_exact(state.dims)
            .enumerate()
            .map(|(id, vector)| SearchHit {
                id,
                distance: 1.0 - cosine_similarity(query, vector),
                record: state.records[id].clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dims(&self) -> usize {
        self.state.read().unwrap().dims
    }

    pub fn model_name(&self) -> String {
        self.state.read().unwrap().model.clone()
    }

    /// Chunk counts per document, in document-name order.
    pub fn document_counts(&self) -> std::collections::BTreeMap<String, usize> {
        let state = self.state.read().unwrap();
        let mut counts = std::collections::BTreeMap::new();
        for record in &state.records {
            *counts.entry(record.doc_name.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Write both artifacts to `dir`. Call at a document boundary so
    /// every on-disk snapshot is consistent.
    pub fn persist(&self, dir: &Path) -> Result<(), IndexError> {
        let state = self.state.read().unwrap();

        std::fs::create_dir_all(dir).map_err(|e| IndexError::Io(e.to_string()))?;

        let meta = IndexMeta {
            model: state.model.clone(),
            dims: state.dims,
            count: state.records.len(),
            records: state.records.clone(),
        };
        let meta_json =
            serde_json::to_vec_pretty(&meta).map_err(|e| IndexError::Io(e.to_string()))?;

        std::fs::write(dir.join(VECTORS_FILE), vec_to_blob(&state.vectors))
            .map_err(|e| IndexError::Io(e.to_string()))?;
        std::fs::write(dir.join(META_FILE), meta_json)
            .map_err(|e| IndexError::Io(e.to_string()))?;
        Ok(())
    }

    /// Load both artifacts from `dir`, verifying that they agree.
    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let meta_bytes =
            std::fs::read(dir.join(META_FILE)).map_err(|e| IndexError::Io(e.to_string()))?;
        let meta: IndexMeta =
            serde_json::from_slice(&meta_bytes).map_err(|e| IndexError::Corrupt(e.to_string()))?;

        if meta.records.len() != meta.count {
            return Err(IndexError::Corrupt(format!(
                "metadata table holds {} records but declares {}",
                meta.records.len(),
                meta.count
            )));
        }

        let blob =
            std::fs::read(dir.join(VECTORS_FILE)).map_err(|e| IndexError::Io(e.to_string()))?;
        let expected_bytes = meta.count * meta.dims * 4;
        if blob.len() != expected_bytes {
            return Err(IndexError::Corrupt(format!(
                "vector store is {} bytes, expected {} for {} entries of dimension {}",
                blob.len(),
                expected_bytes,
                meta.count,
                meta.dims
            )));
        }

        Ok(Self {
            state: RwLock::new(IndexState {
                model: meta.model,
                dims: meta.dims,
                vectors: blob_to_vec(&blob),
                records: meta.records,
            }),
        })
    }
}

/// Encode a float slice as little-endian f32 bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two vectors of equal length.
///
/// Returns `0.0` for empty or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
