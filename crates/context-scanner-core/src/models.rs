//! Core data models that flow through indexing and retrieval.

use serde::Serialize;

/// A source document read for one indexing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path-like key, e.g. `./src/main.rs`.
    pub source_id: String,
    pub body: String,
}

impl Document {
    pub fn new(source_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            body: body.into(),
        }
    }
}

/// A bounded substring of a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub source_id: String,
    /// Zero-based ordinal within the document.
    pub index: usize,
    pub text: String,
    /// Offset of the first character, in chars.
    pub start_offset: usize,
}

impl Chunk {
    /// Stable identity: `source_id#index`.
    pub fn id(&self) -> String {
        chunk_id(&self.source_id, self.index)
    }
}

/// Build the composite chunk key used for upserts.
pub fn chunk_id(source_id: &str, index: usize) -> String {
    format!("{}#{}", source_id, index)
}

/// Metadata stored alongside every vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkMetadata {
    pub source_id: String,
    pub index: usize,
}

/// A chunk's identity, embedding, metadata, and text as held by an index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedVector {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
    pub document: String,
}

impl IndexedVector {
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.id(),
            vector,
            metadata: ChunkMetadata {
                source_id: chunk.source_id.clone(),
                index: chunk.index,
            },
            document: chunk.text.clone(),
        }
    }
}

/// One nearest-neighbour match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
    /// Lower is more similar.
    pub distance: f32,
}

/// Matches ordered by ascending distance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub hits: Vec<QueryHit>,
}

impl QueryResult {
    /// Sort by ascending distance (ties by id) and keep at most `n`.
    pub fn from_unsorted(mut hits: Vec<QueryHit>, n: usize) -> Self {
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(n);
        Self { hits }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryHit> {
        self.hits.iter()
    }
}

/// Summary of one indexing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub file_count: usize,
    pub chunk_count: usize,
    pub batch_count: usize,
    /// Files that could not be read as text and were skipped.
    pub skipped_files: usize,
}

/// The packed output of the context assembler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssembledContext {
    pub body: String,
    /// Candidates accepted into `body`.
    pub accepted: usize,
    /// Candidates offered to the assembler.
    pub considered: usize,
    pub tokens_used: i64,
    pub budget: i64,
}
