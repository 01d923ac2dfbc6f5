//! Fixed-size overlapping text chunker.
//!
//! Splits document text into windows of `size` characters, each window
//! starting `size - overlap` characters after the previous one. The
//! last window may be shorter than `size`. Sizes and offsets count
//! Unicode scalar values, so a window never splits a UTF-8 sequence.
//!
//! # Algorithm
//!
//! 1. Reject `size == 0` and `overlap >= size` (the step would be
//!    non-positive and the walk would never terminate).
//! 2. Starting at offset 0, emit `text[offset .. offset + size]`.
//! 3. Stop once a window reaches the end of the text; otherwise advance
//!    by `size - overlap` and repeat.
//!
//! For non-empty text this yields `ceil((len - overlap) / (size - overlap))`
//! chunks when `len > overlap`, else exactly one. Empty text yields none.
//!
//! # Example
//!
//! ```rust
//! use context_scanner_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("0123456789", 4, 1).unwrap();
//! assert_eq!(chunks, vec!["0123", "3456", "6789"]);
//! ```

use crate::error::{Result, ScanError};
use crate::models::{Chunk, Document};

/// Default window size, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default overlap between consecutive windows, in characters.
pub const DEFAULT_OVERLAP: usize = 50;

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub size: usize,
    pub overlap: usize,
}

impl ChunkingParams {
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        let params = Self { size, overlap };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(ScanError::Configuration(
                "chunk size must be > 0".to_string(),
            ));
        }
        if self.overlap >= self.size {
            return Err(ScanError::Configuration(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.size
            )));
        }
        Ok(())
    }

    fn step(&self) -> usize {
        self.size - self.overlap
    }
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// Split `text` into overlapping windows and return them in order.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    let params = ChunkingParams::new(size, overlap)?;
    Ok(windows(text, params)
        .into_iter()
        .map(|(_, piece)| piece.to_string())
        .collect())
}

/// Chunk a whole document, assigning per-document indexes and offsets.
pub fn chunk_document(doc: &Document, params: ChunkingParams) -> Result<Vec<Chunk>> {
    params.validate()?;
    Ok(windows(&doc.body, params)
        .into_iter()
        .enumerate()
        .map(|(index, (start_offset, piece))| Chunk {
            source_id: doc.source_id.clone(),
            index,
            text: piece.to_string(),
            start_offset,
        })
        .collect())
}

/// Compute `(char_offset, slice)` windows. `params` must be valid.
fn windows(text: &str, params: ChunkingParams) -> Vec<(usize, &str)> {
    // Byte offset of every char boundary, including the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = bounds.len() - 1;

    let mut out = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + params.size).min(len);
        out.push((start, &text[bounds[start]..bounds[end]]));
        if end == len {
            break;
        }
        start += params.step();
    }
    out
}
