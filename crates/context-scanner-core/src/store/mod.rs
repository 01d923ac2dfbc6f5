//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait defines the storage operations needed by
//! the indexing and retrieval pipeline, so any backend (in-memory map,
//! SQLite file, an ANN structure) can satisfy the same contract.
//!
//! Implementations must be `Send + Sync`, serialize writes to the same
//! id (last writer wins, no partial writes), and let queries proceed
//! concurrently.

pub mod memory;

use async_trait::async_trait;

use crate::embedding::Distance;
use crate::error::{Result, ScanError};
use crate::models::{IndexedVector, QueryResult};

/// Default number of chunks per upsert batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Abstract vector store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorIndex::upsert) | Insert or replace one atomic batch |
/// | [`query`](VectorIndex::query) | Up to `n` nearest entries, ascending distance |
/// | [`len`](VectorIndex::len) | Number of stored entries |
/// | [`ids`](VectorIndex::ids) | All stored ids, sorted |
/// | [`clear`](VectorIndex::clear) | Remove every entry |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert new entries or replace entries sharing an id.
    ///
    /// The whole slice is one atomic unit: on error nothing from it is
    /// visible and earlier batches are untouched.
    async fn upsert(&self, entries: &[IndexedVector]) -> Result<()>;

    /// Return up to `n` nearest entries by [`metric`](VectorIndex::metric).
    ///
    /// Fails with [`ScanError::IndexNotFound`] when the index holds no
    /// entries; `n == 0` on a built index returns an empty result.
    async fn query(&self, vector: &[f32], n: usize) -> Result<QueryResult>;

    async fn len(&self) -> Result<usize>;

    async fn ids(&self) -> Result<Vec<String>>;

    async fn clear(&self) -> Result<()>;

    fn metric(&self) -> Distance;
}

/// Reject batches whose vectors disagree in dimension with each other
/// or with the dimension already stored.
pub fn check_dimensions(entries: &[IndexedVector], stored_dims: Option<usize>) -> Result<()> {
    let expected = stored_dims.or_else(|| entries.first().map(|e| e.vector.len()));
    let Some(expected) = expected else {
        return Ok(());
    };
    if let Some(bad) = entries.iter().find(|e| e.vector.len() != expected) {
        return Err(ScanError::Configuration(format!(
            "vector for '{}' has {} dimensions, index expects {}",
            bad.id,
            bad.vector.len(),
            expected
        )));
    }
    Ok(())
}
