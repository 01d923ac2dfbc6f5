//! Error taxonomy shared by every core operation.
//!
//! Per-file read failures are deliberately absent: the document source
//! absorbs them and they never reach a caller. An exhausted token budget
//! is also absent because assembly treats it as a valid, empty outcome.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Invalid parameters (chunking, batch sizing, vector dimensions).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A query was issued against an index that was never built.
    #[error("index '{0}' not found or empty; run `ctxscan index` first")]
    IndexNotFound(String),

    /// An indexing run produced zero chunks from this many readable documents.
    #[error("no content to index ({0} readable documents produced zero chunks)")]
    NoContent(usize),

    /// The embedding capability failed for one batch.
    ///
    /// `batch` is the zero-based batch ordinal and `first_id` the id of
    /// the first chunk in it, enough to retry at batch granularity.
    #[error("embedding failed for batch {batch} (starting at {first_id}): {message}")]
    Embedding {
        batch: usize,
        first_id: String,
        message: String,
    },

    /// The storage backend failed.
    #[error("vector index error: {0}")]
    Store(String),

    /// The storage backend rejected one batch during indexing.
    ///
    /// Same addressing as [`ScanError::Embedding`]: batches before it
    /// stay committed and indexing can resume from `first_id`.
    #[error("vector index write failed for batch {batch} (starting at {first_id}): {message}")]
    Upsert {
        batch: usize,
        first_id: String,
        message: String,
    },

    /// The caller cancelled the operation at a blocking boundary.
    #[error("operation cancelled")]
    Cancelled,
}

impl ScanError {
    /// Recoverable conditions the user can fix by running another command.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ScanError::IndexNotFound(_) | ScanError::NoContent(_))
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_index_and_empty_corpus_are_recoverable() {
        assert!(ScanError::IndexNotFound("x".into()).is_recoverable());
        assert!(ScanError::NoContent(0).is_recoverable());
        assert!(!ScanError::Store("locked".into()).is_recoverable());
        assert!(!ScanError::Upsert {
            batch: 0,
            first_id: "a#0".into(),
            message: "locked".into(),
        }
        .is_recoverable());
        assert!(!ScanError::Cancelled.is_recoverable());
    }
}
