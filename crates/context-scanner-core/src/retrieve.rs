//! Query-time retrieval: embed the query once, then ask the index.

use tracing::debug;

use crate::cancel::CancelToken;
use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::{Result, ScanError};
use crate::models::QueryResult;
use crate::store::VectorIndex;

/// Retrieve the `n` chunks nearest to `query`.
///
/// [`ScanError::IndexNotFound`] from the index is returned unchanged.
/// Cancellation is checked before the embedding call and before the
/// index query.
pub async fn retrieve(
    provider: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    query: &str,
    n: usize,
    cancel: &CancelToken,
) -> Result<QueryResult> {
    cancel.check()?;
    let vector = embed_query(provider, query)
        .await
        .map_err(|e| ScanError::Embedding {
            batch: 0,
            first_id: "query".to_string(),
            message: format!("{:#}", e),
        })?;

    cancel.check()?;
    let result = index.query(&vector, n).await?;
    debug!(n, hits = result.len(), "retrieved");
    Ok(result)
}
