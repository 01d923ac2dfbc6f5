//! Query-time retrieval for the CLI.
//!
//! [`retrieve_for_query`] is shared by `search`, `context`, and `ask`: it
//! opens a previously built index, checks the configured embedder still
//! matches it, and bounds the query with `retrieval.timeout_secs`.

use anyhow::{bail, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use context_scanner_core::cancel::CancelToken;
use context_scanner_core::embedding::EmbeddingProvider;
use context_scanner_core::models::QueryResult;
use context_scanner_core::retrieve::retrieve;
use context_scanner_core::store::VectorIndex;
use context_scanner_core::ScanError;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::sqlite_store::SqliteIndex;

/// Embed `query` and return the `n` nearest chunks from the built index.
pub async fn retrieve_for_query(config: &Config, query: &str, n: usize) -> Result<QueryResult> {
    let provider = create_provider(&config.embedding)?;
    let index = SqliteIndex::open_existing(&config.index.path, config.index.distance()?).await?;

    if let Some(stored) = index.get_meta("dims").await? {
        if stored != provider.dims().to_string() {
            index.close().await;
            return Err(ScanError::Configuration(format!(
                "index was built with {} dimensions but embedding provider '{}' produces {}; re-run `ctxscan index`",
                stored,
                provider.model_name(),
                provider.dims()
            ))
            .into());
        }
    }
    if let Some(model) = index.get_meta("model").await? {
        if model != provider.model_name() {
            warn!(
                built_with = %model,
                querying_with = provider.model_name(),
                "embedding model differs from the one that built the index"
            );
        }
    }

    let timeout = Duration::from_secs(config.retrieval.timeout_secs);
    let outcome = retrieve_with_timeout(provider.as_ref(), &index, query, n, timeout).await;
    index.close().await;
    outcome
}

/// [`retrieve`] bounded by `timeout`.
///
/// On timeout the retrieval future is dropped, which abandons any
/// in-flight embedding request or index scan.
pub async fn retrieve_with_timeout(
    provider: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    query: &str,
    n: usize,
    timeout: Duration,
) -> Result<QueryResult> {
    let cancel = CancelToken::new();
    match tokio::time::timeout(timeout, retrieve(provider, index, query, n, &cancel)).await {
        Ok(result) => Ok(result?),
        Err(_) => bail!(
            "retrieval timed out after {}s (retrieval.timeout_secs)",
            timeout.as_secs()
        ),
    }
}

#[derive(Serialize)]
struct JsonHit<'a> {
    rank: usize,
    id: &'a str,
    path: &'a str,
    chunk_index: usize,
    distance: f32,
    text: &'a str,
}

/// Run the `search` command.
pub async fn run_search(config: &Config, query: &str, n: Option<usize>, json: bool) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let n = n.unwrap_or(config.retrieval.n);
    let results = retrieve_for_query(config, query, n).await?;
    debug!(query, hits = results.len(), "search complete");

    if json {
        let hits: Vec<JsonHit> = results
            .iter()
            .enumerate()
            .map(|(i, hit)| JsonHit {
                rank: i + 1,
                id: &hit.id,
                path: &hit.metadata.source_id,
                chunk_index: hit.metadata.index,
                distance: hit.distance,
                text: &hit.document,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!("Results for: '{}'", query);
    println!();
    for (i, hit) in results.iter().enumerate() {
        println!("--- Result {} (Path: {}) ---", i + 1, hit.metadata.source_id);
        println!("{}", hit.document.trim());
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use context_scanner_core::models::{ChunkMetadata, IndexedVector};
    use context_scanner_core::store::memory::InMemoryIndex;

    /// Embeds every text as `[1, 0]` after `delay`.
    struct SlowProvider {
        delay: Duration,
    }

    #[async_trait]
    impl EmbeddingProvider for SlowProvider {
        fn model_name(&self) -> &str {
            "slow"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            tokio::time::sleep(self.delay).await;
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    async fn built_index() -> InMemoryIndex {
        let index = InMemoryIndex::default();
        index
            .upsert(&[IndexedVector {
                id: "a.rs#0".to_string(),
                vector: vec![1.0, 0.0],
                metadata: ChunkMetadata {
                    source_id: "a.rs".to_string(),
                    index: 0,
                },
                document: "fn a() {}".to_string(),
            }])
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn slow_retrieval_times_out() {
        let index = built_index().await;
        let provider = SlowProvider {
            delay: Duration::from_secs(30),
        };
        let started = std::time::Instant::now();
        let err = retrieve_with_timeout(&provider, &index, "a", 1, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn fast_retrieval_returns_hits() {
        let index = built_index().await;
        let provider = SlowProvider {
            delay: Duration::from_millis(0),
        };
        let result = retrieve_with_timeout(&provider, &index, "a", 3, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.hits[0].id, "a.rs#0");
    }
}
