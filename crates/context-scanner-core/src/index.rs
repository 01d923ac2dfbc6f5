//! Indexing pipeline: documents → chunks → batched embeddings → upserts.
//!
//! The pipeline is source-agnostic; the caller supplies already-read
//! [`Document`]s (the app crate walks the filesystem). Chunk ids are
//! assigned per document, so document order and read concurrency never
//! affect them.
//!
//! Each batch costs exactly one embedding call and one upsert. Batches
//! may run with bounded concurrency. The first failing batch aborts the
//! run; batches committed before it stay in the index.

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::chunk::{chunk_document, ChunkingParams};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, ScanError};
use crate::models::{Chunk, Document, IndexStats, IndexedVector};
use crate::store::{VectorIndex, DEFAULT_BATCH_SIZE};

/// Tuning knobs for one indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    pub chunking: ChunkingParams,
    /// Chunks per embedding call and per upsert.
    pub batch_size: usize,
    /// Maximum batches in flight.
    pub concurrency: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingParams::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: 1,
        }
    }
}

impl IndexOptions {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.batch_size == 0 {
            return Err(ScanError::Configuration(
                "batch size must be > 0".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ScanError::Configuration(
                "embedding concurrency must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Progress notifications emitted while indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    /// All documents chunked; `batches` embedding calls are about to run.
    Chunked {
        documents: usize,
        chunks: usize,
        batches: usize,
    },
    /// `done` of `total` batches are committed to the index.
    BatchCommitted { done: usize, total: usize },
}

/// Receives [`IndexEvent`]s. `()` ignores them.
pub trait IndexObserver: Send + Sync {
    fn observe(&self, event: IndexEvent);
}

impl IndexObserver for () {
    fn observe(&self, _event: IndexEvent) {}
}

/// Chunk, embed, and upsert `documents`.
///
/// Returns [`ScanError::NoContent`] when the documents yield no chunks,
/// so callers can tell "nothing indexed" apart from a successful run.
/// `skipped_files` in the returned stats is left at zero for the
/// document source to fill in.
pub async fn index_documents(
    documents: &[Document],
    provider: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    options: &IndexOptions,
    observer: &dyn IndexObserver,
) -> Result<IndexStats> {
    options.validate()?;

    let mut chunks: Vec<Chunk> = Vec::new();
    for doc in documents {
        chunks.extend(chunk_document(doc, options.chunking)?);
    }

    if chunks.is_empty() {
        return Err(ScanError::NoContent(documents.len()));
    }

    let batches: Vec<&[Chunk]> = chunks.chunks(options.batch_size).collect();
    let total = batches.len();
    info!(
        documents = documents.len(),
        chunks = chunks.len(),
        batches = total,
        "indexing"
    );
    observer.observe(IndexEvent::Chunked {
        documents: documents.len(),
        chunks: chunks.len(),
        batches: total,
    });

    let mut in_flight = stream::iter(batches.into_iter().enumerate())
        .map(|(ordinal, batch)| embed_and_upsert(ordinal, batch, provider, index))
        .buffer_unordered(options.concurrency);

    let mut done = 0;
    while let Some(result) = in_flight.next().await {
        result?;
        done += 1;
        observer.observe(IndexEvent::BatchCommitted { done, total });
    }

    Ok(IndexStats {
        file_count: documents.len(),
        chunk_count: chunks.len(),
        batch_count: total,
        skipped_files: 0,
    })
}

async fn embed_and_upsert(
    ordinal: usize,
    batch: &[Chunk],
    provider: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
) -> Result<()> {
    let first_id = batch.first().map(Chunk::id).unwrap_or_default();
    let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

    let vectors = provider
        .embed(&texts)
        .await
        .map_err(|e| ScanError::Embedding {
            batch: ordinal,
            first_id: first_id.clone(),
            message: format!("{:#}", e),
        })?;

    if vectors.len() != batch.len() {
        return Err(ScanError::Embedding {
            batch: ordinal,
            first_id,
            message: format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            ),
        });
    }

    let entries: Vec<IndexedVector> = batch
        .iter()
        .zip(vectors)
        .map(|(chunk, vector)| IndexedVector::from_chunk(chunk, vector))
        .collect();
    index.upsert(&entries).await.map_err(|e| match e {
        ScanError::Store(message) => ScanError::Upsert {
            batch: ordinal,
            first_id,
            message,
        },
        other => other,
    })?;
    debug!(batch = ordinal, size = entries.len(), "batch committed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Distance;
    use crate::store::memory::InMemoryIndex;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Embeds text length and vowel count; optionally fails on call `fail_on`.
    struct CountingProvider {
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    impl CountingProvider {
        fn new(fail_on: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(call) == self.fail_on {
                anyhow::bail!("backend unavailable");
            }
            Ok(texts
                .iter()
                .map(|t| {
                    let vowels = t.chars().filter(|c| "aeiou".contains(*c)).count();
                    vec![t.len() as f32 + 1.0, vowels as f32]
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<IndexEvent>>);

    impl IndexObserver for Recorder {
        fn observe(&self, event: IndexEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn options(size: usize, overlap: usize, batch_size: usize) -> IndexOptions {
        IndexOptions {
            chunking: ChunkingParams::new(size, overlap).unwrap(),
            batch_size,
            concurrency: 1,
        }
    }

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("a.txt", "the quick brown fox jumps over the lazy dog"),
            Document::new("b.txt", "lorem ipsum dolor sit amet"),
        ]
    }

    #[test]
    fn test_one_embedding_call_per_batch() {
        let provider = CountingProvider::new(None);
        let index = InMemoryIndex::default();
        let recorder = Recorder::default();
        let stats = block_on(index_documents(
            &corpus(),
            &provider,
            &index,
            &options(10, 2, 3),
            &recorder,
        ))
        .unwrap();

        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.batch_count, stats.chunk_count.div_ceil(3));
        assert_eq!(provider.calls.load(Ordering::SeqCst), stats.batch_count);
        assert_eq!(block_on(index.len()).unwrap(), stats.chunk_count);

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 1 + stats.batch_count);
        assert_eq!(
            events.last(),
            Some(&IndexEvent::BatchCommitted {
                done: stats.batch_count,
                total: stats.batch_count
            })
        );
    }

    #[test]
    fn test_reindex_is_idempotent() {
        let provider = CountingProvider::new(None);
        let index = InMemoryIndex::default();
        let opts = options(8, 3, 4);
        block_on(index_documents(&corpus(), &provider, &index, &opts, &())).unwrap();
        let first_ids = block_on(index.ids()).unwrap();

        block_on(index_documents(&corpus(), &provider, &index, &opts, &())).unwrap();
        assert_eq!(block_on(index.ids()).unwrap(), first_ids);
        assert!(first_ids.contains(&"a.txt#0".to_string()));
    }

    #[test]
    fn test_no_content() {
        let provider = CountingProvider::new(None);
        let index = InMemoryIndex::default();
        let docs = vec![Document::new("empty.txt", "")];
        let err = block_on(index_documents(&docs, &provider, &index, &options(4, 1, 10), &()))
            .unwrap_err();
        assert!(matches!(err, ScanError::NoContent(1)));

        let err = block_on(index_documents(&[], &provider, &index, &options(4, 1, 10), &()))
            .unwrap_err();
        assert!(matches!(err, ScanError::NoContent(0)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_batch_keeps_committed_batches() {
        let provider = CountingProvider::new(Some(1));
        let index = InMemoryIndex::default();
        let err = block_on(index_documents(
            &corpus(),
            &provider,
            &index,
            &options(5, 0, 2),
            &(),
        ))
        .unwrap_err();

        match err {
            ScanError::Embedding {
                batch, first_id, ..
            } => {
                assert_eq!(batch, 1);
                assert_eq!(first_id, "a.txt#2");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            block_on(index.ids()).unwrap(),
            vec!["a.txt#0".to_string(), "a.txt#1".to_string()]
        );
    }

    /// Delegates to an in-memory index but fails its second upsert.
    struct FailSecondUpsert {
        inner: InMemoryIndex,
        upserts: AtomicUsize,
    }

    #[async_trait]
    impl VectorIndex for FailSecondUpsert {
        async fn upsert(&self, entries: &[IndexedVector]) -> Result<()> {
            if self.upserts.fetch_add(1, Ordering::SeqCst) == 1 {
                return Err(ScanError::Store("disk I/O error".to_string()));
            }
            self.inner.upsert(entries).await
        }
        async fn query(&self, vector: &[f32], n: usize) -> Result<crate::models::QueryResult> {
            self.inner.query(vector, n).await
        }
        async fn len(&self) -> Result<usize> {
            self.inner.len().await
        }
        async fn ids(&self) -> Result<Vec<String>> {
            self.inner.ids().await
        }
        async fn clear(&self) -> Result<()> {
            self.inner.clear().await
        }
        fn metric(&self) -> Distance {
            self.inner.metric()
        }
    }

    #[test]
    fn test_failed_upsert_reports_batch_and_first_id() {
        let provider = CountingProvider::new(None);
        let index = FailSecondUpsert {
            inner: InMemoryIndex::default(),
            upserts: AtomicUsize::new(0),
        };
        let docs = vec![Document::new("a.txt", "abcdefghijklmnop")];
        let err = block_on(index_documents(&docs, &provider, &index, &options(4, 0, 2), &()))
            .unwrap_err();

        match &err {
            ScanError::Upsert {
                batch, first_id, message,
            } => {
                assert_eq!(*batch, 1);
                assert_eq!(first_id, "a.txt#2");
                assert_eq!(message, "disk I/O error");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("batch 1"));
        assert_eq!(
            block_on(index.ids()).unwrap(),
            vec!["a.txt#0".to_string(), "a.txt#1".to_string()]
        );
    }

    #[test]
    fn test_concurrent_batches_index_everything() {
        let provider = CountingProvider::new(None);
        let index = InMemoryIndex::new(Distance::Euclidean);
        let mut opts = options(6, 1, 2);
        opts.concurrency = 4;
        let stats = block_on(index_documents(&corpus(), &provider, &index, &opts, &())).unwrap();
        assert_eq!(block_on(index.len()).unwrap(), stats.chunk_count);
    }

    #[test]
    fn test_invalid_options() {
        let provider = CountingProvider::new(None);
        let index = InMemoryIndex::default();
        let mut opts = options(4, 1, 10);
        opts.batch_size = 0;
        let err = block_on(index_documents(&corpus(), &provider, &index, &opts, &())).unwrap_err();
        assert!(matches!(err, ScanError::Configuration(_)));
    }
}
