//! In-memory [`VectorIndex`] implementation for tests and embedding.
//!
//! Uses a `HashMap<id, IndexedVector>` behind `std::sync::RwLock`: a
//! batch is applied under a single write lock, queries share the read
//! lock. Search is an exact brute-force scan.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::embedding::Distance;
use crate::error::{Result, ScanError};
use crate::models::{IndexedVector, QueryHit, QueryResult};

use super::{check_dimensions, VectorIndex};

/// In-memory vector index.
pub struct InMemoryIndex {
    name: String,
    metric: Distance,
    entries: RwLock<HashMap<String, IndexedVector>>,
}

impl InMemoryIndex {
    pub fn new(metric: Distance) -> Self {
        Self::named("memory", metric)
    }

    pub fn named(name: impl Into<String>, metric: Distance) -> Self {
        Self {
            name: name.into(),
            metric,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new(Distance::default())
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, entries: &[IndexedVector]) -> Result<()> {
        let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let stored_dims = map.values().next().map(|e| e.vector.len());
        check_dimensions(entries, stored_dims)?;
        for entry in entries {
            map.insert(entry.id.clone(), entry.clone());
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], n: usize) -> Result<QueryResult> {
        let map = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        if map.is_empty() {
            return Err(ScanError::IndexNotFound(self.name.clone()));
        }
        let hits = map
            .values()
            .map(|e| QueryHit {
                id: e.id.clone(),
                document: e.document.clone(),
                metadata: e.metadata.clone(),
                distance: self.metric.between(vector, &e.vector),
            })
            .collect();
        Ok(QueryResult::from_unsorted(hits, n))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len())
    }

    async fn ids(&self) -> Result<Vec<String>> {
        let map = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = map.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn clear(&self) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    fn metric(&self) -> Distance {
        self.metric
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use futures::executor::block_on;

    fn entry(id: &str, vector: Vec<f32>, text: &str) -> IndexedVector {
        IndexedVector {
            id: id.to_string(),
            vector,
            metadata: ChunkMetadata {
                source_id: id.split('#').next().unwrap_or(id).to_string(),
                index: 0,
            },
            document: text.to_string(),
        }
    }

    #[test]
    fn test_query_empty_index_is_not_found() {
        let index = InMemoryIndex::default();
        let err = block_on(index.query(&[1.0, 0.0], 3)).unwrap_err();
        assert!(matches!(err, ScanError::IndexNotFound(_)));
    }

    #[test]
    fn test_query_sorted_and_bounded() {
        let index = InMemoryIndex::default();
        block_on(index.upsert(&[
            entry("a#0", vec![0.0, 1.0], "far"),
            entry("b#0", vec![1.0, 0.0], "exact"),
            entry("c#0", vec![0.7, 0.7], "middle"),
        ]))
        .unwrap();

        let result = block_on(index.query(&[1.0, 0.0], 2)).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.hits[0].id, "b#0");
        assert_eq!(result.hits[1].id, "c#0");
        assert!(result.hits[0].distance <= result.hits[1].distance);

        let all = block_on(index.query(&[1.0, 0.0], 10)).unwrap();
        assert_eq!(all.len(), 3);
        for pair in all.hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_query_zero_n_on_built_index() {
        let index = InMemoryIndex::default();
        block_on(index.upsert(&[entry("a#0", vec![1.0], "x")])).unwrap();
        assert!(block_on(index.query(&[1.0], 0)).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_replaces_same_id() {
        let index = InMemoryIndex::default();
        block_on(index.upsert(&[entry("a#0", vec![1.0, 0.0], "old")])).unwrap();
        block_on(index.upsert(&[entry("a#0", vec![0.0, 1.0], "new")])).unwrap();
        assert_eq!(block_on(index.len()).unwrap(), 1);
        let result = block_on(index.query(&[0.0, 1.0], 1)).unwrap();
        assert_eq!(result.hits[0].document, "new");
    }

    #[test]
    fn test_dimension_mismatch_rejects_whole_batch() {
        let index = InMemoryIndex::default();
        block_on(index.upsert(&[entry("a#0", vec![1.0, 0.0], "ok")])).unwrap();
        let err = block_on(index.upsert(&[
            entry("b#0", vec![1.0, 0.0], "fine"),
            entry("c#0", vec![1.0], "short"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ScanError::Configuration(_)));
        assert_eq!(block_on(index.ids()).unwrap(), vec!["a#0".to_string()]);
    }

    #[test]
    fn test_clear() {
        let index = InMemoryIndex::new(Distance::Euclidean);
        block_on(index.upsert(&[entry("a#0", vec![1.0], "x")])).unwrap();
        block_on(index.clear()).unwrap();
        assert_eq!(block_on(index.len()).unwrap(), 0);
        assert!(block_on(index.query(&[1.0], 1)).is_err());
    }
}
