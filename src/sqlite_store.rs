//! SQLite-backed [`VectorIndex`] implementation.
//!
//! Vectors are stored as little-endian `f32` BLOBs in the `vectors`
//! table keyed by chunk id. Each upsert batch is one transaction, so a
//! failed batch never leaves partial rows behind. Queries are an exact
//! scan that keeps only the best `n` rows in memory.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt::Display;
use std::path::Path;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use context_scanner_core::embedding::{blob_to_vec, vec_to_blob, Distance};
use context_scanner_core::models::{ChunkMetadata, IndexedVector, QueryHit, QueryResult};
use context_scanner_core::store::{check_dimensions, VectorIndex};
use context_scanner_core::{Result, ScanError};

use crate::db;
use crate::migrate;

/// Persistent vector index in a single SQLite file.
pub struct SqliteIndex {
    pool: SqlitePool,
    name: String,
    metric: Distance,
    /// Serializes writers inside this process; SQLite serializes across processes.
    write_lock: Mutex<()>,
}

fn store_err(e: impl Display) -> ScanError {
    ScanError::Store(e.to_string())
}

impl SqliteIndex {
    /// Open the index at `path`, creating the file and schema if absent.
    pub async fn create_if_absent(path: &Path, metric: Distance) -> anyhow::Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        let index = Self::from_pool(pool, path, metric);
        let metric = index.stored_metric().await?.unwrap_or(metric);
        Ok(Self { metric, ..index })
    }

    /// Open an index that was built before.
    ///
    /// Fails with [`ScanError::IndexNotFound`] when the file or schema is
    /// missing. The metric recorded at build time takes precedence over
    /// `metric`.
    pub async fn open_existing(path: &Path, metric: Distance) -> Result<Self> {
        let not_found = || ScanError::IndexNotFound(path.display().to_string());
        let pool = db::open_existing(path)
            .await
            .map_err(store_err)?
            .ok_or_else(not_found)?;

        let has_table: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='vectors'",
        )
        .fetch_one(&pool)
        .await
        .map_err(store_err)?;
        if !has_table {
            return Err(not_found());
        }

        let index = Self::from_pool(pool, path, metric);
        let metric = index.stored_metric().await?.unwrap_or(metric);
        Ok(Self { metric, ..index })
    }

    fn from_pool(pool: SqlitePool, path: &Path, metric: Distance) -> Self {
        Self {
            pool,
            name: path.display().to_string(),
            metric,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn stored_metric(&self) -> Result<Option<Distance>> {
        match self.get_meta("metric").await? {
            Some(m) => Ok(Some(m.parse::<Distance>()?)),
            None => Ok(None),
        }
    }

    pub async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)
    }

    pub async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO index_meta (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    /// Record which model, dimensionality, and metric built the index.
    pub async fn record_build(&self, model: &str, dims: usize) -> Result<()> {
        self.set_meta("model", model).await?;
        self.set_meta("dims", &dims.to_string()).await?;
        self.set_meta("metric", self.metric.as_str()).await?;
        self.set_meta("indexed_at", &chrono::Utc::now().to_rfc3339())
            .await
    }

    /// Number of distinct documents with at least one stored chunk.
    pub async fn source_count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(DISTINCT source_id) FROM vectors")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)
    }

    async fn stored_dims(&self) -> Result<Option<usize>> {
        let dims: Option<i64> = sqlx::query_scalar("SELECT dims FROM vectors LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(dims.map(|d| d as usize))
    }
}

/// Max-heap entry: the worst kept hit sits on top and is evicted first.
struct Ranked(QueryHit);

impl Ranked {
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.0
            .distance
            .partial_cmp(&other.0.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.0.id.cmp(&other.0.id))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key_cmp(other)
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, entries: &[IndexedVector]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        check_dimensions(entries, self.stored_dims().await?)?;

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO vectors (id, source_id, chunk_index, document, vector, dims, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source_id = excluded.source_id,
                    chunk_index = excluded.chunk_index,
                    document = excluded.document,
                    vector = excluded.vector,
                    dims = excluded.dims,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.metadata.source_id)
            .bind(entry.metadata.index as i64)
            .bind(&entry.document)
            .bind(vec_to_blob(&entry.vector))
            .bind(entry.vector.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], n: usize) -> Result<QueryResult> {
        if self.len().await? == 0 {
            return Err(ScanError::IndexNotFound(self.name.clone()));
        }
        if n == 0 {
            return Ok(QueryResult::default());
        }

        let mut heap: BinaryHeap<Ranked> = BinaryHeap::new();
        let mut rows =
            sqlx::query("SELECT id, source_id, chunk_index, document, vector FROM vectors")
                .fetch(&self.pool);

        while let Some(row) = rows.try_next().await.map_err(store_err)? {
            let blob: Vec<u8> = row.try_get("vector").map_err(store_err)?;
            let distance = self.metric.between(vector, &blob_to_vec(&blob));
            let chunk_index: i64 = row.try_get("chunk_index").map_err(store_err)?;
            heap.push(Ranked(QueryHit {
                id: row.try_get("id").map_err(store_err)?,
                document: row.try_get("document").map_err(store_err)?,
                metadata: ChunkMetadata {
                    source_id: row.try_get("source_id").map_err(store_err)?,
                    index: chunk_index as usize,
                },
                distance,
            }));
            if heap.len() > n {
                heap.pop();
            }
        }

        let hits = heap.into_iter().map(|r| r.0).collect();
        Ok(QueryResult::from_unsorted(hits, n))
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(count as usize)
    }

    async fn ids(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT id FROM vectors ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        sqlx::query("DELETE FROM vectors")
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        sqlx::query("DELETE FROM index_meta")
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    fn metric(&self) -> Distance {
        self.metric
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: &str, vector: Vec<f32>) -> IndexedVector {
        let (source, index) = id.split_once('#').unwrap();
        IndexedVector {
            id: id.to_string(),
            vector,
            metadata: ChunkMetadata {
                source_id: source.to_string(),
                index: index.parse().unwrap(),
            },
            document: format!("text of {}", id),
        }
    }

    #[tokio::test]
    async fn open_missing_index_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nope.sqlite");
        let err = SqliteIndex::open_existing(&path, Distance::Cosine)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ScanError::IndexNotFound(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn empty_index_query_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db").join("index.sqlite");
        let index = SqliteIndex::create_if_absent(&path, Distance::Cosine)
            .await
            .unwrap();
        let err = index.query(&[1.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(err, ScanError::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn upsert_query_and_persist() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.sqlite");
        {
            let index = SqliteIndex::create_if_absent(&path, Distance::Cosine)
                .await
                .unwrap();
            index
                .upsert(&[
                    entry("a.rs#0", vec![1.0, 0.0]),
                    entry("a.rs#1", vec![0.6, 0.8]),
                    entry("b.rs#0", vec![0.0, 1.0]),
                ])
                .await
                .unwrap();
            index.record_build("test", 2).await.unwrap();
            index.close().await;
        }

        let index = SqliteIndex::open_existing(&path, Distance::Euclidean)
            .await
            .unwrap();
        assert_eq!(index.metric(), Distance::Cosine);
        assert_eq!(index.len().await.unwrap(), 3);
        assert_eq!(index.source_count().await.unwrap(), 2);

        let result = index.query(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = result.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a.rs#0", "a.rs#1"]);
        assert!(result.hits[0].distance <= result.hits[1].distance);
        assert_eq!(result.hits[1].metadata.index, 1);

        assert!(index.query(&[1.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_overlapping_upserts_leave_one_row_per_id() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.sqlite");
        let index = SqliteIndex::create_if_absent(&path, Distance::Cosine)
            .await
            .unwrap();

        let first: Vec<IndexedVector> = (0..50)
            .map(|i| entry(&format!("a.rs#{}", i), vec![1.0, 0.0]))
            .collect();
        let second: Vec<IndexedVector> = (25..75)
            .map(|i| entry(&format!("a.rs#{}", i), vec![0.0, 1.0]))
            .collect();

        let (r1, r2) = tokio::join!(index.upsert(&first), index.upsert(&second));
        r1.unwrap();
        r2.unwrap();

        assert_eq!(index.len().await.unwrap(), 75);
        let ids = index.ids().await.unwrap();
        let mut deduped = ids.clone();
        deduped.dedup();
        assert_eq!(ids, deduped);

        // Each overlapping id holds one whole batch's vector, never a mix.
        let result = index.query(&[1.0, 0.0], 75).await.unwrap();
        let hit = result.iter().find(|h| h.id == "a.rs#30").unwrap();
        assert!(hit.distance.abs() < 1e-6 || (hit.distance - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn upsert_overwrites_and_rejects_bad_dims() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.sqlite");
        let index = SqliteIndex::create_if_absent(&path, Distance::Cosine)
            .await
            .unwrap();
        index.upsert(&[entry("a.rs#0", vec![1.0, 0.0])]).await.unwrap();
        index.upsert(&[entry("a.rs#0", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(index.ids().await.unwrap(), vec!["a.rs#0".to_string()]);

        let err = index
            .upsert(&[entry("b.rs#0", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Configuration(_)));
        assert_eq!(index.len().await.unwrap(), 1);

        index.clear().await.unwrap();
        assert_eq!(index.len().await.unwrap(), 0);
    }
}
