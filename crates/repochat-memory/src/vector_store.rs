use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("query error: {0}")]
    Query(String),
    #[error("stats error: {0}")]
    Stats(String),
    #[error("delete error: {0}")]
    Delete(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("upsert batch {batch_index} failed: {source}")]
    BatchUpsert {
        batch_index: usize,
        #[source]
        source: Box<VectorStoreError>,
    },
}

/// Payload stored next to every vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Repository-relative path of the file the chunk came from.
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    /// `None` when the query did not ask for metadata.
    pub metadata: Option<RecordMetadata>,
}

/// Record counts keyed by namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub namespaces: BTreeMap<String, u64>,
}

impl IndexStats {
    /// Records stored under `namespace`, zero when absent.
    #[must_use]
    pub fn count(&self, namespace: &str) -> u64 {
        self.namespaces.get(namespace).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.namespaces.values().sum()
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Namespaced vector index. A namespace partitions records of one repository.
pub trait VectorStore: Send + Sync {
    /// Insert or replace records by id.
    fn upsert(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Up to `top_k` nearest records by cosine similarity, best first.
    /// A missing or empty namespace yields an empty list.
    fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: u64,
        include_metadata: bool,
    ) -> BoxFuture<'_, Result<Vec<QueryMatch>, VectorStoreError>>;

    /// Count records in `namespace`, or in every namespace when `None`.
    fn describe_stats(
        &self,
        namespace: Option<&str>,
    ) -> BoxFuture<'_, Result<IndexStats, VectorStoreError>>;

    /// Remove every record of `namespace`. No-op when absent.
    fn delete_namespace(&self, namespace: &str) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Remove every record of every namespace.
    fn delete_all(&self) -> BoxFuture<'_, Result<(), VectorStoreError>>;
}

/// Batch size and pacing for bulk upserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertBatching {
    pub batch_size: usize,
    pub delay: Duration,
}

impl Default for UpsertBatching {
    fn default() -> Self {
        Self {
            batch_size: 100,
            delay: Duration::from_millis(50),
        }
    }
}

/// Upsert `records` sequentially in batches, pausing between batches.
///
/// Batches already written stay written when a later one fails.
///
/// # Errors
///
/// Returns `VectorStoreError::BatchUpsert` carrying the zero-based index of the failed batch.
pub async fn upsert_in_batches<S: VectorStore + ?Sized>(
    store: &S,
    namespace: &str,
    records: Vec<VectorRecord>,
    batching: UpsertBatching,
) -> Result<usize, VectorStoreError> {
    let batch_size = batching.batch_size.max(1);
    let total = records.len();
    let batch_count = total.div_ceil(batch_size);
    let mut remaining = records.into_iter();

    for batch_index in 0..batch_count {
        if batch_index > 0 && !batching.delay.is_zero() {
            tokio::time::sleep(batching.delay).await;
        }
        let batch: Vec<VectorRecord> = remaining.by_ref().take(batch_size).collect();
        let size = batch.len();
        store.upsert(namespace, batch).await.map_err(|e| {
            tracing::error!(namespace, batch = batch_index, "upsert batch failed: {e}");
            VectorStoreError::BatchUpsert {
                batch_index,
                source: Box::new(e),
            }
        })?;
        tracing::debug!(
            namespace,
            batch = batch_index + 1,
            of = batch_count,
            size,
            "upserted batch"
        );
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_and_total() {
        let mut stats = IndexStats::default();
        stats.namespaces.insert("a".into(), 3);
        stats.namespaces.insert("b".into(), 4);
        assert_eq!(stats.count("a"), 3);
        assert_eq!(stats.count("missing"), 0);
        assert_eq!(stats.total(), 7);
    }

    #[test]
    fn batch_upsert_error_names_batch() {
        let err = VectorStoreError::BatchUpsert {
            batch_index: 2,
            source: Box::new(VectorStoreError::Upsert("timeout".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("batch 2"));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn default_batching() {
        let b = UpsertBatching::default();
        assert_eq!(b.batch_size, 100);
        assert_eq!(b.delay, Duration::from_millis(50));
    }
}
