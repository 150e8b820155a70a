use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::vector_store::{
    BoxFuture, IndexStats, QueryMatch, RecordMetadata, VectorRecord, VectorStore, VectorStoreError,
};

struct StoredRecord {
    vector: Vec<f32>,
    metadata: RecordMetadata,
}

/// Process-local `VectorStore` with the same namespace semantics as the Qdrant one.
pub struct InMemoryVectorStore {
    namespaces: RwLock<HashMap<String, BTreeMap<String, StoredRecord>>>,
    upsert_calls: AtomicUsize,
    fail_upsert_at: Option<usize>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            upsert_calls: AtomicUsize::new(0),
            fail_upsert_at: None,
        }
    }

    /// Store whose `n`-th upsert call (zero-based) fails; earlier calls succeed.
    #[must_use]
    pub fn failing_upsert_at(n: usize) -> Self {
        Self {
            fail_upsert_at: Some(n),
            ..Self::new()
        }
    }

    /// Number of `upsert` calls received so far.
    #[must_use]
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .field("upsert_calls", &self.upsert_calls())
            .finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorStore for InMemoryVectorStore {
    fn upsert(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move {
            let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_upsert_at == Some(call) {
                return Err(VectorStoreError::Upsert("injected upsert failure".into()));
            }
            let mut namespaces = self
                .namespaces
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            let ns = namespaces.entry(namespace).or_default();
            for r in records {
                ns.insert(
                    r.id,
                    StoredRecord {
                        vector: r.vector,
                        metadata: r.metadata,
                    },
                );
            }
            Ok(())
        })
    }

    fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: u64,
        include_metadata: bool,
    ) -> BoxFuture<'_, Result<Vec<QueryMatch>, VectorStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move {
            let namespaces = self
                .namespaces
                .read()
                .map_err(|e| VectorStoreError::Query(e.to_string()))?;
            let Some(ns) = namespaces.get(&namespace) else {
                return Ok(Vec::new());
            };
            let mut matches: Vec<QueryMatch> = ns
                .iter()
                .map(|(id, r)| QueryMatch {
                    id: id.clone(),
                    score: cosine_similarity(&vector, &r.vector),
                    metadata: include_metadata.then(|| r.metadata.clone()),
                })
                .collect();
            matches.sort_by(|a, b| b.score.total_cmp(&a.score));
            matches.truncate(usize::try_from(top_k).unwrap_or(usize::MAX));
            Ok(matches)
        })
    }

    fn describe_stats(
        &self,
        namespace: Option<&str>,
    ) -> BoxFuture<'_, Result<IndexStats, VectorStoreError>> {
        let namespace = namespace.map(str::to_owned);
        Box::pin(async move {
            let namespaces = self
                .namespaces
                .read()
                .map_err(|e| VectorStoreError::Stats(e.to_string()))?;
            let count = |records: &BTreeMap<String, StoredRecord>| records.len() as u64;
            let mut stats = IndexStats::default();
            match namespace {
                Some(ns) => {
                    let n = namespaces.get(&ns).map_or(0, count);
                    stats.namespaces.insert(ns, n);
                }
                None => {
                    for (ns, records) in namespaces.iter().filter(|(_, r)| !r.is_empty()) {
                        stats.namespaces.insert(ns.clone(), count(records));
                    }
                }
            }
            Ok(stats)
        })
    }

    fn delete_namespace(&self, namespace: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move {
            self.namespaces
                .write()
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?
                .remove(&namespace);
            Ok(())
        })
    }

    fn delete_all(&self) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            self.namespaces
                .write()
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?
                .clear();
            Ok(())
        })
    }
}
