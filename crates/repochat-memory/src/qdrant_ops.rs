//! Qdrant-backed `VectorStore`: one collection, namespaces as a payload field.

use std::collections::HashMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, PointId, PointStruct, ScoredPoint,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
    value::Kind,
};
use serde_json::json;

use crate::error::MemoryError;
use crate::vector_store::{
    BoxFuture, IndexStats, QueryMatch, RecordMetadata, VectorRecord, VectorStore, VectorStoreError,
};

const NAMESPACE_FIELD: &str = "namespace";
const SOURCE_FIELD: &str = "source";
const TEXT_FIELD: &str = "text";
const SCROLL_PAGE: u32 = 256;

type QdrantResult<T> = Result<T, Box<qdrant_client::QdrantError>>;

/// Thin wrapper over [`Qdrant`] bound to the configured index collection.
#[derive(Clone)]
pub struct QdrantOps {
    client: Qdrant,
    collection: String,
}

impl std::fmt::Debug for QdrantOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantOps")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl QdrantOps {
    /// Create a new `QdrantOps` connected to the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be created.
    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection: impl Into<String>,
    ) -> Result<Self, MemoryError> {
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .build()
            .map_err(Box::new)?;
        Ok(Self {
            client,
            collection: collection.into(),
        })
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn collection_exists(&self) -> QdrantResult<bool> {
        self.client
            .collection_exists(&self.collection)
            .await
            .map_err(Box::new)
    }

    /// Create the collection with cosine distance and a keyword index on the
    /// namespace field. Idempotent.
    async fn ensure_collection(&self, vector_size: u64) -> QdrantResult<()> {
        if self.collection_exists().await? {
            return Ok(());
        }
        tracing::info!(
            collection = %self.collection,
            vector_size,
            "creating vector collection"
        );
        let created = self
            .client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await;
        if let Err(e) = created {
            // Lost a creation race with a concurrent ingestion.
            if self.collection_exists().await? {
                return Ok(());
            }
            return Err(Box::new(e));
        }
        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                &self.collection,
                NAMESPACE_FIELD,
                FieldType::Keyword,
            ))
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    async fn upsert_records(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> Result<(), VectorStoreError> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        self.ensure_collection(first.vector.len() as u64)
            .await
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;

        let points = records
            .into_iter()
            .map(|r| {
                let payload = json_to_payload(json!({
                    NAMESPACE_FIELD: namespace,
                    SOURCE_FIELD: r.metadata.source,
                    TEXT_FIELD: r.metadata.text,
                }))
                .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                Ok(PointStruct::new(r.id, r.vector, payload))
            })
            .collect::<Result<Vec<_>, VectorStoreError>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
        Ok(())
    }

    async fn search(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: u64,
        include_metadata: bool,
    ) -> QdrantResult<Vec<ScoredPoint>> {
        if !self.collection_exists().await? {
            return Ok(Vec::new());
        }
        let builder = SearchPointsBuilder::new(&self.collection, vector, top_k)
            .filter(namespace_filter(namespace))
            .with_payload(include_metadata);
        let results = self.client.search_points(builder).await.map_err(Box::new)?;
        Ok(results.result)
    }

    async fn count(&self, namespace: &str) -> QdrantResult<u64> {
        if !self.collection_exists().await? {
            return Ok(0);
        }
        let response = self
            .client
            .count(
                CountPointsBuilder::new(&self.collection)
                    .filter(namespace_filter(namespace))
                    .exact(true),
            )
            .await
            .map_err(Box::new)?;
        Ok(response.result.map_or(0, |r| r.count))
    }

    /// Walk the whole collection and tally records per namespace.
    async fn count_all(&self) -> QdrantResult<IndexStats> {
        let mut stats = IndexStats::default();
        if !self.collection_exists().await? {
            return Ok(stats);
        }
        let mut offset: Option<PointId> = None;

        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .with_payload(true)
                .with_vectors(false)
                .limit(SCROLL_PAGE);

            if let Some(off) = offset.take() {
                builder = builder.offset(off);
            }

            let response = self.client.scroll(builder).await.map_err(Box::new)?;

            for point in &response.result {
                if let Some(ns) = string_field(&point.payload, NAMESPACE_FIELD) {
                    *stats.namespaces.entry(ns.to_owned()).or_insert(0) += 1;
                }
            }

            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(stats)
    }

    async fn delete_by_namespace(&self, namespace: &str) -> QdrantResult<()> {
        if !self.collection_exists().await? {
            return Ok(());
        }
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(namespace_filter(namespace))
                    .wait(true),
            )
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    async fn drop_collection(&self) -> QdrantResult<()> {
        if !self.collection_exists().await? {
            return Ok(());
        }
        self.client
            .delete_collection(&self.collection)
            .await
            .map_err(Box::new)?;
        Ok(())
    }
}

/// Convert a JSON object to a Qdrant payload map.
fn json_to_payload(
    value: serde_json::Value,
) -> Result<HashMap<String, qdrant_client::qdrant::Value>, serde_json::Error> {
    serde_json::from_value(value)
}

fn namespace_filter(namespace: &str) -> Filter {
    Filter::must([Condition::matches(NAMESPACE_FIELD, namespace.to_owned())])
}

fn string_field<'a>(
    payload: &'a HashMap<String, qdrant_client::qdrant::Value>,
    key: &str,
) -> Option<&'a str> {
    match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => Some(s),
        _ => None,
    }
}

fn scored_point_to_match(point: ScoredPoint) -> QueryMatch {
    let metadata = match (
        string_field(&point.payload, SOURCE_FIELD),
        string_field(&point.payload, TEXT_FIELD),
    ) {
        (Some(source), Some(text)) => Some(RecordMetadata {
            source: source.to_owned(),
            text: text.to_owned(),
        }),
        _ => None,
    };

    let id = match point.id.and_then(|pid| pid.point_id_options) {
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    };

    QueryMatch {
        id,
        score: point.score,
        metadata,
    }
}

impl VectorStore for QdrantOps {
    fn upsert(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move { self.upsert_records(&namespace, records).await })
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
            let results = self
                .search(&namespace, vector, top_k, include_metadata)
                .await
                .map_err(|e| VectorStoreError::Query(e.to_string()))?;
            Ok(results.into_iter().map(scored_point_to_match).collect())
        })
    }

    fn describe_stats(
        &self,
        namespace: Option<&str>,
    ) -> BoxFuture<'_, Result<IndexStats, VectorStoreError>> {
        let namespace = namespace.map(str::to_owned);
        Box::pin(async move {
            match namespace {
                Some(ns) => {
                    let count = self
                        .count(&ns)
                        .await
                        .map_err(|e| VectorStoreError::Stats(e.to_string()))?;
                    let mut stats = IndexStats::default();
                    stats.namespaces.insert(ns, count);
                    Ok(stats)
                }
                None => self
                    .count_all()
                    .await
                    .map_err(|e| VectorStoreError::Stats(e.to_string())),
            }
        })
    }

    fn delete_namespace(&self, namespace: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let namespace = namespace.to_owned();
        Box::pin(async move {
            self.delete_by_namespace(&namespace)
                .await
                .map_err(|e| VectorStoreError::Delete(e.to_string()))
        })
    }

    fn delete_all(&self) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            self.drop_collection()
                .await
                .map_err(|e| VectorStoreError::Delete(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use qdrant_client::qdrant::point_id::PointIdOptions;

    use super::*;

    fn value(s: &str) -> qdrant_client::qdrant::Value {
        qdrant_client::qdrant::Value {
            kind: Some(Kind::StringValue(s.to_owned())),
        }
    }

    #[test]
    fn new_valid_url() {
        let ops = QdrantOps::new("http://localhost:6334", None, "repochat");
        assert!(ops.is_ok());
        assert_eq!(ops.unwrap().collection(), "repochat");
    }

    #[test]
    fn new_invalid_url() {
        let ops = QdrantOps::new("not a valid url", None, "repochat");
        assert!(ops.is_err());
    }

    #[test]
    fn debug_shows_collection_only() {
        let ops = QdrantOps::new("http://localhost:6334", Some("secret-key".into()), "idx").unwrap();
        let dbg = format!("{ops:?}");
        assert!(dbg.contains("idx"));
        assert!(!dbg.contains("secret-key"));
    }

    #[test]
    fn payload_from_json_object() {
        let payload = json_to_payload(json!({"namespace": "repo", "source": "a.rs"})).unwrap();
        assert_eq!(string_field(&payload, "namespace"), Some("repo"));
        assert_eq!(string_field(&payload, "missing"), None);
    }

    #[test]
    fn scored_point_maps_metadata_and_uuid() {
        let mut payload = HashMap::new();
        payload.insert(SOURCE_FIELD.to_owned(), value("src/lib.rs"));
        payload.insert(TEXT_FIELD.to_owned(), value("pub fn x() {}"));
        let point = ScoredPoint {
            id: Some(PointId {
                point_id_options: Some(PointIdOptions::Uuid("abc".into())),
            }),
            payload,
            score: 0.75,
            ..Default::default()
        };

        let m = scored_point_to_match(point);
        assert_eq!(m.id, "abc");
        assert!((m.score - 0.75).abs() < f32::EPSILON);
        let meta = m.metadata.unwrap();
        assert_eq!(meta.source, "src/lib.rs");
        assert_eq!(meta.text, "pub fn x() {}");
    }

    #[test]
    fn scored_point_without_payload_has_no_metadata() {
        let point = ScoredPoint {
            id: Some(PointId {
                point_id_options: Some(PointIdOptions::Num(7)),
            }),
            ..Default::default()
        };
        let m = scored_point_to_match(point);
        assert_eq!(m.id, "7");
        assert!(m.metadata.is_none());
    }

    #[tokio::test]
    async fn unreachable_server_surfaces_stats_error() {
        let ops = QdrantOps::new("http://127.0.0.1:1", None, "repochat").unwrap();
        let err = ops.describe_stats(Some("repo")).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Stats(_)));
    }
}
