use repochat_memory::{QdrantOps, RecordMetadata, VectorRecord, VectorStore};
use testcontainers::ContainerAsync;
use testcontainers::GenericImage;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;

const QDRANT_GRPC_PORT: ContainerPort = ContainerPort::Tcp(6334);

fn qdrant_image() -> GenericImage {
    GenericImage::new("qdrant/qdrant", "v1.16.0")
        .with_wait_for(WaitFor::message_on_stdout("gRPC listening"))
        .with_exposed_port(QDRANT_GRPC_PORT)
}

async fn setup() -> (QdrantOps, ContainerAsync<GenericImage>) {
    let container = qdrant_image().start().await.unwrap();
    let grpc_port = container.get_host_port_ipv4(6334).await.unwrap();
    let url = format!("http://127.0.0.1:{grpc_port}");
    let store = QdrantOps::new(&url, None, "repochat_test").unwrap();
    (store, container)
}

fn record(id: &str, vector: [f32; 4], source: &str) -> VectorRecord {
    VectorRecord {
        id: id.to_owned(),
        vector: vector.to_vec(),
        metadata: RecordMetadata {
            source: source.to_owned(),
            text: format!("contents of {source}"),
        },
    }
}

const ID_A: &str = "6f1c3a52-8d1e-5b0e-9a7a-2f1e6c1d0a01";
const ID_B: &str = "6f1c3a52-8d1e-5b0e-9a7a-2f1e6c1d0a02";
const ID_C: &str = "6f1c3a52-8d1e-5b0e-9a7a-2f1e6c1d0a03";

#[tokio::test]
#[ignore = "requires docker"]
async fn empty_index_reads_as_empty() {
    let (store, _container) = setup().await;

    assert_eq!(store.describe_stats(None).await.unwrap().total(), 0);
    assert_eq!(store.describe_stats(Some("ghost")).await.unwrap().count("ghost"), 0);
    let matches = store.query("ghost", vec![0.1, 0.2, 0.3, 0.4], 5, true).await.unwrap();
    assert!(matches.is_empty());
    store.delete_namespace("ghost").await.unwrap();
    store.delete_all().await.unwrap();
}

#[tokio::test]
#[ignore = "requires docker"]
async fn query_is_scoped_to_namespace() {
    let (store, _container) = setup().await;

    store
        .upsert(
            "widgets",
            vec![
                record(ID_A, [1.0, 0.0, 0.0, 0.0], "src/a.rs"),
                record(ID_B, [0.0, 1.0, 0.0, 0.0], "src/b.rs"),
            ],
        )
        .await
        .unwrap();
    store
        .upsert("gadgets", vec![record(ID_C, [1.0, 0.0, 0.0, 0.0], "lib/c.py")])
        .await
        .unwrap();

    let matches = store
        .query("widgets", vec![1.0, 0.1, 0.0, 0.0], 10, true)
        .await
        .unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, ID_A);
    assert!(matches[0].score >= matches[1].score);
    let meta = matches[0].metadata.as_ref().unwrap();
    assert_eq!(meta.source, "src/a.rs");
    assert_eq!(meta.text, "contents of src/a.rs");

    let bare = store
        .query("widgets", vec![1.0, 0.0, 0.0, 0.0], 1, false)
        .await
        .unwrap();
    assert_eq!(bare.len(), 1);
    assert!(bare[0].metadata.is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn upsert_replaces_by_id_and_stats_track_namespaces() {
    let (store, _container) = setup().await;

    store
        .upsert("widgets", vec![record(ID_A, [1.0, 0.0, 0.0, 0.0], "src/a.rs")])
        .await
        .unwrap();
    store
        .upsert("widgets", vec![record(ID_A, [0.0, 1.0, 0.0, 0.0], "src/a.rs")])
        .await
        .unwrap();
    store
        .upsert("gadgets", vec![record(ID_B, [0.0, 0.0, 1.0, 0.0], "lib/b.py")])
        .await
        .unwrap();

    let stats = store.describe_stats(None).await.unwrap();
    assert_eq!(stats.count("widgets"), 1);
    assert_eq!(stats.count("gadgets"), 1);
    assert_eq!(stats.total(), 2);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn purge_namespace_then_everything() {
    let (store, _container) = setup().await;

    store
        .upsert("widgets", vec![record(ID_A, [1.0, 0.0, 0.0, 0.0], "src/a.rs")])
        .await
        .unwrap();
    store
        .upsert("gadgets", vec![record(ID_B, [0.0, 1.0, 0.0, 0.0], "lib/b.py")])
        .await
        .unwrap();

    store.delete_namespace("widgets").await.unwrap();
    let stats = store.describe_stats(None).await.unwrap();
    assert_eq!(stats.count("widgets"), 0);
    assert_eq!(stats.count("gadgets"), 1);

    store.delete_all().await.unwrap();
    assert_eq!(store.describe_stats(None).await.unwrap().total(), 0);

    // The collection is recreated lazily on the next write.
    store
        .upsert("gadgets", vec![record(ID_C, [0.0, 0.0, 0.0, 1.0], "lib/c.py")])
        .await
        .unwrap();
    assert_eq!(store.describe_stats(Some("gadgets")).await.unwrap().count("gadgets"), 1);
}
