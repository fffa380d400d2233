use serde_json::json;
use tempfile::TempDir;

use ragkit_core::filter::MetadataFilter;
use ragkit_core::traits::{DeleteSelector, VectorStore};
use ragkit_core::types::Document;
use ragkit_vector::{LanceDBConfig, LanceDBStore, MemoryStore, MemoryStoreConfig};

fn doc(id: &str, vector: Vec<f32>, category: &str) -> Document {
    let mut d = Document::with_id(id, format!("content of {id}"))
        .with_metadata("category", category)
        .with_metadata("extractors", json!({"entities": {"PERSON": ["Alice"]}, "stats": {"word_count": 3}}));
    d.source = format!("/kb/{id}.txt");
    d.embedding = Some(vector);
    d
}

fn corpus() -> Vec<Document> {
    vec![
        doc("a", vec![1.0, 0.0, 0.0], "fire"),
        doc("b", vec![0.8, 0.2, 0.0], "fire"),
        doc("c", vec![0.0, 1.0, 0.0], "water"),
        doc("d", vec![0.0, 0.0, 1.0], "water"),
    ]
}

async fn exercise_store(store: &dyn VectorStore) {
    let docs = corpus();
    store.add(&docs).await.expect("add");
    store.add(&docs).await.expect("re-add");
    assert_eq!(store.count().await.unwrap(), 4, "re-adding the same ids overwrites");

    let hits = store.search(&[1.0, 0.0, 0.0], 2, None).await.expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].document.id, "a");
    assert_eq!(hits[1].document.id, "b");
    assert!(hits[0].score >= hits[1].score);

    let stored = store.get(&["a".to_string()]).await.unwrap();
    assert_eq!(stored[0].metadata, docs[0].metadata, "nested metadata round-trips");
    assert_eq!(stored[0].source, "/kb/a.txt");

    let water = MetadataFilter::eq("category", "water");
    let removed = store.delete(&DeleteSelector::Filter(water)).await.unwrap();
    assert_eq!(removed, 2);
    let removed = store.delete(&DeleteSelector::Ids(vec!["a".into(), "zzz".into()])).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn memory_store_contract() {
    exercise_store(&MemoryStore::new(MemoryStoreConfig::default())).await;
}

#[tokio::test]
async fn lancedb_store_contract() {
    let tmp = TempDir::new().expect("tmp");
    let store = LanceDBStore::new(LanceDBConfig {
        uri: tmp.path().to_string_lossy().to_string(),
        table_name: "documents_test_tmp".into(),
        dimension: 3,
        ..LanceDBConfig::default()
    });
    assert!(!store.supports_filtering());
    assert!(store.search(&[1.0, 0.0, 0.0], 3, None).await.unwrap().is_empty());
    exercise_store(&store).await;
}

#[tokio::test]
async fn memory_store_filters_natively_and_breaks_ties_by_id() {
    let store = MemoryStore::new(MemoryStoreConfig::default());
    let mut docs = corpus();
    docs.push(doc("aa", vec![1.0, 0.0, 0.0], "fire"));
    store.add(&docs).await.unwrap();

    let hits = store.search(&[1.0, 0.0, 0.0], 10, Some(&MetadataFilter::eq("category", "fire"))).await.unwrap();
    let ids: Vec<_> = hits.iter().map(|h| h.document.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "aa", "b"]);
    assert_eq!(store.search(&[1.0, 0.0, 0.0], 0, None).await.unwrap().len(), 0);
}

#[tokio::test]
async fn memory_store_rejects_missing_embedding_and_bad_dimension() {
    let store = MemoryStore::new(MemoryStoreConfig::default());
    assert!(store.add(&[Document::with_id("x", "no vector")]).await.is_err());
    store.add(&corpus()).await.unwrap();
    assert!(store.add(&[doc("e", vec![1.0, 0.0], "fire")]).await.is_err());
    assert!(store.search(&[1.0], 1, None).await.is_err());
}

#[tokio::test]
async fn lancedb_ties_at_the_cutoff_resolve_by_id() {
    let tmp = TempDir::new().expect("tmp");
    let store = LanceDBStore::new(LanceDBConfig {
        uri: tmp.path().to_string_lossy().to_string(),
        table_name: "ties".into(),
        dimension: 3,
        ..LanceDBConfig::default()
    });
    let mut docs: Vec<Document> = (0..12).map(|i| doc(&format!("t{i:02}"), vec![0.0, 1.0, 0.0], "same")).collect();
    docs.reverse();
    store.add(&docs).await.unwrap();

    let hits = store.search(&[0.0, 1.0, 0.0], 2, None).await.unwrap();
    let ids: Vec<_> = hits.iter().map(|h| h.document.id.as_str()).collect();
    assert_eq!(ids, vec!["t00", "t01"]);
}
