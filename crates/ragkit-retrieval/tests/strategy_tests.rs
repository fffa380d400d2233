use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ragkit_core::error::{Error, Result};
use ragkit_core::filter::MetadataFilter;
use ragkit_core::traits::{DeleteSelector, Embedder, QueryGenerator, Reranker, RetrievalStrategy, VectorStore};
use ragkit_core::types::{DocId, Document, Query, RetrievalResult, SearchHit};
use ragkit_embed::HashEmbedder;
use ragkit_retrieval::*;
use ragkit_vector::{MemoryStore, MemoryStoreConfig};

/// Returns canned results per query text.
struct Canned {
    by_query: HashMap<String, Vec<(&'static str, f32)>>,
    fail: bool,
}

impl Canned {
    fn new(entries: &[(&str, Vec<(&'static str, f32)>)]) -> Arc<Self> {
        Arc::new(Self { by_query: entries.iter().map(|(q, r)| (q.to_string(), r.clone())).collect(), fail: false })
    }

    fn failing() -> Arc<Self> { Arc::new(Self { by_query: HashMap::new(), fail: true }) }
}

#[async_trait]
impl RetrievalStrategy for Canned {
    fn name(&self) -> &str { "Canned" }

    async fn search(&self, query: &Query, top_k: usize) -> Result<Vec<RetrievalResult>> {
        if self.fail { return Err(Error::store("backend offline")); }
        let key = query.text().unwrap_or("*");
        let rows = self.by_query.get(key).or_else(|| self.by_query.get("*")).cloned().unwrap_or_default();
        Ok(rows
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(rank, (id, score))| RetrievalResult { document: Document::with_id(id, format!("text {id}")), score, rank })
            .collect())
    }
}

struct FixedVariants(Vec<&'static str>);

#[async_trait]
impl QueryGenerator for FixedVariants {
    async fn generate_variants(&self, _query: &str, n: usize) -> anyhow::Result<Vec<String>> {
        Ok(self.0.iter().take(n).map(|s| s.to_string()).collect())
    }
}

fn ids(results: &[RetrievalResult]) -> Vec<&str> {
    results.iter().map(|r| r.document.id.as_str()).collect()
}

async fn seeded_store(embedder: &HashEmbedder) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new(MemoryStoreConfig::default()));
    let rows = [
        ("fire-1", "dry tinder catches fire quickly", "fire"),
        ("fire-2", "a fire needs oxygen fuel and heat", "fire"),
        ("water-1", "boil water to purify it", "water"),
        ("water-2", "water filters remove sediment", "water"),
    ];
    let mut docs = Vec::new();
    for (id, text, category) in rows {
        let mut d = Document::with_id(id, text).with_metadata("category", category);
        d.embedding = Some(embedder.embed_query(text).await.unwrap());
        docs.push(d);
    }
    store.add(&docs).await.unwrap();
    store
}

#[tokio::test]
async fn multi_query_keeps_max_score_per_document() {
    let base = Canned::new(&[
        ("v1", vec![("D", 0.9), ("E", 0.5)]),
        ("v2", vec![("D", 0.95), ("F", 0.7)]),
    ]);
    let strategy = MultiQueryStrategy::new(
        base,
        Arc::new(FixedVariants(vec!["v1", "v2"])),
        MultiQueryConfig { num_queries: 2, include_original: false },
    );
    let out = strategy.search(&Query::from("original"), 10).await.unwrap();
    assert_eq!(ids(&out), vec!["D", "F", "E"]);
    assert_eq!(out[0].score, 0.95);
    assert_eq!(out.iter().filter(|r| r.document.id == "D").count(), 1);
    assert_eq!(out.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![0, 1, 2]);
}

#[tokio::test]
async fn multi_query_diversity_only_selects_from_candidates() {
    let base = Canned::new(&[("*", vec![("A", 0.9), ("B", 0.8), ("C", 0.7)])]);
    let strategy = MultiQueryStrategy::new(base, Arc::new(TemplateQueryGenerator), MultiQueryConfig::default())
        .with_diversity(Arc::new(JaccardDiversityRanker::default()));
    let out = strategy.search(&Query::from("fire"), 2).await.unwrap();
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|r| ["A", "B", "C"].contains(&r.document.id.as_str())));
}

#[tokio::test]
async fn multi_query_fails_only_when_every_variant_fails() {
    let strategy = MultiQueryStrategy::new(Canned::failing(), Arc::new(FixedVariants(vec!["v1"])), MultiQueryConfig::default());
    assert!(strategy.search(&Query::from("q"), 5).await.is_err());
}

struct FlakyReranker {
    calls: AtomicUsize,
}

#[async_trait]
impl Reranker for FlakyReranker {
    async fn score(&self, _query: &str, candidate: &SearchHit) -> anyhow::Result<f32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match candidate.document.id.as_str() {
            "C" => anyhow::bail!("model overloaded"),
            "B" => Ok(0.99),
            _ => Ok(0.1),
        }
    }
}

#[tokio::test]
async fn rerank_failure_keeps_similarity_score() {
    let base = Canned::new(&[("*", vec![("A", 0.9), ("B", 0.8), ("C", 0.5), ("D", 0.4), ("E", 0.3)])]);
    let reranker = Arc::new(FlakyReranker { calls: AtomicUsize::new(0) });
    let strategy = RerankedStrategy::new(base, reranker.clone(), RerankConfig { initial_top_k: 4, final_top_k: 3, concurrency: 2 }).unwrap();
    let out = strategy.search(&Query::from("q"), 10).await.unwrap();

    assert_eq!(reranker.calls.load(Ordering::SeqCst), 4, "never more calls than candidates retrieved");
    assert_eq!(ids(&out), vec!["B", "C", "A"]);
    assert_eq!(out[1].score, 0.5);
}

#[test]
fn rerank_requires_initial_above_final() {
    let base = Canned::new(&[]);
    let reranker = Arc::new(LexicalOverlapReranker::default());
    assert!(RerankedStrategy::new(base, reranker, RerankConfig { initial_top_k: 5, final_top_k: 5, concurrency: 1 }).is_err());
}

#[tokio::test]
async fn hybrid_rrf_fuses_child_rankings() {
    let a = Canned::new(&[("*", vec![("X", 0.9), ("Y", 0.8)])]);
    let b = Canned::new(&[("*", vec![("Y", 0.7), ("Z", 0.6)])]);
    let hybrid = HybridUniversalStrategy::new(
        vec![WeightedStrategy { strategy: a, weight: 0.5 }, WeightedStrategy { strategy: b, weight: 0.5 }],
        FusionMethod::Rrf,
    )
    .unwrap();
    let out = hybrid.search(&Query::from("q"), 2).await.unwrap();
    assert_eq!(ids(&out), vec!["Y", "X"]);
    assert!((out[0].score - (1.0 / 61.0 + 1.0 / 60.0)).abs() < 1e-6);
}

#[tokio::test]
async fn hybrid_tolerates_a_failing_child_and_nests() {
    let ok = Canned::new(&[("*", vec![("X", 0.9), ("Y", 0.2)])]);
    let inner = Arc::new(
        HybridUniversalStrategy::new(
            vec![WeightedStrategy { strategy: ok, weight: 1.0 }, WeightedStrategy { strategy: Canned::failing(), weight: 1.0 }],
            FusionMethod::Weighted,
        )
        .unwrap(),
    );
    let outer = HybridUniversalStrategy::new(vec![WeightedStrategy { strategy: inner, weight: 1.0 }], FusionMethod::Weighted).unwrap();
    let out = outer.search(&Query::from("q"), 5).await.unwrap();
    assert_eq!(ids(&out), vec!["X", "Y"]);

    let all_bad = HybridUniversalStrategy::new(vec![WeightedStrategy { strategy: Canned::failing(), weight: 1.0 }], FusionMethod::Rrf).unwrap();
    assert!(all_bad.search(&Query::from("q"), 5).await.is_err());
    assert!(HybridUniversalStrategy::new(Vec::new(), FusionMethod::Rrf).is_err());
}

#[tokio::test]
async fn basic_search_ranks_and_applies_threshold() {
    let embedder = HashEmbedder::new(128);
    let store = seeded_store(&embedder).await;
    let basic = BasicSimilarityStrategy::new(store.clone(), Arc::new(HashEmbedder::new(128)), BasicConfig::default());
    let out = basic.search(&Query::from("dry tinder fire"), 2).await.unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].document.id, "fire-1");
    assert!(out[0].score >= out[1].score);

    let strict = BasicSimilarityStrategy::new(store, Arc::new(HashEmbedder::new(128)), BasicConfig { score_threshold: Some(1.01) });
    assert!(strict.search(&Query::from("dry tinder fire"), 2).await.unwrap().is_empty());
}

/// Delegates to a memory store but claims no native filtering.
struct NoNativeFilter(Arc<MemoryStore>);

#[async_trait]
impl VectorStore for NoNativeFilter {
    fn name(&self) -> &str { "NoNativeFilter" }
    fn supports_filtering(&self) -> bool { false }
    async fn add(&self, documents: &[Document]) -> Result<()> { self.0.add(documents).await }
    async fn search(&self, v: &[f32], top_k: usize, filter: Option<&MetadataFilter>) -> Result<Vec<SearchHit>> {
        assert!(filter.is_none(), "filter must not be pushed down");
        self.0.search(v, top_k, None).await
    }
    async fn delete(&self, selector: &DeleteSelector) -> Result<usize> { self.0.delete(selector).await }
    async fn get(&self, ids: &[DocId]) -> Result<Vec<Document>> { self.0.get(ids).await }
    async fn count(&self) -> Result<usize> { self.0.count().await }
}

#[tokio::test]
async fn filtered_search_pre_and_post_filters() {
    let embedder = HashEmbedder::new(128);
    let memory = seeded_store(&embedder).await;
    let water = MetadataFilter::from_value(&json!({"category": "water"})).unwrap();

    let stores: [Arc<dyn VectorStore>; 2] = [memory.clone(), Arc::new(NoNativeFilter(memory.clone()))];
    for store in stores {
        let s = MetadataFilteredStrategy::new(store, Arc::new(HashEmbedder::new(128)), water.clone(), FilteredConfig::default());
        let out = s.search(&Query::from("dry tinder fire"), 2).await.unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.document.metadata["category"] == "water"));
    }
}

#[tokio::test]
async fn filtered_search_falls_back_when_nothing_matches() {
    let embedder = HashEmbedder::new(128);
    let memory = seeded_store(&embedder).await;
    let none = MetadataFilter::eq("category", "medicine");

    let strict = MetadataFilteredStrategy::new(memory.clone(), Arc::new(HashEmbedder::new(128)), none.clone(), FilteredConfig::default());
    assert!(strict.search(&Query::from("fire"), 3).await.unwrap().is_empty());

    let lenient = MetadataFilteredStrategy::new(memory, Arc::new(HashEmbedder::new(128)), none, FilteredConfig { fallback: true, ..FilteredConfig::default() });
    assert_eq!(lenient.search(&Query::from("fire"), 3).await.unwrap().len(), 3);
}
