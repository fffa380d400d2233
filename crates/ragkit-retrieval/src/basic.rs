use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use ragkit_core::error::Result;
use ragkit_core::traits::{Embedder, RetrievalStrategy, VectorStore};
use ragkit_core::types::{rank_hits, Query, RetrievalResult, SearchHit};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    /// Hits scoring below this are dropped.
    pub score_threshold: Option<f32>,
}

/// Embed a text query, or pass a vector query through.
pub async fn query_vector(embedder: &dyn Embedder, query: &Query) -> Result<Vec<f32>> {
    match query {
        Query::Vector(v) => Ok(v.clone()),
        Query::Text(t) => Ok(embedder.embed_query(t).await?),
    }
}

pub(crate) fn apply_threshold(hits: &mut Vec<SearchHit>, threshold: Option<f32>) {
    if let Some(min) = threshold {
        hits.retain(|h| h.score >= min);
    }
}

/// Plain nearest-neighbour search against the store.
pub struct BasicSimilarityStrategy {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    config: BasicConfig,
}

impl BasicSimilarityStrategy {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, config: BasicConfig) -> Self {
        Self { store, embedder, config }
    }
}

#[async_trait]
impl RetrievalStrategy for BasicSimilarityStrategy {
    fn name(&self) -> &str { "BasicSimilarityStrategy" }

    async fn search(&self, query: &Query, top_k: usize) -> Result<Vec<RetrievalResult>> {
        if top_k == 0 { return Ok(Vec::new()); }
        let vector = query_vector(self.embedder.as_ref(), query).await?;
        let mut hits = self.store.search(&vector, top_k, None).await?;
        apply_threshold(&mut hits, self.config.score_threshold);
        debug!(store = self.store.name(), hits = hits.len(), top_k, "basic search");
        Ok(rank_hits(hits, top_k))
    }
}
