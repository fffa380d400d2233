use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use ragkit_core::error::{Error, Result};
use ragkit_core::traits::{Reranker, RetrievalStrategy};
use ragkit_core::types::{rank_hits, Query, RetrievalResult, SearchHit};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub initial_top_k: usize,
    pub final_top_k: usize,
    /// Reranker calls in flight at once.
    pub concurrency: usize,
}

impl Default for RerankConfig {
    fn default() -> Self { Self { initial_top_k: 20, final_top_k: 5, concurrency: 4 } }
}

/// Cheap first pass, expensive second pass over at most `initial_top_k` candidates.
pub struct RerankedStrategy {
    base: Arc<dyn RetrievalStrategy>,
    reranker: Arc<dyn Reranker>,
    config: RerankConfig,
}

impl RerankedStrategy {
    pub fn new(base: Arc<dyn RetrievalStrategy>, reranker: Arc<dyn Reranker>, config: RerankConfig) -> Result<Self> {
        if config.initial_top_k <= config.final_top_k {
            return Err(Error::InvalidConfig(format!(
                "initial_top_k ({}) must be greater than final_top_k ({})",
                config.initial_top_k, config.final_top_k
            )));
        }
        Ok(Self { base, reranker, config })
    }
}

#[async_trait]
impl RetrievalStrategy for RerankedStrategy {
    fn name(&self) -> &str { "RerankedStrategy" }

    async fn search(&self, query: &Query, top_k: usize) -> Result<Vec<RetrievalResult>> {
        let out_k = top_k.min(self.config.final_top_k);
        if out_k == 0 { return Ok(Vec::new()); }
        let candidates = self.base.search(query, self.config.initial_top_k).await?;
        let hits: Vec<SearchHit> = candidates.into_iter().map(|r| SearchHit::new(r.document, r.score)).collect();

        let Some(text) = query.text() else {
            return Ok(rank_hits(hits, out_k));
        };
        let reranker = &self.reranker;
        let hits_ref = &hits;
        let scores: Vec<anyhow::Result<f32>> = stream::iter(0..hits.len())
            .map(|i| async move { reranker.score(text, &hits_ref[i]).await })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut failed = 0usize;
        let rescored: Vec<SearchHit> = hits
            .into_iter()
            .zip(scores)
            .map(|(hit, score)| match score {
                Ok(s) => SearchHit::new(hit.document, s),
                Err(e) => {
                    failed += 1;
                    warn!(id = %hit.document.id, error = %e, "rerank failed, keeping similarity score");
                    hit
                }
            })
            .collect();
        debug!(candidates = rescored.len(), failed, out_k, "reranked");
        Ok(rank_hits(rescored, out_k))
    }
}
