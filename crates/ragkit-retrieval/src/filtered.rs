use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use ragkit_core::error::Result;
use ragkit_core::filter::MetadataFilter;
use ragkit_core::traits::{Embedder, RetrievalStrategy, VectorStore};
use ragkit_core::types::{rank_hits, Query, RetrievalResult};

use crate::basic::{apply_threshold, query_vector};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilteredConfig {
    /// Candidate multiplier when the store cannot filter natively.
    pub over_fetch_factor: usize,
    /// Run an unfiltered search when the filter matches nothing.
    pub fallback: bool,
    pub score_threshold: Option<f32>,
}

impl Default for FilteredConfig {
    fn default() -> Self { Self { over_fetch_factor: 3, fallback: false, score_threshold: None } }
}

/// Similarity search restricted by a metadata predicate.
///
/// The filter is pushed down to stores that support it; otherwise an
/// over-fetched candidate set is filtered here.
pub struct MetadataFilteredStrategy {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    filter: MetadataFilter,
    config: FilteredConfig,
}

impl MetadataFilteredStrategy {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, filter: MetadataFilter, config: FilteredConfig) -> Self {
        Self { store, embedder, filter, config }
    }
}

#[async_trait]
impl RetrievalStrategy for MetadataFilteredStrategy {
    fn name(&self) -> &str { "MetadataFilteredStrategy" }

    async fn search(&self, query: &Query, top_k: usize) -> Result<Vec<RetrievalResult>> {
        if top_k == 0 { return Ok(Vec::new()); }
        let vector = query_vector(self.embedder.as_ref(), query).await?;
        let mut hits = if self.store.supports_filtering() {
            self.store.search(&vector, top_k, Some(&self.filter)).await?
        } else {
            let fetch = top_k.saturating_mul(self.config.over_fetch_factor.max(1));
            let mut candidates = self.store.search(&vector, fetch, None).await?;
            candidates.retain(|h| self.filter.matches(&h.document.metadata));
            debug!(fetched = fetch, kept = candidates.len(), "post-filtered candidates");
            candidates
        };
        if hits.is_empty() && self.config.fallback {
            info!(store = self.store.name(), "filter matched nothing, falling back to unfiltered search");
            hits = self.store.search(&vector, top_k, None).await?;
        }
        apply_threshold(&mut hits, self.config.score_threshold);
        Ok(rank_hits(hits, top_k))
    }
}
