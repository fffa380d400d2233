use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use ragkit_core::error::Result;
use ragkit_core::traits::{QueryGenerator, RetrievalStrategy};
use ragkit_core::types::{compare_scored, Query, RetrievalResult};

use crate::collaborators::DiversityRanker;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MultiQueryConfig {
    pub num_queries: usize,
    /// Search the caller's query alongside the generated variants.
    pub include_original: bool,
}

impl Default for MultiQueryConfig {
    fn default() -> Self { Self { num_queries: 3, include_original: true } }
}

/// Runs the base strategy once per query variant and keeps each document's best score.
pub struct MultiQueryStrategy {
    base: Arc<dyn RetrievalStrategy>,
    generator: Arc<dyn QueryGenerator>,
    diversity: Option<Arc<dyn DiversityRanker>>,
    config: MultiQueryConfig,
}

impl MultiQueryStrategy {
    pub fn new(base: Arc<dyn RetrievalStrategy>, generator: Arc<dyn QueryGenerator>, config: MultiQueryConfig) -> Self {
        Self { base, generator, diversity: None, config }
    }

    pub fn with_diversity(mut self, ranker: Arc<dyn DiversityRanker>) -> Self {
        self.diversity = Some(ranker);
        self
    }

    async fn variants(&self, text: &str) -> Vec<String> {
        let generated = match self.generator.generate_variants(text, self.config.num_queries).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "query generation failed, searching the original query only");
                Vec::new()
            }
        };
        let mut seen = HashSet::new();
        let original = (self.config.include_original || generated.is_empty()).then(|| text.to_string());
        original
            .into_iter()
            .chain(generated.into_iter().take(self.config.num_queries))
            .filter(|q| !q.trim().is_empty() && seen.insert(q.trim().to_lowercase()))
            .collect()
    }
}

#[async_trait]
impl RetrievalStrategy for MultiQueryStrategy {
    fn name(&self) -> &str { "MultiQueryStrategy" }

    async fn search(&self, query: &Query, top_k: usize) -> Result<Vec<RetrievalResult>> {
        if top_k == 0 { return Ok(Vec::new()); }
        let Some(text) = query.text() else {
            return self.base.search(query, top_k).await;
        };
        let queries: Vec<Query> = self.variants(text).await.into_iter().map(Query::Text).collect();
        let outcomes = join_all(queries.iter().map(|q| self.base.search(q, top_k))).await;

        let mut best: HashMap<String, RetrievalResult> = HashMap::new();
        let mut first_error = None;
        let mut succeeded = 0usize;
        for (q, outcome) in queries.iter().zip(outcomes) {
            match outcome {
                Ok(results) => {
                    succeeded += 1;
                    for r in results {
                        match best.get_mut(&r.document.id) {
                            Some(existing) if existing.score >= r.score => {}
                            Some(existing) => *existing = r,
                            None => { best.insert(r.document.id.clone(), r); }
                        }
                    }
                }
                Err(e) => {
                    warn!(variant = ?q.text(), error = %e, "query variant failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        if succeeded == 0 {
            if let Some(e) = first_error { return Err(e); }
        }

        let mut merged: Vec<RetrievalResult> = best.into_values().collect();
        merged.sort_by(|a, b| compare_scored(a.score, &a.document.id, b.score, &b.document.id));
        debug!(variants = queries.len(), unique = merged.len(), "multi-query merge");
        let mut out = match &self.diversity {
            Some(ranker) => ranker.select(merged, top_k),
            None => merged,
        };
        out.truncate(top_k);
        for (rank, r) in out.iter_mut().enumerate() { r.rank = rank; }
        Ok(out)
    }
}
