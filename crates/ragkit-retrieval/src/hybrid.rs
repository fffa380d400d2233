use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use ragkit_core::error::{Error, Result};
use ragkit_core::traits::RetrievalStrategy;
use ragkit_core::types::{Document, Query, RetrievalResult};

use crate::fusion::{fuse, Candidate, FusionMethod, RankedList, RRF_K};

/// A child strategy and its fusion weight.
pub struct WeightedStrategy {
    pub strategy: Arc<dyn RetrievalStrategy>,
    pub weight: f32,
}

/// Runs child strategies concurrently and fuses their ranked lists.
/// Children may themselves be hybrids.
pub struct HybridUniversalStrategy {
    children: Vec<WeightedStrategy>,
    method: FusionMethod,
    rrf_k: f32,
}

impl HybridUniversalStrategy {
    pub fn new(children: Vec<WeightedStrategy>, method: FusionMethod) -> Result<Self> {
        if children.is_empty() {
            return Err(Error::InvalidConfig("hybrid strategy needs at least one sub-strategy".into()));
        }
        Ok(Self { children, method, rrf_k: RRF_K })
    }

    pub fn with_rrf_k(mut self, k: f32) -> Self {
        self.rrf_k = k;
        self
    }
}

#[async_trait]
impl RetrievalStrategy for HybridUniversalStrategy {
    fn name(&self) -> &str { "HybridUniversalStrategy" }

    async fn search(&self, query: &Query, top_k: usize) -> Result<Vec<RetrievalResult>> {
        if top_k == 0 { return Ok(Vec::new()); }
        let outcomes = join_all(self.children.iter().map(|c| c.strategy.search(query, top_k))).await;

        let mut lists = Vec::with_capacity(outcomes.len());
        let mut documents: HashMap<String, Document> = HashMap::new();
        let mut first_error = None;
        for (child, outcome) in self.children.iter().zip(outcomes) {
            match outcome {
                Ok(results) => {
                    let candidates = results
                        .into_iter()
                        .map(|r| {
                            let c = Candidate { id: r.document.id.clone(), score: r.score, rank: r.rank };
                            documents.entry(c.id.clone()).or_insert(r.document);
                            c
                        })
                        .collect();
                    lists.push(RankedList { weight: child.weight, candidates });
                }
                Err(e) => {
                    warn!(strategy = child.strategy.name(), error = %e, "sub-strategy failed, fusing the rest");
                    first_error.get_or_insert(e);
                }
            }
        }
        if lists.is_empty() {
            if let Some(e) = first_error { return Err(e); }
        }

        let fused = fuse(&lists, self.method, self.rrf_k);
        debug!(lists = lists.len(), fused = fused.len(), method = ?self.method, "hybrid fusion");
        Ok(fused
            .into_iter()
            .take(top_k)
            .filter_map(|(id, score)| documents.remove(&id).map(|document| (document, score)))
            .enumerate()
            .map(|(rank, (document, score))| RetrievalResult { document, score, rank })
            .collect())
    }
}
