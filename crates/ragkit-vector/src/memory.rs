use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use ragkit_core::error::{Error, Result};
use ragkit_core::filter::MetadataFilter;
use ragkit_core::traits::{DeleteSelector, VectorStore};
use ragkit_core::types::{compare_scored, DocId, Document, Metadata, SearchHit};

use crate::codec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Dot,
    Euclidean,
}

impl Metric {
    /// Similarity where higher is better.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => {
                let dot = dot(a, b);
                let na = dot_self(a).sqrt();
                let nb = dot_self(b).sqrt();
                if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
            }
            Metric::Dot => dot(a, b),
            Metric::Euclidean => {
                let d = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt();
                1.0 / (1.0 + d)
            }
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

fn dot_self(a: &[f32]) -> f32 { dot(a, a) }

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemoryStoreConfig {
    pub metric: Metric,
}

struct Stored {
    content: String,
    source: String,
    flat_metadata: Metadata,
    vector: Vec<f32>,
}

impl Stored {
    fn to_document(&self, id: &str) -> Result<Document> {
        Ok(Document {
            id: id.to_string(),
            content: self.content.clone(),
            source: self.source.clone(),
            metadata: codec::decode(&self.flat_metadata)?,
            embedding: Some(self.vector.clone()),
        })
    }
}

/// Brute-force in-process store keyed by document id.
#[derive(Default)]
pub struct MemoryStore {
    metric: Metric,
    rows: RwLock<HashMap<DocId, Stored>>,
}

impl MemoryStore {
    pub fn new(config: MemoryStoreConfig) -> Self {
        Self { metric: config.metric, rows: RwLock::new(HashMap::new()) }
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn name(&self) -> &str { "MemoryStore" }

    fn supports_filtering(&self) -> bool { true }

    async fn add(&self, documents: &[Document]) -> Result<()> {
        let mut staged = Vec::with_capacity(documents.len());
        for doc in documents {
            let vector = doc
                .embedding
                .clone()
                .ok_or_else(|| Error::store(format!("document {} has no embedding", doc.id)))?;
            let flat_metadata = codec::encode(&doc.metadata)?;
            staged.push((doc.id.clone(), Stored { content: doc.content.clone(), source: doc.source.clone(), flat_metadata, vector }));
        }
        let mut rows = self.rows.write().await;
        let dim = rows.values().next().or(staged.first().map(|(_, s)| s)).map(|s| s.vector.len());
        if let Some(dim) = dim {
            if let Some((id, bad)) = staged.iter().find(|(_, s)| s.vector.len() != dim) {
                return Err(Error::store(format!("document {id} has dimension {}, store holds {dim}", bad.vector.len())));
            }
        }
        let n = staged.len();
        rows.extend(staged);
        debug!(added = n, total = rows.len(), "memory store add");
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], top_k: usize, filter: Option<&MetadataFilter>) -> Result<Vec<SearchHit>> {
        if top_k == 0 { return Ok(Vec::new()); }
        let rows = self.rows.read().await;
        let mut scored: Vec<(&DocId, &Stored, f32)> = Vec::new();
        for (id, stored) in rows.iter() {
            if stored.vector.len() != query_vector.len() {
                return Err(Error::store(format!("query has dimension {}, store holds {}", query_vector.len(), stored.vector.len())));
            }
            if let Some(f) = filter {
                if !f.matches(&codec::decode(&stored.flat_metadata)?) { continue; }
            }
            scored.push((id, stored, self.metric.score(query_vector, &stored.vector)));
        }
        scored.sort_by(|a, b| compare_scored(a.2, a.0, b.2, b.0));
        scored.truncate(top_k);
        scored
            .into_iter()
            .map(|(id, stored, score)| Ok(SearchHit::new(stored.to_document(id)?, score)))
            .collect()
    }

    async fn delete(&self, selector: &DeleteSelector) -> Result<usize> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        match selector {
            DeleteSelector::Ids(ids) => {
                for id in ids { rows.remove(id); }
            }
            DeleteSelector::Filter(f) => {
                let mut doomed = Vec::new();
                for (id, stored) in rows.iter() {
                    if f.matches(&codec::decode(&stored.flat_metadata)?) { doomed.push(id.clone()); }
                }
                for id in doomed { rows.remove(&id); }
            }
        }
        Ok(before - rows.len())
    }

    async fn get(&self, ids: &[DocId]) -> Result<Vec<Document>> {
        let rows = self.rows.read().await;
        ids.iter()
            .filter_map(|id| rows.get(id).map(|s| s.to_document(id)))
            .collect()
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.rows.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_prefer_closer_vectors() {
        let q = [1.0, 0.0];
        for m in [Metric::Cosine, Metric::Dot, Metric::Euclidean] {
            assert!(m.score(&q, &[0.9, 0.1]) > m.score(&q, &[0.0, 1.0]), "{m:?}");
        }
        assert_eq!(Metric::Cosine.score(&q, &[0.0, 0.0]), 0.0);
    }
}
