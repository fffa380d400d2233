use async_trait::async_trait;
use serde::Deserialize;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use ragkit_core::error::EmbedError;
use ragkit_core::traits::Embedder;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HashEmbedderConfig {
    pub dimension: usize,
    pub seed: u64,
}

impl Default for HashEmbedderConfig {
    fn default() -> Self { Self { dimension: 384, seed: 0 } }
}

/// Deterministic feature-hashing embedder.
///
/// Each lowercased alphanumeric token is hashed into a bucket; the vector is
/// L2-normalized. Texts sharing words land close together, which is enough for
/// tests and offline development without a model.
pub struct HashEmbedder {
    dim: usize,
    seed: u64,
    name: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self::from_config(HashEmbedderConfig { dimension: dim, ..HashEmbedderConfig::default() })
    }

    pub fn from_config(config: HashEmbedderConfig) -> Self {
        let dim = config.dimension.max(1);
        Self { dim, seed: config.seed, name: format!("hash:xxh64:d{dim}") }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(self.seed);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 0.5 + val;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str { &self.name }

    fn dimension(&self) -> usize { self.dim }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
