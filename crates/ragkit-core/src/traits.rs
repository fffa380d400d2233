//! Capability interfaces for every pluggable component category.
//!
//! Concrete implementations are registered under a `type` string and built
//! from the `{type, config}` blocks of a strategy definition.

use async_trait::async_trait;
use std::path::Path;

use crate::error::{EmbedError, Result};
use crate::filter::MetadataFilter;
use crate::types::{DocId, Document, Metadata, Query, RetrievalResult, SearchHit};

/// File or bytes to an ordered sequence of chunk documents.
#[async_trait]
pub trait Parser: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this parser handles the given file (usually by extension).
    fn supports(&self, path: &Path) -> bool;

    /// Failures must be `Error::Parsing` tagged with the path.
    async fn parse_file(&self, path: &Path) -> Result<Vec<Document>>;

    async fn parse_bytes(&self, bytes: &[u8], source: &str) -> Result<Vec<Document>>;
}

/// A metadata enricher. Reads content and existing metadata, never rewrites content.
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;

    /// Raw output, stored under `extractors.<name>`.
    fn extract(&self, document: &Document) -> anyhow::Result<Metadata>;

    /// Top-level convenience aliases derived from the raw output.
    fn flatten(&self, output: &Metadata) -> Metadata {
        output.clone()
    }
}

/// Batch of texts to a batch of fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;

    /// One vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbedError>;

    async fn embed_query(&self, text: &str) -> std::result::Result<Vec<f32>, EmbedError> {
        let mut out = self.embed(&[text.to_string()]).await?;
        if out.len() != 1 {
            return Err(EmbedError::CountMismatch { got: out.len(), expected: 1 });
        }
        Ok(out.remove(0))
    }
}

/// Which documents a delete call targets.
#[derive(Debug, Clone)]
pub enum DeleteSelector {
    Ids(Vec<DocId>),
    Filter(MetadataFilter),
}

/// Persistence and similarity search for embedded documents.
///
/// `add` overwrites on id collision. `search` returns at most `top_k` hits,
/// highest score first, ties by id ascending.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `search` applies `filter` natively.
    fn supports_filtering(&self) -> bool;

    async fn add(&self, documents: &[Document]) -> Result<()>;

    async fn search(&self, query_vector: &[f32], top_k: usize, filter: Option<&MetadataFilter>) -> Result<Vec<SearchHit>>;

    /// Returns the number of documents removed.
    async fn delete(&self, selector: &DeleteSelector) -> Result<usize>;

    async fn get(&self, ids: &[DocId]) -> Result<Vec<Document>>;

    async fn count(&self) -> Result<usize>;
}

/// Query to a ranked result list. Implementations are stateless across calls.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &Query, top_k: usize) -> Result<Vec<RetrievalResult>>;
}

/// Produces paraphrased variants of a query.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate_variants(&self, query: &str, n: usize) -> anyhow::Result<Vec<String>>;
}

/// Scores a (query, candidate) pair jointly.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn score(&self, query: &str, candidate: &SearchHit) -> anyhow::Result<f32>;
}
