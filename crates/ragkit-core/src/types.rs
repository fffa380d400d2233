//! Domain types shared by parsers, extractors, stores and retrieval strategies.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

pub type DocId = String;
pub type Metadata = serde_json::Map<String, Value>;

/// Top-level metadata key holding each extractor's raw output.
pub const EXTRACTORS_KEY: &str = "extractors";

/// The canonical unit flowing through ingestion and retrieval.
///
/// - `id`: unique within a collection, derived from source + chunk position + content
/// - `content`: the text payload of the chunk
/// - `source`: original path or URI, may be empty
/// - `metadata`: namespaced extractor output plus flattened convenience keys
/// - `embedding`: absent until the embedder has run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub content: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Build a chunk document whose id is stable for unchanged content.
    pub fn from_chunk(source: &str, chunk_index: usize, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: document_id(source, chunk_index, &content),
            content,
            source: source.to_string(),
            metadata: Metadata::new(),
            embedding: None,
        }
    }

    pub fn with_id(id: impl Into<DocId>, content: impl Into<String>) -> Self {
        Self { id: id.into(), content: content.into(), source: String::new(), metadata: Metadata::new(), embedding: None }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Look up a metadata value by dotted path (`extractors.KeywordExtractor.keywords`).
    pub fn metadata_path(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.metadata, path)
    }
}

/// Resolve a dotted key path inside a metadata map. An exact top-level key wins
/// over path traversal so keys that themselves contain dots stay addressable.
pub fn lookup_path<'a>(metadata: &'a Metadata, path: &str) -> Option<&'a Value> {
    if let Some(v) = metadata.get(path) {
        return Some(v);
    }
    let mut parts = path.split('.');
    let mut current = metadata.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Content-hash derived id: re-ingesting unchanged content yields the same id.
pub fn document_id(source: &str, chunk_index: usize, content: &str) -> DocId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source.as_bytes());
    hasher.update(&[0]);
    hasher.update(chunk_index.to_string().as_bytes());
    hasher.update(&[0]);
    hasher.update(content.as_bytes());
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..32].to_string()
}

/// A query is either raw text (embedded on demand) or an already computed vector.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Text(String),
    Vector(Vec<f32>),
}

impl Query {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Vector(_) => None,
        }
    }
}

impl From<&str> for Query {
    fn from(s: &str) -> Self { Self::Text(s.to_string()) }
}

impl From<String> for Query {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<Vec<f32>> for Query {
    fn from(v: Vec<f32>) -> Self { Self::Vector(v) }
}

/// A raw similarity hit returned by a vector store. Higher `score` is better.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub document: Document,
    pub score: f32,
}

impl SearchHit {
    pub fn new(document: Document, score: f32) -> Self { Self { document, score } }
}

/// One entry of a ranked result list.
///
/// Within a list `rank` is contiguous from 0 and scores never increase with rank.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub document: Document,
    pub score: f32,
    pub rank: usize,
}

/// Descending by score, ties by id ascending. NaN sorts last.
pub fn compare_scored(a_score: f32, a_id: &str, b_score: f32, b_id: &str) -> Ordering {
    match (a_score.is_nan(), b_score.is_nan()) {
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }
    b_score
        .partial_cmp(&a_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a_id.cmp(b_id))
}

/// Sort hits, truncate to `top_k` and assign contiguous ranks.
pub fn rank_hits(mut hits: Vec<SearchHit>, top_k: usize) -> Vec<RetrievalResult> {
    hits.sort_by(|a, b| compare_scored(a.score, &a.document.id, b.score, &b.document.id));
    hits.truncate(top_k);
    hits.into_iter()
        .enumerate()
        .map(|(rank, h)| RetrievalResult { document: h.document, score: h.score, rank })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_stable_and_position_sensitive() {
        let a = document_id("a.txt", 0, "hello");
        assert_eq!(a, document_id("a.txt", 0, "hello"));
        assert_eq!(a.len(), 32);
        assert_ne!(a, document_id("a.txt", 1, "hello"));
        assert_ne!(a, document_id("b.txt", 0, "hello"));
        assert_ne!(a, document_id("a.txt", 0, "hello!"));
    }

    #[test]
    fn rank_hits_orders_and_breaks_ties_by_id() {
        let hits = vec![
            SearchHit::new(Document::with_id("c", ""), 0.5),
            SearchHit::new(Document::with_id("b", ""), 0.9),
            SearchHit::new(Document::with_id("a", ""), 0.5),
            SearchHit::new(Document::with_id("d", ""), 0.1),
        ];
        let ranked = rank_hits(hits, 3);
        let ids: Vec<_> = ranked.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(ranked.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn nan_scores_sort_last() {
        let hits = vec![
            SearchHit::new(Document::with_id("nan", ""), f32::NAN),
            SearchHit::new(Document::with_id("ok", ""), 0.2),
        ];
        let ranked = rank_hits(hits, 10);
        assert_eq!(ranked[0].document.id, "ok");
    }

    #[test]
    fn metadata_path_walks_nested_objects() {
        let doc = Document::with_id("x", "")
            .with_metadata("extractors", json!({"entities": {"PERSON": ["Alice"]}}))
            .with_metadata("a.b", 1);
        assert_eq!(doc.metadata_path("extractors.entities.PERSON"), Some(&json!(["Alice"])));
        assert_eq!(doc.metadata_path("a.b"), Some(&json!(1)));
        assert_eq!(doc.metadata_path("extractors.missing"), None);
    }
}
