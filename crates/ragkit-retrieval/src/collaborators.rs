//! Built-in query generation, reranking and diversity selection.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;

use ragkit_core::traits::{QueryGenerator, Reranker};
use ragkit_core::types::{compare_scored, RetrievalResult, SearchHit};
use ragkit_text::tantivy_utils::{build_analyzer, tokens};

/// Picks a subset of a score-ordered candidate list to reduce near-duplicates.
/// Implementations may only return candidates they were given.
pub trait DiversityRanker: Send + Sync {
    fn select(&self, candidates: Vec<RetrievalResult>, top_k: usize) -> Vec<RetrievalResult>;
}

/// Deterministic rewrites of a query: keyword-only, question and explain forms.
#[derive(Debug, Default)]
pub struct TemplateQueryGenerator;

impl TemplateQueryGenerator {
    fn templates(query: &str) -> Vec<String> {
        let q = query.trim().trim_end_matches('?');
        let keywords = tokens(&mut build_analyzer(), q).join(" ");
        vec![
            keywords.clone(),
            format!("What is known about {q}?"),
            format!("Explain {q}"),
            format!("{keywords} overview"),
            format!("{keywords} examples"),
            format!("How does {q} work?"),
        ]
    }
}

#[async_trait]
impl QueryGenerator for TemplateQueryGenerator {
    async fn generate_variants(&self, query: &str, n: usize) -> anyhow::Result<Vec<String>> {
        let mut seen: HashSet<String> = HashSet::from([query.trim().to_lowercase()]);
        let mut out = Vec::new();
        for v in Self::templates(query) {
            if out.len() >= n { break; }
            let v = v.trim().to_string();
            if v.is_empty() || !seen.insert(v.to_lowercase()) { continue; }
            out.push(v);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LexicalOverlapConfig {
    pub similarity_weight: f32,
    pub overlap_weight: f32,
}

impl Default for LexicalOverlapConfig {
    fn default() -> Self { Self { similarity_weight: 0.7, overlap_weight: 0.3 } }
}

/// Blends the similarity score with the share of query terms found in the candidate.
#[derive(Debug, Default)]
pub struct LexicalOverlapReranker {
    config: LexicalOverlapConfig,
}

impl LexicalOverlapReranker {
    pub fn new(config: LexicalOverlapConfig) -> Self { Self { config } }
}

#[async_trait]
impl Reranker for LexicalOverlapReranker {
    async fn score(&self, query: &str, candidate: &SearchHit) -> anyhow::Result<f32> {
        let mut analyzer = build_analyzer();
        let query_terms: HashSet<String> = tokens(&mut analyzer, query).into_iter().collect();
        let content_terms: HashSet<String> = tokens(&mut analyzer, &candidate.document.content).into_iter().collect();
        let overlap = if query_terms.is_empty() {
            0.0
        } else {
            query_terms.intersection(&content_terms).count() as f32 / query_terms.len() as f32
        };
        Ok(self.config.similarity_weight * candidate.score + self.config.overlap_weight * overlap)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JaccardConfig {
    pub threshold: f32,
}

impl Default for JaccardConfig {
    fn default() -> Self { Self { threshold: 0.85 } }
}

/// Greedy selection skipping candidates too similar to one already kept.
/// Skipped candidates back-fill when fewer than `top_k` survive.
#[derive(Debug, Default)]
pub struct JaccardDiversityRanker {
    config: JaccardConfig,
}

impl JaccardDiversityRanker {
    pub fn new(config: JaccardConfig) -> Self { Self { config } }
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 { return 1.0; }
    a.intersection(b).count() as f32 / union as f32
}

impl DiversityRanker for JaccardDiversityRanker {
    fn select(&self, candidates: Vec<RetrievalResult>, top_k: usize) -> Vec<RetrievalResult> {
        let mut analyzer = build_analyzer();
        let mut kept: Vec<(RetrievalResult, HashSet<String>)> = Vec::new();
        let mut skipped = Vec::new();
        for c in candidates {
            if kept.len() >= top_k { break; }
            let terms: HashSet<String> = tokens(&mut analyzer, &c.document.content).into_iter().collect();
            if kept.iter().any(|(_, t)| jaccard(t, &terms) > self.config.threshold) {
                skipped.push(c);
            } else {
                kept.push((c, terms));
            }
        }
        let mut out: Vec<RetrievalResult> = kept.into_iter().map(|(c, _)| c).collect();
        out.extend(skipped.into_iter().take(top_k.saturating_sub(out.len())));
        out.sort_by(|x, y| compare_scored(x.score, &x.document.id, y.score, &y.document.id));
        for (rank, r) in out.iter_mut().enumerate() { r.rank = rank; }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragkit_core::types::Document;

    fn result(id: &str, content: &str, score: f32) -> RetrievalResult {
        RetrievalResult { document: Document::with_id(id, content), score, rank: 0 }
    }

    #[tokio::test]
    async fn template_variants_are_distinct_and_bounded() {
        let g = TemplateQueryGenerator;
        let v = g.generate_variants("How to start a fire?", 3).await.unwrap();
        assert_eq!(v.len(), 3);
        assert_eq!(v[0], "start fire");
        assert_eq!(v.iter().collect::<HashSet<_>>().len(), 3);
        assert!(g.generate_variants("fire", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlap_rewards_query_terms() {
        let r = LexicalOverlapReranker::default();
        let hit = |c: &str| SearchHit::new(Document::with_id("x", c), 0.5);
        let on_topic = r.score("dry tinder", &hit("Dry tinder catches quickly")).await.unwrap();
        let off_topic = r.score("dry tinder", &hit("Boil water for a minute")).await.unwrap();
        assert!((on_topic - (0.35 + 0.3)).abs() < 1e-6);
        assert!((off_topic - 0.35).abs() < 1e-6);
    }

    #[test]
    fn near_duplicates_are_pushed_out_then_backfilled() {
        let ranker = JaccardDiversityRanker::default();
        let input = vec![
            result("a", "boil water for one minute", 0.9),
            result("b", "boil water for one minute", 0.8),
            result("c", "dry tinder catches fire", 0.7),
        ];
        let two = ranker.select(input.clone(), 2);
        assert_eq!(two.iter().map(|r| r.document.id.as_str()).collect::<Vec<_>>(), vec!["a", "c"]);
        let three = ranker.select(input, 3);
        assert_eq!(three.iter().map(|r| r.document.id.as_str()).collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(three.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![0, 1, 2]);
    }
}
