//! Score fusion over ranked lists.
//!
//! Works purely on `(id, score, rank)` so any strategy, nested or not, can feed it.

use serde::Deserialize;
use std::collections::HashMap;

use ragkit_core::types::{compare_scored, DocId};

/// Constant for Reciprocal Rank Fusion.
pub const RRF_K: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionMethod {
    #[default]
    Weighted,
    Rrf,
}

impl std::str::FromStr for FusionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "weighted" => Ok(Self::Weighted),
            "rrf" => Ok(Self::Rrf),
            other => Err(format!("unknown fusion method '{other}' (expected weighted or rrf)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: DocId,
    pub score: f32,
    /// Zero-indexed position in the originating list.
    pub rank: usize,
}

/// One input list with the weight of the strategy that produced it.
#[derive(Debug, Clone)]
pub struct RankedList {
    pub weight: f32,
    pub candidates: Vec<Candidate>,
}

/// Fuse `lists` into `(id, fused_score)` pairs, best first, ties by id.
///
/// `Weighted` min-max normalizes each list before applying its weight; a list
/// whose scores are all equal normalizes to 1.0. `Rrf` ignores weights and
/// raw scores.
pub fn fuse(lists: &[RankedList], method: FusionMethod, rrf_k: f32) -> Vec<(DocId, f32)> {
    let mut fused: HashMap<&str, f32> = HashMap::new();
    for list in lists {
        match method {
            FusionMethod::Weighted => {
                let (min, max) = list
                    .candidates
                    .iter()
                    .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), c| (lo.min(c.score), hi.max(c.score)));
                let span = max - min;
                for c in &list.candidates {
                    let norm = if span > f32::EPSILON { (c.score - min) / span } else { 1.0 };
                    *fused.entry(c.id.as_str()).or_default() += list.weight * norm;
                }
            }
            FusionMethod::Rrf => {
                for c in &list.candidates {
                    *fused.entry(c.id.as_str()).or_default() += 1.0 / (rrf_k + c.rank as f32);
                }
            }
        }
    }
    let mut out: Vec<(DocId, f32)> = fused.into_iter().map(|(id, s)| (id.to_string(), s)).collect();
    out.sort_by(|a, b| compare_scored(a.1, &a.0, b.1, &b.0));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(weight: f32, items: &[(&str, f32)]) -> RankedList {
        RankedList {
            weight,
            candidates: items
                .iter()
                .enumerate()
                .map(|(rank, (id, score))| Candidate { id: id.to_string(), score: *score, rank })
                .collect(),
        }
    }

    #[test]
    fn rrf_matches_hand_computed_scores() {
        let a = list(1.0, &[("X", 0.9), ("Y", 0.8)]);
        let b = list(1.0, &[("Y", 0.7), ("Z", 0.6)]);
        let fused = fuse(&[a, b], FusionMethod::Rrf, RRF_K);
        let ids: Vec<_> = fused.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["Y", "X", "Z"]);
        assert!((fused[0].1 - (1.0 / 61.0 + 1.0 / 60.0)).abs() < 1e-6);
        assert!((fused[1].1 - 1.0 / 60.0).abs() < 1e-6);
        assert!((fused[2].1 - 1.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn rrf_two_lists_sharing_leaders_tie_and_break_by_id() {
        let s1 = list(1.0, &[("A", 0.9), ("B", 0.8), ("C", 0.7)]);
        let s2 = list(1.0, &[("B", 0.95), ("A", 0.85), ("D", 0.75)]);
        let fused = fuse(&[s1, s2], FusionMethod::Rrf, 60.0);
        let ids: Vec<_> = fused.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C", "D"]);

        let both = 1.0 / 60.0 + 1.0 / 61.0;
        assert!((fused[0].1 - both).abs() < 1e-6);
        assert_eq!(fused[0].1, fused[1].1, "A and B collect the same two terms");
        assert!((fused[2].1 - 1.0 / 62.0).abs() < 1e-6);
        assert_eq!(fused[2].1, fused[3].1);
    }

    #[test]
    fn weighted_normalizes_each_list() {
        let dense = list(0.7, &[("a", 0.9), ("b", 0.5)]);
        let sparse = list(0.3, &[("b", 12.0), ("c", 2.0)]);
        let fused: HashMap<_, _> = fuse(&[dense, sparse], FusionMethod::Weighted, RRF_K).into_iter().collect();
        assert!((fused["a"] - 0.7).abs() < 1e-6);
        assert!((fused["b"] - 0.3).abs() < 1e-6);
        assert!(fused["c"].abs() < 1e-6);
    }

    #[test]
    fn constant_list_normalizes_to_one_and_ties_break_by_id() {
        let fused = fuse(&[list(0.5, &[("q", 0.4), ("p", 0.4)])], FusionMethod::Weighted, RRF_K);
        assert_eq!(fused, vec![("p".to_string(), 0.5), ("q".to_string(), 0.5)]);
    }

    #[test]
    fn parses_method_names() {
        assert_eq!("RRF".parse::<FusionMethod>().unwrap(), FusionMethod::Rrf);
        assert!("borda".parse::<FusionMethod>().is_err());
    }
}
