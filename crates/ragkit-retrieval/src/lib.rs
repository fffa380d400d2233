//! ragkit-retrieval
//!
//! The five retrieval strategies, score fusion and the built-in collaborators
//! (query generator, reranker, diversity ranker) they can be wired with.

pub mod basic;
pub mod collaborators;
pub mod filtered;
pub mod fusion;
pub mod hybrid;
pub mod multi_query;
pub mod reranked;

pub use basic::{query_vector, BasicConfig, BasicSimilarityStrategy};
pub use collaborators::{
    DiversityRanker, JaccardConfig, JaccardDiversityRanker, LexicalOverlapConfig, LexicalOverlapReranker,
    TemplateQueryGenerator,
};
pub use filtered::{FilteredConfig, MetadataFilteredStrategy};
pub use fusion::{Candidate, FusionMethod, RankedList, RRF_K};
pub use hybrid::{HybridUniversalStrategy, WeightedStrategy};
pub use multi_query::{MultiQueryConfig, MultiQueryStrategy};
pub use reranked::{RerankConfig, RerankedStrategy};
