//! ragkit-text
//!
//! Text analysis for metadata extraction. The keyword extractor reuses a
//! tantivy analyzer (simple tokenizer, lowercasing, stop words).

pub mod tantivy_utils;
pub mod extractors;

pub use extractors::{ContentStatisticsExtractor, KeywordConfig, KeywordExtractor, PathConfig, PathExtractor};
