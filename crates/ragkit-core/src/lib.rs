//! ragkit-core
//!
//! Document model, capability traits, error taxonomy, metadata filters,
//! built-in text parsers, the extractor pipeline and configuration loading.

pub mod config;
pub mod error;
pub mod extract;
pub mod filter;
pub mod parser;
pub mod traits;
pub mod types;

pub use error::{EmbedError, Error, Result};
pub use filter::MetadataFilter;
pub use types::{Document, Metadata, Query, RetrievalResult, SearchHit};
