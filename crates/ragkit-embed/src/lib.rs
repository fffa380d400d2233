//! ragkit-embed
//!
//! Embedder implementations and the batching/retry wrapper every pipeline
//! puts in front of its configured embedder.

pub mod batching;
pub mod hash;

pub use batching::{BatchingEmbedder, RetryPolicy};
pub use hash::{HashEmbedder, HashEmbedderConfig};
