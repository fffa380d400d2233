//! ragkit-vector
//!
//! Vector store adapters and the flat metadata codec they share.

pub mod codec;
pub mod lance;
pub mod memory;
pub mod schema;
pub mod table;

pub use lance::{LanceDBConfig, LanceDBStore, LanceDistance};
pub use memory::{MemoryStore, MemoryStoreConfig, Metric};
