//! ragkit-strategy
//!
//! Declarative strategy definitions and everything that turns them into a
//! running pipeline: loading (unified and legacy files), validation with
//! path-addressed diagnostics, the process-wide registry, component
//! construction, ingestion and query entry points.

pub mod components;
pub mod definition;
pub mod ingest;
pub mod loader;
pub mod pipeline;
pub mod registry;
pub mod validator;

pub use components::{ComponentRegistry, StoreContext, StrategyContext};
pub use definition::{ComponentSpec, Components, ExtractorSpec, PerformancePriority, StrategyDefinition, ValidationRules};
pub use ingest::IngestReport;
pub use loader::StrategyLoader;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use registry::StrategyRegistry;
pub use validator::{Issue, KnownTypes, SchemaValidator, Severity, ValidationReport};
