//! Canonical in-memory shape of a strategy definition.
//!
//! Only the loader produces these, after normalization and validation, so
//! required components are plain fields rather than options.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{type, config}` block naming a registered component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,
}

impl ComponentSpec {
    pub fn new(kind: impl Into<String>, config: Value) -> Self {
        Self { kind: kind.into(), config }
    }
}

fn default_priority() -> u8 { 50 }

fn default_true() -> bool { true }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,
    /// 0-100, higher runs first.
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ExtractorSpec {
    pub fn component(&self) -> ComponentSpec {
        ComponentSpec::new(self.kind.clone(), self.config.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub parser: ComponentSpec,
    #[serde(default)]
    pub extractors: Vec<ExtractorSpec>,
    pub embedder: ComponentSpec,
    pub vector_store: ComponentSpec,
    pub retrieval_strategy: ComponentSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformancePriority {
    Speed,
    Accuracy,
    #[default]
    Balanced,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Optimization {
    pub performance_priority: PerformancePriority,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub batch_settings: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub caching: Value,
}

/// Document admission rules applied before embedding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_document_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_document_length: Option<usize>,
    pub required_metadata: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub content_filters: Vec<Value>,
}

impl ValidationRules {
    pub fn is_empty(&self) -> bool {
        self.max_document_length.is_none() && self.min_document_length.is_none() && self.required_metadata.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitoring {
    pub metrics_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub use_cases: Vec<String>,
    pub components: Components,
    #[serde(default)]
    pub optimization: Optimization,
    #[serde(default)]
    pub validation: ValidationRules,
    #[serde(default)]
    pub monitoring: Monitoring,
}

impl StrategyDefinition {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Case-insensitive substring match in either direction.
    pub fn matches_use_case(&self, text: &str) -> bool {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() { return false; }
        self.use_cases.iter().any(|u| {
            let u = u.to_lowercase();
            u.contains(&needle) || needle.contains(&u)
        })
    }
}
