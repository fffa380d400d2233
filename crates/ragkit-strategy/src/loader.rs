//! Strategy files to validated [`StrategyDefinition`]s.
//!
//! Two on-disk shapes are accepted: the unified `strategies: [...]` list and
//! the legacy top-level `name -> definition` map, whose component blocks may
//! sit directly on the definition. Both are normalized into the unified shape
//! before validation, so nothing downstream knows which form was read.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use ragkit_core::error::{Error, Result};

use crate::definition::StrategyDefinition;
use crate::validator::{SchemaValidator, Severity, ValidationReport};

const COMPONENT_KEYS: &[&str] = &["parser", "extractors", "embedder", "vector_store", "retrieval_strategy"];

/// Parse YAML (or JSON) text into a raw value.
pub fn parse_text(text: &str, origin: &str) -> Result<Value> {
    serde_yaml::from_str::<Value>(text).map_err(|e| Error::InvalidConfig(format!("{origin}: {e}")))
}

/// Rewrite either accepted shape into `{ "strategies": [ ... ] }`.
pub fn normalize(raw: Value) -> Result<Value> {
    let Value::Object(mut top) = raw else {
        return Err(Error::InvalidConfig("strategy file must contain a mapping".into()));
    };
    let list = match top.remove("strategies") {
        Some(Value::Array(items)) => items,
        Some(Value::Object(named)) => normalize_legacy(named),
        Some(_) => return Err(Error::InvalidConfig("'strategies' must be a list".into())),
        None => normalize_legacy(top),
    };
    let mut out = Map::new();
    out.insert("strategies".into(), Value::Array(list));
    Ok(Value::Object(out))
}

fn normalize_legacy(named: Map<String, Value>) -> Vec<Value> {
    named
        .into_iter()
        .map(|(name, def)| match def {
            Value::Object(mut map) => {
                map.entry("name").or_insert(Value::String(name));
                let mut components = match map.remove("components") {
                    Some(Value::Object(c)) => c,
                    Some(other) => {
                        // leave malformed components for the validator to report
                        map.insert("components".into(), other);
                        return Value::Object(map);
                    }
                    None => Map::new(),
                };
                for key in COMPONENT_KEYS {
                    if let Some(v) = map.remove(*key) {
                        components.entry(*key).or_insert(v);
                    }
                }
                if !components.is_empty() {
                    map.insert("components".into(), Value::Object(components));
                }
                Value::Object(map)
            }
            other => other,
        })
        .collect()
}

pub struct StrategyLoader {
    validator: SchemaValidator,
    merge: bool,
}

impl StrategyLoader {
    pub fn new(validator: SchemaValidator) -> Self { Self { validator, merge: false } }

    /// Let a later file replace an earlier file's strategy of the same name.
    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    pub fn validator(&self) -> &SchemaValidator { &self.validator }

    /// Normalize and validate without building definitions.
    pub fn check_str(&self, text: &str, origin: &str) -> Result<ValidationReport> {
        let document = normalize(parse_text(text, origin)?)?;
        Ok(self.validator.validate_document(&document))
    }

    pub fn load_str(&self, text: &str, origin: &str) -> Result<Vec<StrategyDefinition>> {
        let document = normalize(parse_text(text, origin)?)?;
        let report = self.validator.validate_document(&document);
        for issue in report.warnings() {
            warn!(origin, path = %issue.path, "{}", issue.message);
        }
        if !report.is_valid() {
            let errors = report.errors().count();
            return Err(Error::Validation(format!("{origin}: {errors} error(s)\n{report}")));
        }
        let Value::Object(mut top) = document else { return Ok(Vec::new()) };
        let list = match top.remove("strategies") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        let defs = list
            .into_iter()
            .map(|v| serde_json::from_value::<StrategyDefinition>(v).map_err(|e| Error::InvalidConfig(format!("{origin}: {e}"))))
            .collect::<Result<Vec<_>>>()?;
        debug!(origin, count = defs.len(), "parsed strategy definitions");
        Ok(defs)
    }

    pub fn load_file(&self, path: &Path) -> Result<Vec<StrategyDefinition>> {
        let text = std::fs::read_to_string(path)?;
        self.load_str(&text, &path.to_string_lossy())
    }

    /// Load files in order into a name-keyed map.
    ///
    /// The same name in two files is an error unless merging is enabled, in
    /// which case the later file wins.
    pub fn load_files(&self, paths: &[PathBuf]) -> Result<HashMap<String, Arc<StrategyDefinition>>> {
        let mut out: HashMap<String, Arc<StrategyDefinition>> = HashMap::new();
        let mut origin_of: HashMap<String, PathBuf> = HashMap::new();
        for path in paths {
            for def in self.load_file(path)? {
                if let Some(previous) = origin_of.get(&def.name) {
                    if !self.merge {
                        return Err(Error::InvalidConfig(format!(
                            "strategy '{}' is defined in both {} and {}",
                            def.name,
                            previous.display(),
                            path.display()
                        )));
                    }
                    info!(name = %def.name, from = %path.display(), "strategy replaced by later file");
                }
                origin_of.insert(def.name.clone(), path.clone());
                out.insert(def.name.clone(), Arc::new(def));
            }
        }
        info!(files = paths.len(), strategies = out.len(), "strategy definitions loaded");
        Ok(out)
    }
}

/// Render a report and whether it contains errors, for command-line use.
pub fn render_report(report: &ValidationReport) -> (String, bool) {
    let has_errors = report.issues.iter().any(|i| i.severity == Severity::Error);
    (report.to_string(), has_errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_map_is_hoisted_into_components() {
        let raw = json!({
            "simple": {
                "description": "legacy",
                "parser": {"type": "PlainTextParser"},
                "embedder": {"type": "HashEmbedder"},
                "vector_store": {"type": "MemoryStore"},
                "retrieval_strategy": {"type": "BasicSimilarityStrategy"}
            }
        });
        let doc = normalize(raw).unwrap();
        let def = &doc["strategies"][0];
        assert_eq!(def["name"], "simple");
        assert_eq!(def["components"]["parser"]["type"], "PlainTextParser");
        assert!(def.get("parser").is_none());
    }

    #[test]
    fn unified_list_passes_through() {
        let raw = json!({"strategies": [{"name": "a"}]});
        assert_eq!(normalize(raw.clone()).unwrap(), raw);
    }

    #[test]
    fn scalar_document_is_rejected() {
        assert!(normalize(json!("nope")).is_err());
    }
}
