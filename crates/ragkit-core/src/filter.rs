//! Boolean predicates over document metadata.
//!
//! Filters are written in a small Mongo-style JSON dialect:
//!
//! ```json
//! { "doc_type": "report",
//!   "priority": { "$gte": 3 },
//!   "$or": [ { "team": "search" }, { "team": { "$in": ["infra", "ml"] } } ] }
//! ```
//!
//! A bare object is the AND of its entries. Dotted keys reach into nested
//! metadata. Missing fields only match negative operators.

use serde_json::Value;
use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::types::{lookup_path, Metadata};

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataFilter {
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
    Gt(String, f64),
    Gte(String, f64),
    Lt(String, f64),
    Lte(String, f64),
    Exists(String, bool),
    Contains(String, Value),
    And(Vec<MetadataFilter>),
    Or(Vec<MetadataFilter>),
    Not(Box<MetadataFilter>),
}

impl MetadataFilter {
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self { Self::Eq(key.into(), value.into()) }

    pub fn and(filters: Vec<MetadataFilter>) -> Self { Self::And(filters) }

    pub fn or(filters: Vec<MetadataFilter>) -> Self { Self::Or(filters) }

    /// Parse the JSON dialect described in the module docs.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::InvalidConfig(format!("metadata filter must be an object, got {value}")))?;
        let mut clauses = Vec::with_capacity(obj.len());
        for (key, v) in obj {
            clauses.push(match key.as_str() {
                "$and" => Self::And(parse_list(key, v)?),
                "$or" => Self::Or(parse_list(key, v)?),
                "$not" => Self::Not(Box::new(Self::from_value(v)?)),
                k if k.starts_with('$') => {
                    return Err(Error::InvalidConfig(format!("unknown top-level filter operator '{k}'")))
                }
                field => parse_field(field, v)?,
            });
        }
        Ok(if clauses.len() == 1 { clauses.remove(0) } else { Self::And(clauses) })
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Eq(k, v) => lookup_path(metadata, k).is_some_and(|x| values_equal(x, v)),
            Self::Ne(k, v) => !lookup_path(metadata, k).is_some_and(|x| values_equal(x, v)),
            Self::In(k, vs) => lookup_path(metadata, k).is_some_and(|x| vs.iter().any(|v| values_equal(x, v))),
            Self::NotIn(k, vs) => !lookup_path(metadata, k).is_some_and(|x| vs.iter().any(|v| values_equal(x, v))),
            Self::Gt(k, n) => compare_num(metadata, k).is_some_and(|x| x > *n),
            Self::Gte(k, n) => compare_num(metadata, k).is_some_and(|x| x >= *n),
            Self::Lt(k, n) => compare_num(metadata, k).is_some_and(|x| x < *n),
            Self::Lte(k, n) => compare_num(metadata, k).is_some_and(|x| x <= *n),
            Self::Exists(k, want) => lookup_path(metadata, k).is_some_and(|v| !v.is_null()) == *want,
            Self::Contains(k, v) => match lookup_path(metadata, k) {
                Some(Value::Array(items)) => items.iter().any(|x| values_equal(x, v)),
                Some(Value::String(s)) => v.as_str().is_some_and(|needle| s.contains(needle)),
                _ => false,
            },
            Self::And(fs) => fs.iter().all(|f| f.matches(metadata)),
            Self::Or(fs) => fs.iter().any(|f| f.matches(metadata)),
            Self::Not(f) => !f.matches(metadata),
        }
    }
}

fn parse_list(op: &str, v: &Value) -> Result<Vec<MetadataFilter>> {
    let items = v
        .as_array()
        .ok_or_else(|| Error::InvalidConfig(format!("'{op}' expects an array of filters")))?;
    items.iter().map(MetadataFilter::from_value).collect()
}

fn parse_field(field: &str, v: &Value) -> Result<MetadataFilter> {
    let ops = match v.as_object() {
        Some(ops) if ops.keys().all(|k| k.starts_with('$')) && !ops.is_empty() => ops,
        _ => return Ok(MetadataFilter::Eq(field.to_string(), v.clone())),
    };
    let key = field.to_string();
    let mut clauses = Vec::with_capacity(ops.len());
    for (op, arg) in ops {
        clauses.push(match op.as_str() {
            "$eq" => MetadataFilter::Eq(key.clone(), arg.clone()),
            "$ne" => MetadataFilter::Ne(key.clone(), arg.clone()),
            "$in" => MetadataFilter::In(key.clone(), array_arg(op, arg)?),
            "$nin" => MetadataFilter::NotIn(key.clone(), array_arg(op, arg)?),
            "$gt" => MetadataFilter::Gt(key.clone(), number_arg(op, arg)?),
            "$gte" => MetadataFilter::Gte(key.clone(), number_arg(op, arg)?),
            "$lt" => MetadataFilter::Lt(key.clone(), number_arg(op, arg)?),
            "$lte" => MetadataFilter::Lte(key.clone(), number_arg(op, arg)?),
            "$exists" => MetadataFilter::Exists(
                key.clone(),
                arg.as_bool().ok_or_else(|| Error::InvalidConfig("'$exists' expects a boolean".into()))?,
            ),
            "$contains" => MetadataFilter::Contains(key.clone(), arg.clone()),
            other => return Err(Error::InvalidConfig(format!("unknown filter operator '{other}' on '{field}'"))),
        });
    }
    Ok(if clauses.len() == 1 { clauses.remove(0) } else { MetadataFilter::And(clauses) })
}

fn array_arg(op: &str, v: &Value) -> Result<Vec<Value>> {
    v.as_array().cloned().ok_or_else(|| Error::InvalidConfig(format!("'{op}' expects an array")))
}

fn number_arg(op: &str, v: &Value) -> Result<f64> {
    v.as_f64().ok_or_else(|| Error::InvalidConfig(format!("'{op}' expects a number")))
}

fn compare_num(metadata: &Metadata, key: &str) -> Option<f64> {
    lookup_path(metadata, key).and_then(Value::as_f64)
}

/// Numbers compare by value so `3` equals `3.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y) == Some(Ordering::Equal),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(v: Value) -> Metadata {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn bare_object_is_and_of_equalities() {
        let f = MetadataFilter::from_value(&json!({"doc_type": "report", "year": 2024})).unwrap();
        assert!(f.matches(&meta(json!({"doc_type": "report", "year": 2024.0}))));
        assert!(!f.matches(&meta(json!({"doc_type": "report", "year": 2023}))));
        assert!(!f.matches(&meta(json!({"doc_type": "report"}))));
    }

    #[test]
    fn operators_and_or() {
        let f = MetadataFilter::from_value(&json!({
            "priority": {"$gte": 3, "$lt": 10},
            "$or": [{"team": "search"}, {"team": {"$in": ["infra", "ml"]}}]
        }))
        .unwrap();
        assert!(f.matches(&meta(json!({"priority": 3, "team": "ml"}))));
        assert!(!f.matches(&meta(json!({"priority": 10, "team": "ml"}))));
        assert!(!f.matches(&meta(json!({"priority": 5, "team": "sales"}))));
    }

    #[test]
    fn missing_fields_only_match_negations() {
        let m = meta(json!({"a": 1}));
        assert!(!MetadataFilter::from_value(&json!({"b": {"$gt": 0}})).unwrap().matches(&m));
        assert!(MetadataFilter::from_value(&json!({"b": {"$ne": 0}})).unwrap().matches(&m));
        assert!(MetadataFilter::from_value(&json!({"b": {"$exists": false}})).unwrap().matches(&m));
        assert!(MetadataFilter::from_value(&json!({"b": {"$nin": [1]}})).unwrap().matches(&m));
    }

    #[test]
    fn contains_and_nested_paths() {
        let m = meta(json!({"extractors": {"KeywordExtractor": {"keywords": ["rust", "search"]}}, "title": "Rust search"}));
        let f = MetadataFilter::from_value(&json!({"extractors.KeywordExtractor.keywords": {"$contains": "rust"}})).unwrap();
        assert!(f.matches(&m));
        let g = MetadataFilter::from_value(&json!({"title": {"$contains": "search"}})).unwrap();
        assert!(g.matches(&m));
        let n = MetadataFilter::from_value(&json!({"$not": {"title": {"$contains": "search"}}})).unwrap();
        assert!(!n.matches(&m));
    }

    #[test]
    fn rejects_unknown_operators() {
        assert!(MetadataFilter::from_value(&json!({"a": {"$regex": "x"}})).is_err());
        assert!(MetadataFilter::from_value(&json!({"$xor": []})).is_err());
        assert!(MetadataFilter::from_value(&json!(["not", "an", "object"])).is_err());
    }
}
