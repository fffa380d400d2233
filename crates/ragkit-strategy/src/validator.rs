//! Structural and semantic checks over raw strategy definitions.
//!
//! The validator walks the normalized `serde_json::Value` rather than the typed
//! definition so that every problem in a file is reported in one pass, with a
//! path pointing at the offending field. It never modifies its input.

use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use ragkit_core::filter::MetadataFilter;

use crate::definition::{PerformancePriority, StrategyDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub severity: Severity,
    /// e.g. `strategies[0].components.parser.type`
    pub path: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] at '{}': {}", self.severity, self.path, self.message)?;
        if let Some(s) = &self.suggestion {
            write!(f, "\n    Suggestion: {s}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool { !self.issues.iter().any(|i| i.severity == Severity::Error) }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 { writeln!(f)?; }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

/// Component categories that carry a `type` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Parser,
    Extractor,
    Embedder,
    VectorStore,
    RetrievalStrategy,
    QueryGenerator,
    Reranker,
    DiversityRanker,
}

impl Category {
    fn label(self) -> &'static str {
        match self {
            Category::Parser => "parser",
            Category::Extractor => "extractor",
            Category::Embedder => "embedder",
            Category::VectorStore => "vector store",
            Category::RetrievalStrategy => "retrieval strategy",
            Category::QueryGenerator => "query generator",
            Category::Reranker => "reranker",
            Category::DiversityRanker => "diversity ranker",
        }
    }
}

/// Adapter names recognised in definitions even when this build has no
/// constructor for them.
const CATALOG: &[(Category, &[&str])] = &[
    (Category::Parser, &["PDFParser", "CSVParser", "DocxParser", "ExcelParser", "HTMLParser", "JSONParser"]),
    (Category::Extractor, &["EntityExtractor", "SummaryExtractor", "DateTimeExtractor", "PatternExtractor", "TableExtractor", "HeadingExtractor", "LinkExtractor"]),
    (Category::Embedder, &["OllamaEmbedder", "OpenAIEmbedder", "SentenceTransformerEmbedder"]),
    (Category::VectorStore, &["ChromaStore", "QdrantStore"]),
];

/// Registered component types and, where known, their accepted config keys.
///
/// Catalog names are recognised for suggestions and diagnostics but are not
/// buildable; only registered types pass validation.
#[derive(Debug, Clone, Default)]
pub struct KnownTypes {
    types: HashMap<Category, BTreeSet<String>>,
    catalog: HashMap<Category, BTreeSet<String>>,
    config_keys: HashMap<String, Vec<String>>,
}

impl KnownTypes {
    /// Well-known adapter names only.
    pub fn catalog() -> Self {
        let mut known = Self::default();
        for (category, names) in CATALOG {
            let set = known.catalog.entry(*category).or_default();
            set.extend(names.iter().map(|n| n.to_string()));
        }
        known
    }

    pub fn insert(&mut self, category: Category, name: &str) {
        self.types.entry(category).or_default().insert(name.to_string());
    }

    pub fn insert_with_keys(&mut self, category: Category, name: &str, keys: &[&str]) {
        self.insert(category, name);
        self.config_keys.insert(name.to_string(), keys.iter().map(|k| k.to_string()).collect());
    }

    /// Registered, i.e. buildable.
    pub fn contains(&self, category: Category, name: &str) -> bool {
        self.types.get(&category).is_some_and(|s| s.contains(name))
    }

    /// A catalog name with no registered constructor.
    pub fn is_unavailable(&self, category: Category, name: &str) -> bool {
        !self.contains(category, name) && self.catalog.get(&category).is_some_and(|s| s.contains(name))
    }

    pub fn names(&self, category: Category) -> Vec<&str> {
        self.types.get(&category).map(|s| s.iter().map(String::as_str).collect()).unwrap_or_default()
    }

    /// Nearest registered or catalog name.
    pub fn closest(&self, category: Category, name: &str) -> Option<&str> {
        let registered = self.types.get(&category).into_iter().flatten();
        let catalog = self.catalog.get(&category).into_iter().flatten();
        closest_match(name, registered.chain(catalog).map(String::as_str))
    }

    fn config_keys(&self, name: &str) -> Option<&[String]> {
        self.config_keys.get(name).map(Vec::as_slice)
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut prev = (0..=b.len()).collect::<Vec<_>>();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Nearest candidate within edit distance 3, compared case-insensitively.
pub fn closest_match<'a>(input: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let needle = input.to_lowercase();
    let mut best: Option<(usize, &str)> = None;
    for c in candidates {
        let d = edit_distance(&needle, &c.to_lowercase());
        if d <= 3 && d < c.chars().count() && best.map_or(true, |(bd, _)| d < bd) {
            best = Some((d, c));
        }
    }
    best.map(|(_, c)| c)
}

const DEFINITION_KEYS: &[&str] = &["name", "description", "tags", "use_cases", "components", "optimization", "validation", "monitoring"];
const COMPONENT_KEYS: &[&str] = &["parser", "extractors", "embedder", "vector_store", "retrieval_strategy"];
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const MAX_NESTING: usize = 8;

struct Collector {
    issues: Vec<Issue>,
}

impl Collector {
    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>, suggestion: Option<String>) {
        self.issues.push(Issue { severity, path: path.to_string(), message: message.into(), suggestion });
    }

    fn error(&mut self, path: &str, message: impl Into<String>) { self.push(Severity::Error, path, message, None); }

    fn warning(&mut self, path: &str, message: impl Into<String>) { self.push(Severity::Warning, path, message, None); }

    fn info(&mut self, path: &str, message: impl Into<String>) { self.push(Severity::Info, path, message, None); }

    /// Integer in `[min, max]` if present. Returns the value when well-formed.
    fn int_in_range(&mut self, config: &Map<String, Value>, key: &str, path: &str, min: i64, max: i64) -> Option<i64> {
        let value = config.get(key)?;
        let field = format!("{path}.{key}");
        match value.as_i64() {
            Some(n) if n < min || n > max => {
                self.error(&field, format!("{key} must be between {min} and {max} (got {n})"));
                None
            }
            Some(n) => Some(n),
            None => {
                self.error(&field, format!("{key} must be an integer (got {value})"));
                None
            }
        }
    }

    fn number(&mut self, config: &Map<String, Value>, key: &str, path: &str) -> Option<f64> {
        let value = config.get(key)?;
        let n = value.as_f64();
        if n.is_none() { self.error(&format!("{path}.{key}"), format!("{key} must be a number (got {value})")); }
        n
    }

    fn boolean(&mut self, config: &Map<String, Value>, key: &str, path: &str) {
        if let Some(v) = config.get(key) {
            if !v.is_boolean() { self.error(&format!("{path}.{key}"), format!("{key} must be true or false (got {v})")); }
        }
    }

    fn one_of(&mut self, config: &Map<String, Value>, key: &str, path: &str, allowed: &[&str], severity: Severity) {
        let Some(v) = config.get(key) else { return };
        let ok = v.as_str().is_some_and(|s| allowed.iter().any(|a| a.eq_ignore_ascii_case(s)));
        if !ok {
            let suggestion = v.as_str().and_then(|s| closest_match(s, allowed.iter().copied())).map(|s| format!("Did you mean '{s}'?"));
            self.push(severity, &format!("{path}.{key}"), format!("{key} must be one of {} (got {v})", allowed.join(", ")), suggestion);
        }
    }

    fn string_list(&mut self, map: &Map<String, Value>, key: &str, path: &str) {
        let Some(v) = map.get(key) else { return };
        let ok = v.as_array().is_some_and(|items| items.iter().all(Value::is_string));
        if !ok { self.error(&format!("{path}.{key}"), format!("{key} must be a list of strings")); }
    }

    fn unknown_keys(&mut self, map: &Map<String, Value>, path: &str, allowed: &[&str], what: &str) {
        for key in map.keys() {
            if allowed.contains(&key.as_str()) { continue; }
            let suggestion = closest_match(key, allowed.iter().copied()).map(|s| format!("Did you mean '{s}'?"));
            self.push(Severity::Warning, &format!("{path}.{key}"), format!("unknown {what} key '{key}' is ignored"), suggestion);
        }
    }
}

pub struct SchemaValidator {
    known: KnownTypes,
}

impl SchemaValidator {
    pub fn new(known: KnownTypes) -> Self { Self { known } }

    pub fn known_types(&self) -> &KnownTypes { &self.known }

    /// Validate one definition as if it were the only entry of a file.
    pub fn validate(&self, definition: &Value) -> (bool, Vec<Issue>) {
        let report = self.validate_definition(definition, 0);
        (report.is_valid(), report.issues)
    }

    pub fn validate_definition(&self, definition: &Value, index: usize) -> ValidationReport {
        let mut c = Collector { issues: Vec::new() };
        self.check_definition(&mut c, definition, &format!("strategies[{index}]"));
        ValidationReport { issues: c.issues }
    }

    /// Validate a normalized `{strategies: [...]}` document, including name uniqueness.
    pub fn validate_document(&self, document: &Value) -> ValidationReport {
        let mut c = Collector { issues: Vec::new() };
        let Some(list) = document.get("strategies").and_then(Value::as_array) else {
            c.error("strategies", "expected a 'strategies' list");
            return ValidationReport { issues: c.issues };
        };
        if list.is_empty() { c.warning("strategies", "file defines no strategies"); }
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for (i, def) in list.iter().enumerate() {
            let path = format!("strategies[{i}]");
            self.check_definition(&mut c, def, &path);
            if let Some(name) = def.get("name").and_then(Value::as_str) {
                if let Some(first) = seen.get(name) {
                    c.error(&format!("{path}.name"), format!("duplicate strategy name '{name}' (first defined at strategies[{first}])"));
                } else {
                    seen.insert(name, i);
                }
            }
        }
        ValidationReport { issues: c.issues }
    }

    fn check_definition(&self, c: &mut Collector, def: &Value, path: &str) {
        let Some(map) = def.as_object() else {
            c.error(path, "strategy definition must be a mapping");
            return;
        };
        match map.get("name") {
            None => c.error(&format!("{path}.name"), "missing required field 'name'"),
            Some(Value::String(s)) if s.trim().is_empty() => c.error(&format!("{path}.name"), "name must not be empty"),
            Some(Value::String(s)) => {
                let conventional = s.chars().next().is_some_and(|ch| ch.is_ascii_lowercase())
                    && s.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_');
                if !conventional {
                    let fixed: String = s.trim().to_lowercase().chars().map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' }).collect();
                    c.push(Severity::Warning, &format!("{path}.name"), format!("name '{s}' should be lowercase with underscores"), Some(format!("Use '{fixed}'")));
                }
            }
            Some(other) => c.error(&format!("{path}.name"), format!("name must be a string (got {other})")),
        }
        if !map.contains_key("description") { c.info(&format!("{path}.description"), "no description provided"); }
        c.string_list(map, "tags", path);
        c.string_list(map, "use_cases", path);
        c.unknown_keys(map, path, DEFINITION_KEYS, "strategy");

        match map.get("components") {
            None => c.error(&format!("{path}.components"), "missing required field 'components'"),
            Some(Value::Object(components)) => self.check_components(c, components, &format!("{path}.components")),
            Some(_) => c.error(&format!("{path}.components"), "components must be a mapping"),
        }
        if let Some(opt) = map.get("optimization").and_then(Value::as_object) {
            c.one_of(opt, "performance_priority", &format!("{path}.optimization"), &["speed", "accuracy", "balanced"], Severity::Error);
        }
        if let Some(v) = map.get("validation").and_then(Value::as_object) {
            let vp = format!("{path}.validation");
            let min = c.int_in_range(v, "min_document_length", &vp, 0, i64::MAX);
            let max = c.int_in_range(v, "max_document_length", &vp, 1, i64::MAX);
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    c.error(&format!("{vp}.min_document_length"), format!("min_document_length ({min}) exceeds max_document_length ({max})"));
                }
            }
            c.string_list(v, "required_metadata", &vp);
        }
        if let Some(m) = map.get("monitoring").and_then(Value::as_object) {
            let mp = format!("{path}.monitoring");
            c.boolean(m, "metrics_enabled", &mp);
            c.one_of(m, "log_level", &mp, LOG_LEVELS, Severity::Warning);
        }
    }

    fn check_components(&self, c: &mut Collector, components: &Map<String, Value>, path: &str) {
        if let Some((_, config)) = self.component(c, components.get("parser"), &format!("{path}.parser"), Category::Parser, &[]) {
            let cp = format!("{path}.parser.config");
            let size = c.int_in_range(&config, "chunk_size", &cp, 0, 1_000_000);
            let overlap_key = if config.contains_key("chunk_overlap") { "chunk_overlap" } else { "overlap" };
            let overlap = c.int_in_range(&config, overlap_key, &cp, 0, 1_000_000);
            if let (Some(size), Some(overlap)) = (size, overlap) {
                if size > 0 && overlap >= size {
                    c.error(&format!("{cp}.{overlap_key}"), format!("{overlap_key} ({overlap}) must be smaller than chunk_size ({size})"));
                }
            }
        }

        match components.get("extractors") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    let ep = format!("{path}.extractors[{i}]");
                    self.component(c, Some(item), &ep, Category::Extractor, &["priority", "enabled"]);
                    if let Some(map) = item.as_object() {
                        c.int_in_range(map, "priority", &ep, 0, 100);
                        c.boolean(map, "enabled", &ep);
                    }
                }
            }
            Some(_) => c.error(&format!("{path}.extractors"), "extractors must be a list"),
        }

        let mut embed_dim = None;
        if let Some((_, config)) = self.component(c, components.get("embedder"), &format!("{path}.embedder"), Category::Embedder, &[]) {
            let cp = format!("{path}.embedder.config");
            embed_dim = c.int_in_range(&config, "dimension", &cp, 128, 4096);
            c.int_in_range(&config, "batch_size", &cp, 1, 10_000);
        }

        if let Some((kind, config)) = self.component(c, components.get("vector_store"), &format!("{path}.vector_store"), Category::VectorStore, &[]) {
            let cp = format!("{path}.vector_store.config");
            let store_dim = c.int_in_range(&config, "dimension", &cp, 128, 4096);
            if let (Some(e), Some(s)) = (embed_dim, store_dim) {
                if e != s {
                    c.error(&format!("{cp}.dimension"), format!("store dimension {s} does not match embedder dimension {e}"));
                }
            }
            match kind.as_str() {
                "LanceDBStore" => c.one_of(&config, "distance", &cp, &["cosine", "l2", "dot"], Severity::Error),
                "MemoryStore" => c.one_of(&config, "metric", &cp, &["cosine", "dot", "euclidean"], Severity::Error),
                _ => {}
            }
        }

        self.check_strategy(c, components.get("retrieval_strategy"), &format!("{path}.retrieval_strategy"), 0);
        c.unknown_keys(components, path, COMPONENT_KEYS, "component");
    }

    fn check_strategy(&self, c: &mut Collector, spec: Option<&Value>, path: &str, depth: usize) {
        if depth > MAX_NESTING {
            c.error(path, format!("strategies nest deeper than {MAX_NESTING} levels"));
            return;
        }
        let extra: &[&str] = if depth > 0 { &["weight"] } else { &[] };
        let Some((kind, config)) = self.component(c, spec, path, Category::RetrievalStrategy, extra) else { return };
        let cp = format!("{path}.config");
        c.int_in_range(&config, "top_k", &cp, 1, 1000);
        c.number(&config, "score_threshold", &cp);
        if let Some(w) = spec.and_then(|s| s.get("weight")) {
            if !w.as_f64().is_some_and(|w| w >= 0.0) {
                c.error(&format!("{path}.weight"), format!("weight must be a non-negative number (got {w})"));
            }
        }

        match kind.as_str() {
            "MetadataFilteredStrategy" => {
                match config.get("filters") {
                    None => c.error(&format!("{cp}.filters"), "MetadataFilteredStrategy requires 'filters'"),
                    Some(f) => {
                        if let Err(e) = MetadataFilter::from_value(f) {
                            c.error(&format!("{cp}.filters"), e.to_string());
                        }
                    }
                }
                c.int_in_range(&config, "over_fetch_factor", &cp, 1, 100);
                c.boolean(&config, "fallback", &cp);
            }
            "MultiQueryStrategy" => {
                c.int_in_range(&config, "num_queries", &cp, 1, 20);
                c.boolean(&config, "include_original", &cp);
                if config.contains_key("query_generator") {
                    self.component(c, config.get("query_generator"), &format!("{cp}.query_generator"), Category::QueryGenerator, &[]);
                }
                if config.contains_key("diversity_ranker") {
                    if let Some((_, d)) = self.component(c, config.get("diversity_ranker"), &format!("{cp}.diversity_ranker"), Category::DiversityRanker, &[]) {
                        if let Some(t) = c.number(&d, "threshold", &format!("{cp}.diversity_ranker.config")) {
                            if !(0.0..=1.0).contains(&t) {
                                c.error(&format!("{cp}.diversity_ranker.config.threshold"), format!("threshold must be between 0 and 1 (got {t})"));
                            }
                        }
                    }
                }
            }
            "RerankedStrategy" => {
                let initial = c.int_in_range(&config, "initial_top_k", &cp, 1, 1000).unwrap_or(20);
                let fin = c.int_in_range(&config, "final_top_k", &cp, 1, 1000).unwrap_or(5);
                if initial <= fin {
                    c.error(&format!("{cp}.initial_top_k"), format!("initial_top_k ({initial}) must be greater than final_top_k ({fin})"));
                }
                c.int_in_range(&config, "concurrency", &cp, 1, 256);
                if config.contains_key("reranker") {
                    self.component(c, config.get("reranker"), &format!("{cp}.reranker"), Category::Reranker, &[]);
                }
                if config.contains_key("base_strategy") {
                    self.check_strategy(c, config.get("base_strategy"), &format!("{cp}.base_strategy"), depth + 1);
                }
            }
            "HybridUniversalStrategy" => {
                match config.get("strategies") {
                    Some(Value::Array(children)) if !children.is_empty() => {
                        for (i, child) in children.iter().enumerate() {
                            self.check_strategy(c, Some(child), &format!("{cp}.strategies[{i}]"), depth + 1);
                        }
                    }
                    Some(Value::Array(_)) | None => c.error(&format!("{cp}.strategies"), "HybridUniversalStrategy requires at least one sub-strategy"),
                    Some(_) => c.error(&format!("{cp}.strategies"), "strategies must be a list"),
                }
                c.one_of(&config, "fusion_method", &cp, &["weighted", "rrf"], Severity::Error);
                if let Some(k) = c.number(&config, "rrf_k", &cp) {
                    if k <= 0.0 { c.error(&format!("{cp}.rrf_k"), format!("rrf_k must be positive (got {k})")); }
                }
            }
            _ => {}
        }
    }

    /// Check a `{type, config}` block. Returns the type and config map when the
    /// block is well-formed enough for deeper checks.
    fn component(
        &self,
        c: &mut Collector,
        spec: Option<&Value>,
        path: &str,
        category: Category,
        extra_keys: &[&str],
    ) -> Option<(String, Map<String, Value>)> {
        let Some(spec) = spec else {
            c.error(path, format!("missing required {} component", category.label()));
            return None;
        };
        let Some(map) = spec.as_object() else {
            c.error(path, format!("{} must be a mapping with 'type' and 'config'", category.label()));
            return None;
        };
        let mut allowed = vec!["type", "config"];
        allowed.extend_from_slice(extra_keys);
        c.unknown_keys(map, path, &allowed, category.label());

        let type_path = format!("{path}.type");
        let kind = match map.get("type") {
            None => {
                c.error(&type_path, "missing required field 'type'");
                return None;
            }
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                c.error(&type_path, format!("type must be a string (got {other})"));
                return None;
            }
        };
        if self.known.is_unavailable(category, &kind) {
            let available = self.known.names(category).join(", ");
            c.push(
                Severity::Error,
                &type_path,
                format!("{} type '{kind}' is not available in this build", category.label()),
                Some(format!("Use one of: {available}")),
            );
            return None;
        }
        if !self.known.contains(category, &kind) {
            let suggestion = self.known.closest(category, &kind).map(|s| format!("Did you mean '{s}'?"));
            c.push(Severity::Error, &type_path, format!("unknown {} type '{kind}'", category.label()), suggestion);
            return None;
        }

        let config = match map.get("config") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(m)) => m.clone(),
            Some(_) => {
                c.error(&format!("{path}.config"), "config must be a mapping");
                return None;
            }
        };
        if let Some(keys) = self.known.config_keys(&kind) {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            c.unknown_keys(&config, &format!("{path}.config"), &keys, &format!("{kind} config"));
        }
        Some((kind, config))
    }

    /// Improvement hints that are not errors.
    pub fn suggest(&self, definition: &StrategyDefinition) -> Vec<String> {
        let mut hints = Vec::new();
        let components = &definition.components;
        if !components.extractors.iter().any(|e| e.enabled) {
            hints.push("No extractors enabled; ContentStatisticsExtractor or KeywordExtractor add filterable metadata.".to_string());
        }
        let mut kinds = Vec::new();
        collect_strategy_kinds(&components.retrieval_strategy.kind, &components.retrieval_strategy.config, &mut kinds, 0);
        for (kind, config) in &kinds {
            match kind.as_str() {
                "RerankedStrategy" => {
                    let initial = config.get("initial_top_k").and_then(Value::as_u64).unwrap_or(20);
                    let fin = config.get("final_top_k").and_then(Value::as_u64).unwrap_or(5);
                    if initial < fin.saturating_mul(3) {
                        hints.push(format!("Reranking {initial} candidates for {fin} results leaves little room; try initial_top_k >= {}.", fin * 3));
                    }
                }
                "HybridUniversalStrategy" => {
                    if config.get("strategies").and_then(Value::as_array).is_some_and(|s| s.len() == 1) {
                        hints.push("Hybrid strategy has a single sub-strategy; use that strategy directly.".to_string());
                    }
                }
                _ => {}
            }
        }
        if definition.optimization.performance_priority == PerformancePriority::Speed
            && kinds.iter().any(|(k, _)| k == "RerankedStrategy" || k == "MultiQueryStrategy")
        {
            hints.push("performance_priority is 'speed' but reranking or multi-query retrieval multiplies query cost.".to_string());
        }
        if definition.tags.is_empty() {
            hints.push("Add tags so the strategy can be found with by_tag.".to_string());
        }
        if definition.use_cases.is_empty() {
            hints.push("Add use_cases so the strategy can be found with by_use_case.".to_string());
        }
        let parser = &components.parser.config;
        let size = parser.get("chunk_size").and_then(Value::as_u64).unwrap_or(1000);
        let overlap = parser.get("chunk_overlap").or_else(|| parser.get("overlap")).and_then(Value::as_u64).unwrap_or(100);
        if size > 0 && overlap * 2 >= size {
            hints.push(format!("Chunk overlap {overlap} is at least half of chunk_size {size}; most text will be embedded twice."));
        }
        hints
    }
}

fn collect_strategy_kinds(kind: &str, config: &Value, out: &mut Vec<(String, Value)>, depth: usize) {
    if depth > MAX_NESTING { return; }
    out.push((kind.to_string(), config.clone()));
    let children = config
        .get("strategies")
        .and_then(Value::as_array)
        .map(|v| v.iter().collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
        .chain(config.get("base_strategy"));
    for child in children {
        if let Some(k) = child.get("type").and_then(Value::as_str) {
            collect_strategy_kinds(k, child.get("config").unwrap_or(&Value::Null), out, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
    }

    #[test]
    fn closest_match_is_case_insensitive_and_bounded() {
        let names = ["PDFParser", "CSVParser", "MarkdownParser"];
        assert_eq!(closest_match("pdfparserr", names), Some("PDFParser"));
        assert_eq!(closest_match("SpreadsheetThing", names), None);
    }

    #[test]
    fn issue_renders_with_suggestion_line() {
        let issue = Issue {
            severity: Severity::Error,
            path: "strategies[0].components.parser.type".into(),
            message: "unknown parser type 'PDFParserr'".into(),
            suggestion: Some("Did you mean 'PDFParser'?".into()),
        };
        assert_eq!(
            issue.to_string(),
            "[ERROR] at 'strategies[0].components.parser.type': unknown parser type 'PDFParserr'\n    Suggestion: Did you mean 'PDFParser'?"
        );
    }
}
