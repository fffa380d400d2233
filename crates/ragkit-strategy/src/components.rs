//! Type-name to constructor registry for every component category.
//!
//! Building a pipeline is a lookup by `type` plus a typed deserialization of
//! the block's `config`; nothing inspects concrete types at runtime.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use ragkit_core::config::resolve_with_base;
use ragkit_core::error::{Error, Result};
use ragkit_core::filter::MetadataFilter;
use ragkit_core::parser::{ChunkingConfig, TextParser};
use ragkit_core::traits::{Embedder, Extractor, Parser, QueryGenerator, Reranker, RetrievalStrategy, VectorStore};
use ragkit_embed::{HashEmbedder, HashEmbedderConfig};
use ragkit_retrieval::{
    BasicConfig, BasicSimilarityStrategy, DiversityRanker, FilteredConfig, FusionMethod, HybridUniversalStrategy,
    JaccardConfig, JaccardDiversityRanker, LexicalOverlapConfig, LexicalOverlapReranker, MetadataFilteredStrategy,
    MultiQueryConfig, MultiQueryStrategy, RerankConfig, RerankedStrategy, TemplateQueryGenerator, WeightedStrategy,
};
use ragkit_text::{ContentStatisticsExtractor, KeywordConfig, KeywordExtractor, PathConfig, PathExtractor};
use ragkit_vector::{LanceDBConfig, LanceDBStore, MemoryStore, MemoryStoreConfig};

use crate::definition::ComponentSpec;
use crate::validator::{Category, KnownTypes};

pub type ParserCtor = fn(&Value) -> Result<Arc<dyn Parser>>;
pub type ExtractorCtor = fn(&Value) -> Result<Arc<dyn Extractor>>;
pub type EmbedderCtor = fn(&Value) -> Result<Arc<dyn Embedder>>;
pub type StoreCtor = fn(&Value, &StoreContext) -> Result<Arc<dyn VectorStore>>;
pub type StrategyCtor = fn(&Value, &StrategyContext<'_>) -> Result<Arc<dyn RetrievalStrategy>>;
pub type QueryGeneratorCtor = fn(&Value) -> Result<Arc<dyn QueryGenerator>>;
pub type RerankerCtor = fn(&Value) -> Result<Arc<dyn Reranker>>;
pub type DiversityCtor = fn(&Value) -> Result<Arc<dyn DiversityRanker>>;

/// What a store constructor may need besides its own config.
pub struct StoreContext {
    /// Base for relative store locations.
    pub data_dir: PathBuf,
    /// Dimension of the pipeline's embedder.
    pub dimension: usize,
}

/// Shared collaborators for building (possibly nested) retrieval strategies.
pub struct StrategyContext<'a> {
    pub registry: &'a ComponentRegistry,
    pub store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
}

impl StrategyContext<'_> {
    pub fn build(&self, spec: &ComponentSpec) -> Result<Arc<dyn RetrievalStrategy>> {
        self.registry.build_strategy(spec, self)
    }

    fn basic(&self, config: &Value) -> Result<Arc<dyn RetrievalStrategy>> {
        Ok(Arc::new(BasicSimilarityStrategy::new(self.store.clone(), self.embedder.clone(), typed_config(config)?)))
    }
}

/// Deserialize a component `config`, treating an absent block as defaults.
pub fn typed_config<T: DeserializeOwned + Default>(config: &Value) -> Result<T> {
    if config.is_null() { return Ok(T::default()); }
    serde_json::from_value(config.clone()).map_err(|e| Error::InvalidConfig(format!("invalid component config: {e}")))
}

fn nested_spec(config: &Value, key: &str) -> Result<Option<ComponentSpec>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| Error::InvalidConfig(format!("invalid '{key}' block: {e}"))),
    }
}

fn missing(category: &str, kind: &str) -> Error {
    Error::InvalidConfig(format!("no {category} registered under type '{kind}'"))
}

#[derive(Default)]
pub struct ComponentRegistry {
    parsers: HashMap<String, ParserCtor>,
    extractors: HashMap<String, ExtractorCtor>,
    embedders: HashMap<String, EmbedderCtor>,
    stores: HashMap<String, StoreCtor>,
    strategies: HashMap<String, StrategyCtor>,
    query_generators: HashMap<String, QueryGeneratorCtor>,
    rerankers: HashMap<String, RerankerCtor>,
    diversity_rankers: HashMap<String, DiversityCtor>,
    known: KnownTypes,
}

impl ComponentRegistry {
    /// Empty registry that still recognises the well-known adapter catalog.
    pub fn new() -> Self {
        Self { known: KnownTypes::catalog(), ..Self::default() }
    }

    /// Every component shipped with the workspace.
    pub fn builtin() -> Self {
        let mut r = Self::new();
        r.register_parser("PlainTextParser", &["chunk_size", "chunk_overlap", "overlap"], |c| {
            Ok(Arc::new(TextParser::plain(typed_config::<ChunkingConfig>(c)?)))
        });
        r.register_parser("MarkdownParser", &["chunk_size", "chunk_overlap", "overlap"], |c| {
            Ok(Arc::new(TextParser::markdown(typed_config::<ChunkingConfig>(c)?)))
        });

        r.register_extractor("ContentStatisticsExtractor", &[], |_| Ok(Arc::new(ContentStatisticsExtractor)));
        r.register_extractor("KeywordExtractor", &["max_keywords", "min_length"], |c| {
            Ok(Arc::new(KeywordExtractor::new(typed_config::<KeywordConfig>(c)?)))
        });
        r.register_extractor("PathExtractor", &["base_dir", "depth"], |c| {
            Ok(Arc::new(PathExtractor::new(typed_config::<PathConfig>(c)?)))
        });

        r.register_embedder("HashEmbedder", &["dimension", "seed", "batch_size"], |c| {
            Ok(Arc::new(HashEmbedder::from_config(typed_config::<HashEmbedderConfig>(c)?)))
        });

        r.register_store("MemoryStore", &["metric"], |c, _| Ok(Arc::new(MemoryStore::new(typed_config::<MemoryStoreConfig>(c)?))));
        r.register_store("LanceDBStore", &["uri", "table_name", "dimension", "distance"], |c, ctx| {
            let mut config = typed_config::<LanceDBConfig>(c)?;
            if c.get("dimension").is_none() {
                config.dimension = ctx.dimension;
            }
            config.uri = resolve_with_base(&ctx.data_dir, &config.uri).to_string_lossy().to_string();
            Ok(Arc::new(LanceDBStore::new(config)))
        });

        r.register_strategy("BasicSimilarityStrategy", &["top_k", "score_threshold"], |c, ctx| ctx.basic(c));
        r.register_strategy(
            "MetadataFilteredStrategy",
            &["top_k", "score_threshold", "filters", "over_fetch_factor", "fallback"],
            |c, ctx| {
                let filters = c
                    .get("filters")
                    .ok_or_else(|| Error::InvalidConfig("MetadataFilteredStrategy requires 'filters'".into()))?;
                let filter = MetadataFilter::from_value(filters)?;
                let config = typed_config::<FilteredConfig>(c)?;
                Ok(Arc::new(MetadataFilteredStrategy::new(ctx.store.clone(), ctx.embedder.clone(), filter, config)))
            },
        );
        r.register_strategy(
            "MultiQueryStrategy",
            &["top_k", "score_threshold", "num_queries", "include_original", "query_generator", "diversity_ranker"],
            |c, ctx| {
                let generator: Arc<dyn QueryGenerator> = match nested_spec(c, "query_generator")? {
                    Some(spec) => ctx.registry.build_query_generator(&spec)?,
                    None => Arc::new(TemplateQueryGenerator),
                };
                let mut strategy = MultiQueryStrategy::new(ctx.basic(c)?, generator, typed_config::<MultiQueryConfig>(c)?);
                if let Some(spec) = nested_spec(c, "diversity_ranker")? {
                    strategy = strategy.with_diversity(ctx.registry.build_diversity_ranker(&spec)?);
                }
                Ok(Arc::new(strategy))
            },
        );
        r.register_strategy(
            "RerankedStrategy",
            &["top_k", "initial_top_k", "final_top_k", "concurrency", "reranker", "base_strategy"],
            |c, ctx| {
                let base: Arc<dyn RetrievalStrategy> = match nested_spec(c, "base_strategy")? {
                    Some(spec) => ctx.build(&spec)?,
                    None => ctx.basic(&Value::Null)?,
                };
                let reranker: Arc<dyn Reranker> = match nested_spec(c, "reranker")? {
                    Some(spec) => ctx.registry.build_reranker(&spec)?,
                    None => Arc::new(LexicalOverlapReranker::default()),
                };
                Ok(Arc::new(RerankedStrategy::new(base, reranker, typed_config::<RerankConfig>(c)?)?))
            },
        );
        r.register_strategy("HybridUniversalStrategy", &["top_k", "strategies", "fusion_method", "rrf_k"], |c, ctx| {
            let config = typed_config::<HybridConfig>(c)?;
            let children = config
                .strategies
                .iter()
                .map(|child| {
                    let spec = ComponentSpec::new(child.kind.clone(), child.config.clone());
                    Ok(WeightedStrategy { strategy: ctx.build(&spec)?, weight: child.weight })
                })
                .collect::<Result<Vec<_>>>()?;
            let mut hybrid = HybridUniversalStrategy::new(children, config.fusion_method)?;
            if let Some(k) = config.rrf_k {
                hybrid = hybrid.with_rrf_k(k);
            }
            Ok(Arc::new(hybrid))
        });

        r.register_query_generator("TemplateQueryGenerator", &[], |_| Ok(Arc::new(TemplateQueryGenerator)));
        r.register_reranker("LexicalOverlapReranker", &["similarity_weight", "overlap_weight"], |c| {
            Ok(Arc::new(LexicalOverlapReranker::new(typed_config::<LexicalOverlapConfig>(c)?)))
        });
        r.register_diversity_ranker("JaccardDiversityRanker", &["threshold"], |c| {
            Ok(Arc::new(JaccardDiversityRanker::new(typed_config::<JaccardConfig>(c)?)))
        });
        r
    }

    pub fn known_types(&self) -> KnownTypes { self.known.clone() }

    pub fn register_parser(&mut self, name: &str, keys: &[&str], ctor: ParserCtor) {
        self.known.insert_with_keys(Category::Parser, name, keys);
        self.parsers.insert(name.to_string(), ctor);
    }

    pub fn register_extractor(&mut self, name: &str, keys: &[&str], ctor: ExtractorCtor) {
        self.known.insert_with_keys(Category::Extractor, name, keys);
        self.extractors.insert(name.to_string(), ctor);
    }

    pub fn register_embedder(&mut self, name: &str, keys: &[&str], ctor: EmbedderCtor) {
        self.known.insert_with_keys(Category::Embedder, name, keys);
        self.embedders.insert(name.to_string(), ctor);
    }

    pub fn register_store(&mut self, name: &str, keys: &[&str], ctor: StoreCtor) {
        self.known.insert_with_keys(Category::VectorStore, name, keys);
        self.stores.insert(name.to_string(), ctor);
    }

    pub fn register_strategy(&mut self, name: &str, keys: &[&str], ctor: StrategyCtor) {
        self.known.insert_with_keys(Category::RetrievalStrategy, name, keys);
        self.strategies.insert(name.to_string(), ctor);
    }

    pub fn register_query_generator(&mut self, name: &str, keys: &[&str], ctor: QueryGeneratorCtor) {
        self.known.insert_with_keys(Category::QueryGenerator, name, keys);
        self.query_generators.insert(name.to_string(), ctor);
    }

    pub fn register_reranker(&mut self, name: &str, keys: &[&str], ctor: RerankerCtor) {
        self.known.insert_with_keys(Category::Reranker, name, keys);
        self.rerankers.insert(name.to_string(), ctor);
    }

    pub fn register_diversity_ranker(&mut self, name: &str, keys: &[&str], ctor: DiversityCtor) {
        self.known.insert_with_keys(Category::DiversityRanker, name, keys);
        self.diversity_rankers.insert(name.to_string(), ctor);
    }

    pub fn build_parser(&self, spec: &ComponentSpec) -> Result<Arc<dyn Parser>> {
        let ctor = self.parsers.get(&spec.kind).ok_or_else(|| missing("parser", &spec.kind))?;
        ctor(&spec.config)
    }

    pub fn build_extractor(&self, spec: &ComponentSpec) -> Result<Arc<dyn Extractor>> {
        let ctor = self.extractors.get(&spec.kind).ok_or_else(|| missing("extractor", &spec.kind))?;
        ctor(&spec.config)
    }

    pub fn build_embedder(&self, spec: &ComponentSpec) -> Result<Arc<dyn Embedder>> {
        let ctor = self.embedders.get(&spec.kind).ok_or_else(|| missing("embedder", &spec.kind))?;
        ctor(&spec.config)
    }

    pub fn build_store(&self, spec: &ComponentSpec, ctx: &StoreContext) -> Result<Arc<dyn VectorStore>> {
        let ctor = self.stores.get(&spec.kind).ok_or_else(|| missing("vector store", &spec.kind))?;
        ctor(&spec.config, ctx)
    }

    pub fn build_strategy(&self, spec: &ComponentSpec, ctx: &StrategyContext<'_>) -> Result<Arc<dyn RetrievalStrategy>> {
        let ctor = self.strategies.get(&spec.kind).ok_or_else(|| missing("retrieval strategy", &spec.kind))?;
        ctor(&spec.config, ctx)
    }

    pub fn build_query_generator(&self, spec: &ComponentSpec) -> Result<Arc<dyn QueryGenerator>> {
        let ctor = self.query_generators.get(&spec.kind).ok_or_else(|| missing("query generator", &spec.kind))?;
        ctor(&spec.config)
    }

    pub fn build_reranker(&self, spec: &ComponentSpec) -> Result<Arc<dyn Reranker>> {
        let ctor = self.rerankers.get(&spec.kind).ok_or_else(|| missing("reranker", &spec.kind))?;
        ctor(&spec.config)
    }

    pub fn build_diversity_ranker(&self, spec: &ComponentSpec) -> Result<Arc<dyn DiversityRanker>> {
        let ctor = self.diversity_rankers.get(&spec.kind).ok_or_else(|| missing("diversity ranker", &spec.kind))?;
        ctor(&spec.config)
    }
}

fn default_weight() -> f32 { 1.0 }

#[derive(Debug, Deserialize)]
struct HybridChild {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    config: Value,
    #[serde(default = "default_weight")]
    weight: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HybridConfig {
    strategies: Vec<HybridChild>,
    fusion_method: FusionMethod,
    rrf_k: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_types_are_known_and_catalog_types_are_not_buildable() {
        let r = ComponentRegistry::builtin();
        let known = r.known_types();
        assert!(known.contains(Category::Parser, "PlainTextParser"));
        assert!(!known.contains(Category::Parser, "PDFParser"));
        assert!(known.is_unavailable(Category::Parser, "PDFParser"));
        let err = r.build_parser(&ComponentSpec::new("PDFParser", Value::Null)).err().unwrap();
        assert!(err.to_string().contains("PDFParser"));
    }

    #[test]
    fn bad_config_is_an_invalid_config_error() {
        let r = ComponentRegistry::builtin();
        let spec = ComponentSpec::new("KeywordExtractor", json!({"max_keywords": "many"}));
        assert!(matches!(r.build_extractor(&spec), Err(Error::InvalidConfig(_))));
    }
}
