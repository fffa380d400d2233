use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use ragkit_core::config::{IngestSettings, Settings};
use ragkit_core::error::{Error, Result};
use ragkit_core::extract::{ExtractorEntry, ExtractorPipeline};
use ragkit_core::traits::{Embedder, Parser, RetrievalStrategy, VectorStore};
use ragkit_core::types::{Query, RetrievalResult};
use ragkit_embed::{BatchingEmbedder, RetryPolicy};

use crate::components::{ComponentRegistry, StoreContext, StrategyContext};
use crate::definition::StrategyDefinition;
use crate::validator::SchemaValidator;

pub const DEFAULT_TOP_K: usize = 5;

/// A strategy definition turned into live components.
pub struct Pipeline {
    pub(crate) definition: Arc<StrategyDefinition>,
    pub(crate) parser: Arc<dyn Parser>,
    pub(crate) extractors: ExtractorPipeline,
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) store: Arc<dyn VectorStore>,
    pub(crate) retrieval: Arc<dyn RetrievalStrategy>,
    pub(crate) default_top_k: usize,
    pub(crate) ingest: IngestSettings,
}

impl Pipeline {
    pub fn name(&self) -> &str { &self.definition.name }

    pub fn definition(&self) -> &StrategyDefinition { &self.definition }

    pub fn store(&self) -> Arc<dyn VectorStore> { self.store.clone() }

    pub fn retrieval(&self) -> Arc<dyn RetrievalStrategy> { self.retrieval.clone() }

    /// `top_k` from the retrieval strategy config, or 5.
    pub fn default_top_k(&self) -> usize { self.default_top_k }

    pub async fn search(&self, query: impl Into<Query>, top_k: usize) -> Result<Vec<RetrievalResult>> {
        let query = query.into();
        let results = self.retrieval.search(&query, top_k).await?;
        debug!(strategy = self.name(), retrieval = self.retrieval.name(), top_k, results = results.len(), "search");
        Ok(results)
    }

    /// Search that gives up as soon as `token` is cancelled.
    pub async fn search_with_cancel(&self, query: impl Into<Query>, top_k: usize, token: &CancellationToken) -> Result<Vec<RetrievalResult>> {
        let query = query.into();
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled(format!("search on '{}' cancelled", self.name()))),
            results = self.search(query, top_k) => results,
        }
    }

    pub async fn search_with_deadline(&self, query: impl Into<Query>, top_k: usize, deadline: Duration) -> Result<Vec<RetrievalResult>> {
        let query = query.into();
        match tokio::time::timeout(deadline, self.search(query, top_k)).await {
            Ok(results) => results,
            Err(_) => Err(Error::Cancelled(format!("search on '{}' exceeded {} ms", self.name(), deadline.as_millis()))),
        }
    }
}

/// Validates a definition and assembles its components.
pub struct PipelineBuilder {
    components: Arc<ComponentRegistry>,
    settings: Settings,
    store: Option<Arc<dyn VectorStore>>,
}

impl PipelineBuilder {
    pub fn new(settings: Settings) -> Self {
        Self { components: Arc::new(ComponentRegistry::builtin()), settings, store: None }
    }

    pub fn with_components(mut self, components: ComponentRegistry) -> Self {
        self.components = Arc::new(components);
        self
    }

    /// Use `store` instead of building the definition's vector store.
    pub fn with_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn components(&self) -> &ComponentRegistry { &self.components }

    pub fn build(&self, definition: Arc<StrategyDefinition>) -> Result<Pipeline> {
        let raw = serde_json::to_value(definition.as_ref())?;
        let report = SchemaValidator::new(self.components.known_types()).validate_definition(&raw, 0);
        if !report.is_valid() {
            return Err(Error::Validation(format!("strategy '{}':\n{report}", definition.name)));
        }

        let spec = &definition.components;
        let parser = self.components.build_parser(&spec.parser)?;
        let entries = spec
            .extractors
            .iter()
            .map(|e| {
                Ok(ExtractorEntry { extractor: self.components.build_extractor(&e.component())?, priority: e.priority, enabled: e.enabled })
            })
            .collect::<Result<Vec<_>>>()?;
        let extractors = ExtractorPipeline::new(entries);

        let inner = self.components.build_embedder(&spec.embedder)?;
        let batch_size = spec
            .embedder
            .config
            .get("batch_size")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(self.settings.embedding.batch_size);
        let embedder: Arc<dyn Embedder> =
            Arc::new(BatchingEmbedder::new(inner, batch_size, RetryPolicy::from(&self.settings.embedding)));

        let store = match &self.store {
            Some(store) => store.clone(),
            None => {
                let ctx = StoreContext { data_dir: self.settings.store.data_dir(), dimension: embedder.dimension() };
                self.components.build_store(&spec.vector_store, &ctx)?
            }
        };

        let ctx = StrategyContext { registry: &self.components, store: store.clone(), embedder: embedder.clone() };
        let retrieval = ctx.build(&spec.retrieval_strategy)?;
        let default_top_k = spec
            .retrieval_strategy
            .config
            .get("top_k")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_TOP_K);

        info!(
            strategy = %definition.name,
            parser = parser.name(),
            extractors = ?extractors.order(),
            embedder = embedder.model_name(),
            store = store.name(),
            retrieval = retrieval.name(),
            "pipeline assembled"
        );
        Ok(Pipeline {
            definition,
            parser,
            extractors,
            embedder,
            store,
            retrieval,
            default_top_k,
            ingest: self.settings.ingest.clone(),
        })
    }
}
