use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use ragkit_core::config::EmbeddingSettings;
use ragkit_core::error::EmbedError;
use ragkit_core::traits::Embedder;

/// Bounded exponential backoff for transient embedding failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based count of failures so far).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = base.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

impl From<&EmbeddingSettings> for RetryPolicy {
    fn from(s: &EmbeddingSettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            initial_backoff: Duration::from_millis(s.initial_backoff_ms),
            max_backoff: Duration::from_millis(s.max_backoff_ms),
            ..Self::default()
        }
    }
}

/// Splits inputs into sub-batches, retries transient failures and checks the
/// shape of every response. Output order always matches input order.
pub struct BatchingEmbedder {
    inner: Arc<dyn Embedder>,
    batch_size: usize,
    retry: RetryPolicy,
}

impl BatchingEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, batch_size: usize, retry: RetryPolicy) -> Self {
        Self { inner, batch_size: batch_size.max(1), retry }
    }

    pub fn from_settings(inner: Arc<dyn Embedder>, settings: &EmbeddingSettings) -> Self {
        Self::new(inner, settings.batch_size, RetryPolicy::from(settings))
    }

    pub fn batch_size(&self) -> usize { self.batch_size }

    async fn embed_with_retry(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut attempt = 1;
        loop {
            match self.inner.embed(batch).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.retry.max_attempts,
                        backoff_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying embedding batch after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl Embedder for BatchingEmbedder {
    fn model_name(&self) -> &str { self.inner.model_name() }

    fn dimension(&self) -> usize { self.inner.dimension() }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let dim = self.dimension();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self.embed_with_retry(batch).await?;
            if vectors.len() != batch.len() {
                return Err(EmbedError::CountMismatch { got: vectors.len(), expected: batch.len() });
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
                return Err(EmbedError::DimensionMismatch { got: bad.len(), expected: dim });
            }
            out.extend(vectors);
        }
        debug!(model = self.model_name(), texts = texts.len(), "embedded");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let p = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            multiplier: 2.0,
        };
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(350));
        assert_eq!(p.backoff(9), Duration::from_millis(350));
    }
}
