//! Batch ingestion: parse, extract, admit, embed, store.
//!
//! Batches run concurrently up to `workers`; inside a batch the stages run in
//! order and the store write happens only after every admitted document has a
//! vector, so a failed or cancelled batch writes nothing.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ragkit_core::error::{EmbedError, Error, Result};
use ragkit_core::parser::collect_inputs;
use ragkit_core::types::Document;

use crate::definition::ValidationRules;
use crate::pipeline::Pipeline;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files_seen: usize,
    pub files_failed: usize,
    pub documents_written: usize,
    /// Rejected by the strategy's validation rules.
    pub documents_skipped: usize,
    pub batches_failed: usize,
}

#[derive(Debug, Default)]
struct BatchOutcome {
    files_failed: usize,
    documents_written: usize,
    documents_skipped: usize,
}

fn rejection(doc: &Document, rules: &ValidationRules) -> Option<String> {
    let len = doc.content.chars().count();
    if let Some(min) = rules.min_document_length {
        if len < min { return Some(format!("length {len} below minimum {min}")); }
    }
    if let Some(max) = rules.max_document_length {
        if len > max { return Some(format!("length {len} above maximum {max}")); }
    }
    rules
        .required_metadata
        .iter()
        .find(|key| doc.metadata_path(key).is_none())
        .map(|key| format!("missing required metadata '{key}'"))
}

/// Split `documents` into admitted ones and a rejected count.
pub fn admit(documents: Vec<Document>, rules: &ValidationRules) -> (Vec<Document>, usize) {
    if rules.is_empty() { return (documents, 0); }
    let before = documents.len();
    let kept: Vec<Document> = documents
        .into_iter()
        .filter(|d| match rejection(d, rules) {
            Some(reason) => {
                debug!(id = %d.id, source = %d.source, %reason, "document rejected");
                false
            }
            None => true,
        })
        .collect();
    let skipped = before - kept.len();
    (kept, skipped)
}

fn cancelled(pipeline: &Pipeline) -> Error {
    Error::Cancelled(format!("ingestion into '{}' cancelled", pipeline.name()))
}

impl Pipeline {
    pub async fn ingest(&self, inputs: &[PathBuf]) -> Result<IngestReport> {
        self.ingest_with_cancel(inputs, &CancellationToken::new()).await
    }

    /// Ingest files and directories. Cancellation stops before the next store
    /// write; batches already written stay written.
    pub async fn ingest_with_cancel(&self, inputs: &[PathBuf], token: &CancellationToken) -> Result<IngestReport> {
        let files = collect_inputs(inputs, self.parser.as_ref());
        let mut report = IngestReport { files_seen: files.len(), ..IngestReport::default() };
        if files.is_empty() {
            warn!(strategy = self.name(), parser = self.parser.name(), "no supported input files found");
            return Ok(report);
        }
        let batch_size = self.ingest.batch_size.max(1);
        let workers = self.ingest.workers.max(1);
        info!(strategy = self.name(), files = files.len(), batch_size, workers, "ingestion started");

        let mut outcomes = stream::iter(files.chunks(batch_size).enumerate())
            .map(|(index, batch)| async move { (index, self.ingest_batch(batch, token).await) })
            .buffer_unordered(workers);

        while let Some((index, outcome)) = outcomes.next().await {
            match outcome {
                Ok(o) => {
                    report.files_failed += o.files_failed;
                    report.documents_written += o.documents_written;
                    report.documents_skipped += o.documents_skipped;
                }
                Err(e @ Error::Cancelled(_)) => return Err(e),
                Err(e) if self.ingest.continue_on_error => {
                    warn!(batch = index, error = %e, "batch failed, none of its documents were written");
                    report.batches_failed += 1;
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            strategy = self.name(),
            files = report.files_seen,
            failed = report.files_failed,
            written = report.documents_written,
            skipped = report.documents_skipped,
            batches_failed = report.batches_failed,
            "ingestion finished"
        );
        Ok(report)
    }

    async fn ingest_batch(&self, files: &[PathBuf], token: &CancellationToken) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        let parsed: Vec<Result<Vec<Document>>> = stream::iter(files)
            .map(|path| self.parser.parse_file(path))
            .buffered(self.ingest.workers.max(1))
            .collect()
            .await;

        let mut documents = Vec::new();
        for result in parsed {
            match result {
                Ok(docs) => documents.extend(docs),
                Err(e) if self.ingest.continue_on_error => {
                    warn!(error = %e, "skipping file");
                    outcome.files_failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let documents = self.extractors.extract(documents);
        let (mut documents, skipped) = admit(documents, &self.definition.validation);
        outcome.documents_skipped = skipped;
        if documents.is_empty() { return Ok(outcome); }
        if token.is_cancelled() { return Err(cancelled(self)); }

        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(cancelled(self)),
            vectors = self.embedder.embed(&texts) => vectors?,
        };
        if vectors.len() != documents.len() {
            return Err(EmbedError::CountMismatch { got: vectors.len(), expected: documents.len() }.into());
        }
        for (doc, vector) in documents.iter_mut().zip(vectors) {
            doc.embedding = Some(vector);
        }

        if token.is_cancelled() { return Err(cancelled(self)); }
        self.store.add(&documents).await?;
        outcome.documents_written = documents.len();
        debug!(files = files.len(), written = outcome.documents_written, "batch committed");
        Ok(outcome)
    }
}
