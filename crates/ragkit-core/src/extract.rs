//! Ordered, fault-isolated metadata enrichment.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::traits::Extractor;
use crate::types::{Document, Metadata, EXTRACTORS_KEY};

/// An extractor plus its scheduling attributes from the strategy definition.
#[derive(Clone)]
pub struct ExtractorEntry {
    pub extractor: Arc<dyn Extractor>,
    pub priority: u8,
    pub enabled: bool,
}

impl ExtractorEntry {
    pub fn new(extractor: Arc<dyn Extractor>, priority: u8) -> Self {
        Self { extractor, priority, enabled: true }
    }
}

/// Runs extractors in descending priority; ties keep definition order.
#[derive(Clone, Default)]
pub struct ExtractorPipeline {
    entries: Vec<ExtractorEntry>,
}

impl ExtractorPipeline {
    pub fn new(entries: Vec<ExtractorEntry>) -> Self {
        let mut entries: Vec<ExtractorEntry> = entries.into_iter().filter(|e| e.enabled).collect();
        // stable sort keeps definition order for equal priorities
        entries.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { entries }
    }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn len(&self) -> usize { self.entries.len() }

    /// Execution order, by extractor name.
    pub fn order(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.extractor.name()).collect()
    }

    /// Enrich `documents` in place. A failing extractor is logged and skipped
    /// for that document; the remaining extractors still run.
    pub fn extract(&self, mut documents: Vec<Document>) -> Vec<Document> {
        for entry in &self.entries {
            let name = entry.extractor.name();
            let mut failures = 0usize;
            for doc in &mut documents {
                match entry.extractor.extract(doc) {
                    Ok(output) => {
                        let flat = entry.extractor.flatten(&output);
                        apply_output(doc, name, output, flat);
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(extractor = name, document = %doc.id, error = %e, "extractor failed; skipping its output");
                    }
                }
            }
            debug!(extractor = name, documents = documents.len(), failures, "extractor applied");
        }
        documents
    }
}

fn apply_output(doc: &mut Document, name: &str, output: Metadata, flat: Metadata) {
    let namespace = doc
        .metadata
        .entry(EXTRACTORS_KEY.to_string())
        .or_insert_with(|| Value::Object(Metadata::new()));
    if !namespace.is_object() {
        *namespace = Value::Object(Metadata::new());
    }
    if let Value::Object(ns) = namespace {
        ns.insert(name.to_string(), Value::Object(output));
    }
    for (key, value) in flat {
        // the namespaced layer is never overwritten by a convenience alias
        if key == EXTRACTORS_KEY { continue; }
        doc.metadata.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Labeler { name: &'static str, label: &'static str, log: Arc<Mutex<Vec<String>>> }

    impl Extractor for Labeler {
        fn name(&self) -> &str { self.name }
        fn extract(&self, _doc: &Document) -> anyhow::Result<Metadata> {
            self.log.lock().map_err(|e| anyhow::anyhow!("{e}"))?.push(self.name.to_string());
            let mut m = Metadata::new();
            m.insert("label".into(), json!(self.label));
            Ok(m)
        }
    }

    struct Broken;

    impl Extractor for Broken {
        fn name(&self) -> &str { "Broken" }
        fn extract(&self, _doc: &Document) -> anyhow::Result<Metadata> { anyhow::bail!("always fails") }
    }

    struct Sneaky;

    impl Extractor for Sneaky {
        fn name(&self) -> &str { "Sneaky" }
        fn extract(&self, _doc: &Document) -> anyhow::Result<Metadata> {
            let mut m = Metadata::new();
            m.insert(EXTRACTORS_KEY.into(), json!("clobbered"));
            m.insert("n".into(), json!(1));
            Ok(m)
        }
    }

    fn labeler(name: &'static str, label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Extractor> {
        Arc::new(Labeler { name, label, log: log.clone() })
    }

    #[test]
    fn runs_in_descending_priority_and_later_writes_win() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = ExtractorPipeline::new(vec![
            ExtractorEntry::new(labeler("B", "from-b", &log), 50),
            ExtractorEntry::new(labeler("A", "from-a", &log), 100),
        ]);
        assert_eq!(pipeline.order(), vec!["A", "B"]);
        let docs = pipeline.extract(vec![Document::with_id("d", "text")]);
        assert_eq!(*log.lock().unwrap(), vec!["A", "B"]);
        assert_eq!(docs[0].metadata["label"], "from-b");
        assert_eq!(docs[0].metadata["extractors"]["A"]["label"], "from-a");
        assert_eq!(docs[0].metadata["extractors"]["B"]["label"], "from-b");
    }

    #[test]
    fn equal_priorities_keep_definition_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = ExtractorPipeline::new(vec![
            ExtractorEntry::new(labeler("first", "1", &log), 10),
            ExtractorEntry::new(labeler("second", "2", &log), 10),
            ExtractorEntry::new(labeler("third", "3", &log), 10),
        ]);
        assert_eq!(pipeline.order(), vec!["first", "second", "third"]);
    }

    #[test]
    fn failing_extractor_does_not_stop_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = ExtractorPipeline::new(vec![
            ExtractorEntry::new(Arc::new(Broken), 90),
            ExtractorEntry::new(labeler("ok", "fine", &log), 10),
        ]);
        let docs = pipeline.extract(vec![Document::with_id("d1", "x"), Document::with_id("d2", "y")]);
        assert_eq!(docs.len(), 2);
        for d in &docs {
            assert_eq!(d.metadata["label"], "fine");
            assert!(d.metadata["extractors"].get("Broken").is_none());
        }
    }

    #[test]
    fn disabled_extractors_are_skipped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut off = ExtractorEntry::new(labeler("off", "x", &log), 100);
        off.enabled = false;
        let pipeline = ExtractorPipeline::new(vec![off, ExtractorEntry::new(labeler("on", "y", &log), 1)]);
        assert_eq!(pipeline.order(), vec!["on"]);
    }

    #[test]
    fn flattening_never_overwrites_namespace() {
        let pipeline = ExtractorPipeline::new(vec![ExtractorEntry::new(Arc::new(Sneaky), 1)]);
        let docs = pipeline.extract(vec![Document::with_id("d", "x")]);
        assert!(docs[0].metadata["extractors"].is_object());
        assert_eq!(docs[0].metadata["extractors"]["Sneaky"]["n"], 1);
        assert_eq!(docs[0].metadata["n"], 1);
    }

    #[test]
    fn extract_leaves_content_untouched() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = ExtractorPipeline::new(vec![ExtractorEntry::new(labeler("a", "b", &log), 1)]);
        let docs = pipeline.extract(vec![Document::with_id("d", "original")]);
        assert_eq!(docs[0].content, "original");
    }
}
