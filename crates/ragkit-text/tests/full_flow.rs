use std::sync::Arc;

use ragkit_core::extract::{ExtractorEntry, ExtractorPipeline};
use ragkit_core::types::Document;
use ragkit_text::{ContentStatisticsExtractor, KeywordConfig, KeywordExtractor, PathExtractor};

#[test]
fn builtin_extractors_enrich_both_layers() {
    let pipeline = ExtractorPipeline::new(vec![
        ExtractorEntry::new(Arc::new(KeywordExtractor::new(KeywordConfig::default())), 60),
        ExtractorEntry::new(Arc::new(ContentStatisticsExtractor), 90),
        ExtractorEntry::new(Arc::new(PathExtractor::default()), 30),
    ]);
    assert_eq!(pipeline.order(), vec!["ContentStatisticsExtractor", "KeywordExtractor", "PathExtractor"]);

    let docs = vec![
        Document::from_chunk("/kb/outdoor/fire/basics.txt", 0, "Firecraft basics. Dry tinder catches fire fast."),
        Document::from_chunk("", 0, "A chunk without a source path."),
    ];
    let out = pipeline.extract(docs);

    let first = &out[0];
    assert_eq!(first.metadata["word_count"], 7);
    assert_eq!(first.metadata["extractors"]["ContentStatisticsExtractor"]["word_count"], 7);
    assert_eq!(first.metadata["category"], "/outdoor/fire");
    assert!(first.metadata["keywords"].as_array().unwrap().iter().any(|k| k == "fire"));

    // path extraction fails for the second document; the others still ran
    let second = &out[1];
    assert!(second.metadata.get("category").is_none());
    assert!(second.metadata["extractors"].get("PathExtractor").is_none());
    assert_eq!(second.metadata["sentence_count"], 1);
}
