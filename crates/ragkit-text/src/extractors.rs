use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Component, Path};
use tantivy::tokenizer::TextAnalyzer;

use ragkit_core::traits::Extractor;
use ragkit_core::types::{Document, Metadata};

use crate::tantivy_utils::{build_analyzer, tokens};

fn to_metadata(v: Value) -> Metadata {
	match v {
		Value::Object(m) => m,
		_ => Metadata::new(),
	}
}

/// Word, character, sentence and paragraph counts.
#[derive(Debug, Default)]
pub struct ContentStatisticsExtractor;

impl Extractor for ContentStatisticsExtractor {
	fn name(&self) -> &str { "ContentStatisticsExtractor" }

	fn extract(&self, document: &Document) -> anyhow::Result<Metadata> {
		let text = document.content.as_str();
		let word_count = text.split_whitespace().count();
		let char_count = text.chars().count();
		let paragraph_count = text.split("\n\n").filter(|p| !p.trim().is_empty()).count();
		let mut sentence_count = 0usize;
		let mut in_sentence = false;
		for c in text.chars() {
			if matches!(c, '.' | '!' | '?') {
				if in_sentence { sentence_count += 1; }
				in_sentence = false;
			} else if !c.is_whitespace() {
				in_sentence = true;
			}
		}
		if in_sentence { sentence_count += 1; }
		Ok(to_metadata(json!({
			"word_count": word_count,
			"char_count": char_count,
			"sentence_count": sentence_count,
			"paragraph_count": paragraph_count,
		})))
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
	pub max_keywords: usize,
	pub min_length: usize,
}

impl Default for KeywordConfig {
	fn default() -> Self { Self { max_keywords: 10, min_length: 3 } }
}

/// Most frequent non-stop-word terms, ties broken alphabetically.
pub struct KeywordExtractor {
	config: KeywordConfig,
	analyzer: TextAnalyzer,
}

impl KeywordExtractor {
	pub fn new(config: KeywordConfig) -> Self { Self { config, analyzer: build_analyzer() } }
}

impl Extractor for KeywordExtractor {
	fn name(&self) -> &str { "KeywordExtractor" }

	fn extract(&self, document: &Document) -> anyhow::Result<Metadata> {
		let mut analyzer = self.analyzer.clone();
		let mut freq: HashMap<String, usize> = HashMap::new();
		for t in tokens(&mut analyzer, &document.content) {
			if t.chars().count() < self.config.min_length || t.chars().all(|c| c.is_ascii_digit()) { continue; }
			*freq.entry(t).or_default() += 1;
		}
		let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
		ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
		ranked.truncate(self.config.max_keywords);
		let keywords: Vec<String> = ranked.into_iter().map(|(k, _)| k).collect();
		Ok(to_metadata(json!({ "keywords": keywords })))
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathConfig {
	/// Stripped from the source before computing the facet.
	pub base_dir: Option<String>,
	/// Number of directory levels kept in the facet.
	pub depth: usize,
}

impl Default for PathConfig {
	fn default() -> Self { Self { base_dir: None, depth: 2 } }
}

/// Hierarchical `category` facet plus file name and extension from the source path.
#[derive(Debug, Default)]
pub struct PathExtractor {
	config: PathConfig,
}

impl PathExtractor {
	pub fn new(config: PathConfig) -> Self { Self { config } }

	fn extract_category_from_path(&self, path: &Path) -> String {
		let relative = match &self.config.base_dir {
			Some(base) => path.strip_prefix(base).unwrap_or(path),
			None => path,
		};
		let dirs: Vec<String> = relative
			.parent()
			.map(|p| {
				p.components()
					.filter_map(|c| match c {
						Component::Normal(s) => Some(s.to_string_lossy().to_string()),
						_ => None,
					})
					.collect()
			})
			.unwrap_or_default();
		if dirs.is_empty() || self.config.depth == 0 { return "/misc".to_string(); }
		let kept = if self.config.base_dir.is_some() {
			&dirs[..dirs.len().min(self.config.depth)]
		} else {
			&dirs[dirs.len().saturating_sub(self.config.depth)..]
		};
		format!("/{}", kept.join("/"))
	}
}

impl Extractor for PathExtractor {
	fn name(&self) -> &str { "PathExtractor" }

	fn extract(&self, document: &Document) -> anyhow::Result<Metadata> {
		if document.source.is_empty() { anyhow::bail!("document {} has no source path", document.id); }
		let path = Path::new(&document.source);
		let file_name = path.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_default();
		let extension = path.extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default();
		Ok(to_metadata(json!({
			"category": self.extract_category_from_path(path),
			"file_name": file_name,
			"extension": extension,
		})))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn statistics_counts() {
		let doc = Document::with_id("d", "Fire burns. Water flows!\n\nIs it cold? yes");
		let out = ContentStatisticsExtractor.extract(&doc).unwrap();
		assert_eq!(out["word_count"], 8);
		assert_eq!(out["sentence_count"], 4);
		assert_eq!(out["paragraph_count"], 2);
	}

	#[test]
	fn keywords_by_frequency_then_alpha() {
		let doc = Document::with_id("d", "Fire safety: fire needs oxygen. Oxygen and fuel make fire. Tinder helps.");
		let ex = KeywordExtractor::new(KeywordConfig { max_keywords: 3, min_length: 3 });
		let out = ex.extract(&doc).unwrap();
		assert_eq!(out["keywords"], json!(["fire", "oxygen", "fuel"]));
	}

	#[test]
	fn path_facet_with_and_without_base() {
		let doc = Document::from_chunk("/data/txt/survival/fire/starting.txt", 0, "x");
		let tail = PathExtractor::default().extract(&doc).unwrap();
		assert_eq!(tail["category"], "/survival/fire");
		assert_eq!(tail["file_name"], "starting.txt");
		assert_eq!(tail["extension"], "txt");

		let based = PathExtractor::new(PathConfig { base_dir: Some("/data/txt".into()), depth: 1 }).extract(&doc).unwrap();
		assert_eq!(based["category"], "/survival");

		let top = Document::from_chunk("notes.txt", 0, "x");
		assert_eq!(PathExtractor::default().extract(&top).unwrap()["category"], "/misc");
	}

	#[test]
	fn path_extractor_fails_without_source() {
		assert!(PathExtractor::default().extract(&Document::with_id("d", "x")).is_err());
	}
}
