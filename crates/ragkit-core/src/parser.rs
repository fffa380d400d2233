//! Built-in text parsers and the paragraph-packing chunker.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::Parser;
use crate::types::Document;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters. `0` keeps the whole input as one chunk.
    pub chunk_size: usize,
    /// Characters repeated between consecutive chunks of an oversized paragraph.
    #[serde(alias = "overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 100 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Markdown,
}

/// Plain text and Markdown parser.
///
/// Paragraphs (blank-line separated) are packed into chunks up to `chunk_size`;
/// a paragraph longer than that is split on word boundaries with overlap.
/// Markdown input is first split into heading sections.
#[derive(Debug, Clone)]
pub struct TextParser {
    name: &'static str,
    format: TextFormat,
    chunking: ChunkingConfig,
}

impl TextParser {
    pub fn plain(chunking: ChunkingConfig) -> Self {
        Self { name: "PlainTextParser", format: TextFormat::Plain, chunking }
    }

    pub fn markdown(chunking: ChunkingConfig) -> Self {
        Self { name: "MarkdownParser", format: TextFormat::Markdown, chunking }
    }

    fn extensions(&self) -> &'static [&'static str] {
        match self.format {
            TextFormat::Plain => &["txt", "text", "log"],
            TextFormat::Markdown => &["md", "markdown"],
        }
    }

    fn chunk_source(&self, text: &str, source: &str) -> Vec<Document> {
        let sections: Vec<(Option<String>, String)> = match self.format {
            TextFormat::Plain => vec![(None, text.to_string())],
            TextFormat::Markdown => split_markdown_sections(text),
        };
        let mut pieces = Vec::new();
        for (section, body) in sections {
            for chunk in self.chunk_text(&body) {
                pieces.push((section.clone(), chunk));
            }
        }
        let total_chunks = pieces.len();
        let file_name = Path::new(source).file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_default();
        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (section, content))| {
                let mut doc = Document::from_chunk(source, chunk_index, content)
                    .with_metadata("chunk_index", chunk_index)
                    .with_metadata("total_chunks", total_chunks)
                    .with_metadata("parser", self.name);
                if !file_name.is_empty() {
                    doc.metadata.insert("file_name".into(), Value::from(file_name.clone()));
                }
                if let Some(section) = section {
                    doc.metadata.insert("section".into(), Value::from(section));
                }
                doc
            })
            .collect()
    }

    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let size = self.chunking.chunk_size;
        if size == 0 {
            let whole = text.trim();
            return if whole.is_empty() { vec![] } else { vec![whole.to_string()] };
        }
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;
        for paragraph in text.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() { continue; }
            let len = paragraph.chars().count();
            if len > size {
                if !current.is_empty() { chunks.push(std::mem::take(&mut current)); current_len = 0; }
                chunks.extend(self.split_paragraph_with_overlap(paragraph));
                continue;
            }
            if !current.is_empty() && current_len + 2 + len > size {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() { current.push_str("\n\n"); current_len += 2; }
            current.push_str(paragraph);
            current_len += len;
        }
        if !current.is_empty() { chunks.push(current); }
        chunks
    }

    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let size = self.chunking.chunk_size;
        let overlap = self.chunking.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let mut end = start;
            let mut len = 0usize;
            while end < words.len() {
                let w = words[end].chars().count() + usize::from(end > start);
                if end > start && len + w > size { break; }
                len += w;
                end += 1;
            }
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            let mut back = end;
            let mut carried = 0usize;
            while back > start + 1 {
                let w = words[back - 1].chars().count() + 1;
                if carried + w > overlap { break; }
                carried += w;
                back -= 1;
            }
            start = back;
        }
        chunks
    }
}

fn split_markdown_sections(text: &str) -> Vec<(Option<String>, String)> {
    let mut sections = Vec::new();
    let mut heading: Option<String> = None;
    let mut body = String::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        let is_heading = trimmed.starts_with('#') && trimmed.trim_start_matches('#').starts_with(' ');
        if is_heading {
            if !body.trim().is_empty() { sections.push((heading.take(), std::mem::take(&mut body))); }
            body.clear();
            heading = Some(trimmed.trim_start_matches('#').trim().to_string());
        }
        body.push_str(line);
        body.push('\n');
    }
    if !body.trim().is_empty() { sections.push((heading, body)); }
    sections
}

fn read_file_content<'a>(bytes: &'a [u8], source: &str) -> Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| Error::parsing(source, format!("not valid UTF-8 ({e})")))
}

#[async_trait]
impl Parser for TextParser {
    fn name(&self) -> &str { self.name }

    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions().iter().any(|x| x.eq_ignore_ascii_case(e)))
    }

    async fn parse_file(&self, path: &Path) -> Result<Vec<Document>> {
        let source = path.to_string_lossy().to_string();
        if !self.supports(path) {
            return Err(Error::parsing(&source, format!("{} does not handle this file type", self.name)));
        }
        let bytes = tokio::fs::read(path).await.map_err(|e| Error::parsing(&source, e))?;
        self.parse_bytes(&bytes, &source).await
    }

    async fn parse_bytes(&self, bytes: &[u8], source: &str) -> Result<Vec<Document>> {
        let text = read_file_content(bytes, source)?;
        let docs = self.chunk_source(text, source);
        debug!(parser = self.name, source, chunks = docs.len(), "parsed");
        Ok(docs)
    }
}

/// Expand files and directories into the sorted list of files `parser` supports.
/// Explicit file paths are kept even when the extension is not recognised, so
/// `parse_file` reports them as parsing failures.
pub fn collect_inputs(paths: &[PathBuf], parser: &dyn Parser) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in paths {
        if root.is_dir() {
            let mut found: Vec<PathBuf> = walkdir::WalkDir::new(root)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.path().to_path_buf())
                .filter(|p| parser.supports(p))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(root.clone());
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(size: usize, overlap: usize) -> TextParser {
        TextParser::plain(ChunkingConfig { chunk_size: size, chunk_overlap: overlap })
    }

    #[test]
    fn packs_small_paragraphs_together() {
        let p = parser(40, 0);
        let chunks = p.chunk_text("alpha bravo\n\ncharlie delta\n\necho foxtrot golf hotel india juliet");
        assert_eq!(chunks, vec!["alpha bravo\n\ncharlie delta", "echo foxtrot golf hotel india juliet"]);
    }

    #[test]
    fn long_paragraph_is_split_with_overlap() {
        let p = parser(11, 6);
        let chunks = p.chunk_text("aaaa bbbb cccc dddd");
        assert_eq!(chunks, vec!["aaaa bbbb", "bbbb cccc", "cccc dddd"]);
    }

    #[test]
    fn split_always_makes_progress() {
        let p = parser(3, 100);
        let chunks = p.chunk_text("longword another");
        assert_eq!(chunks, vec!["longword", "another"]);
    }

    #[test]
    fn zero_chunk_size_keeps_whole_document() {
        let p = parser(0, 0);
        assert_eq!(p.chunk_text("  one\n\ntwo  "), vec!["one\n\ntwo"]);
        assert!(p.chunk_text("   ").is_empty());
    }

    #[test]
    fn markdown_sections_are_recorded() {
        let p = TextParser::markdown(ChunkingConfig::default());
        let docs = p.chunk_source("intro text\n# Setup\ninstall it\n## Usage\nrun it\n", "guide.md");
        assert_eq!(docs.len(), 3);
        assert!(docs[0].metadata.get("section").is_none());
        assert_eq!(docs[1].metadata["section"], "Setup");
        assert_eq!(docs[2].metadata["section"], "Usage");
        assert_eq!(docs[2].metadata["chunk_index"], 2);
        assert_eq!(docs[2].metadata["total_chunks"], 3);
        assert_eq!(docs[0].metadata["file_name"], "guide.md");
    }

    #[test]
    fn supports_by_extension() {
        let plain = parser(10, 0);
        assert!(plain.supports(Path::new("a/b.TXT")));
        assert!(!plain.supports(Path::new("a/b.md")));
        assert!(TextParser::markdown(ChunkingConfig::default()).supports(Path::new("x.md")));
    }
}
