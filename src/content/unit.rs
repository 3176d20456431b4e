//! Content units and static assets

use indexmap::IndexMap;
use std::path::PathBuf;

use super::Value;

/// Kind assigned to files outside any collection directory
pub const PAGES: &str = "pages";
/// Kind assigned to files under `_posts`
pub const POSTS: &str = "posts";

/// One source document: metadata plus body text
#[derive(Debug, Clone)]
pub struct ContentUnit {
    /// Source path relative to the source directory, `/`-separated
    pub id: String,

    /// Collection this unit belongs to (`posts`, `pages`, ...)
    pub kind: String,

    /// Path relative to the collection's own directory, without extension
    pub rel_path: String,

    /// Front-matter metadata, in declaration order
    pub metadata: IndexMap<String, Value>,

    /// Text after the front matter
    pub body: String,

    /// Source line on which `body` starts
    pub body_line: usize,

    /// Source extension, lowercased, without the dot
    pub extension: String,

    /// Full source file path
    pub full_source: PathBuf,
}

impl ContentUnit {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, body: impl Into<String>) -> Self {
        let id = id.into();
        let file_name = id.rsplit('/').next().unwrap_or(&id);
        let extension = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_string(),
            _ => String::new(),
        };
        let rel_path = if extension.is_empty() {
            id.clone()
        } else {
            id[..id.len() - extension.len() - 1].to_string()
        };
        let extension = extension.to_ascii_lowercase();
        Self {
            full_source: PathBuf::from(&id),
            id,
            kind: kind.into(),
            rel_path,
            metadata: IndexMap::new(),
            body: body.into(),
            body_line: 1,
            extension,
        }
    }

    pub fn with_metadata(mut self, metadata: IndexMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// A metadata value that is a non-empty string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Whether the body is markdown and gets converted to HTML
    pub fn is_markdown(&self) -> bool {
        matches!(self.extension.as_str(), "md" | "markdown")
    }

    /// Extension of the rendered file, with its dot
    pub fn output_ext(&self) -> String {
        if self.is_markdown() || self.extension == "htm" {
            ".html".to_string()
        } else if self.extension.is_empty() {
            String::new()
        } else {
            format!(".{}", self.extension)
        }
    }

    /// File name without directory and extension
    pub fn file_stem(&self) -> &str {
        self.rel_path.rsplit('/').next().unwrap_or(&self.rel_path)
    }

    /// Title from metadata, else the file stem
    pub fn title(&self) -> String {
        self.get("title")
            .and_then(|v| v.scalar_string())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.file_stem().to_string())
    }

    /// Units with `published: false` are drafts
    pub fn is_published(&self) -> bool {
        !matches!(self.get("published"), Some(Value::Bool(false)))
    }
}

/// A file copied to the output verbatim
#[derive(Debug, Clone)]
pub struct StaticAsset {
    /// Path relative to the source directory, `/`-separated
    pub id: String,
    pub full_source: PathBuf,
}
