//! Content loader - reads content units and static assets from the source directory

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use super::unit::{PAGES, POSTS};
use super::{ContentUnit, FrontMatter, StaticAsset};
use crate::error::BuildError;
use crate::Site;

/// Extensions whose files carry text content (and may carry front matter)
const CONTENT_EXTENSIONS: [&str; 6] = ["md", "markdown", "html", "htm", "xml", "txt"];

/// Everything found in the source directory
#[derive(Debug, Default)]
pub struct LoadedContent {
    /// Units in source-identifier order
    pub units: Vec<ContentUnit>,
    pub assets: Vec<StaticAsset>,
    /// Files that could not be read or whose front matter is malformed
    pub errors: Vec<BuildError>,
}

/// Loads content from the source directory
pub struct ContentLoader<'a> {
    site: &'a Site,
    excludes: Vec<glob::Pattern>,
}

impl<'a> ContentLoader<'a> {
    pub fn new(site: &'a Site) -> Result<Self> {
        let excludes = site
            .config
            .exclude
            .iter()
            .map(|p| glob::Pattern::new(p).with_context(|| format!("bad exclude pattern `{}`", p)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { site, excludes })
    }

    /// Walk the source directory
    pub fn load(&self) -> LoadedContent {
        let mut loaded = LoadedContent::default();
        let source_dir = &self.site.source_dir;
        if !source_dir.exists() {
            tracing::warn!("Source directory {:?} does not exist", source_dir);
            return loaded;
        }

        let walker = WalkDir::new(source_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.keep_entry(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                    loaded.errors.push(BuildError::io(path, source));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let id = relative_id(source_dir, path);
            if self.excludes.iter().any(|p| p.matches(&id)) {
                tracing::debug!("Excluded {}", id);
                continue;
            }

            let Some((kind, rel)) = self.classify(&id) else {
                continue;
            };

            if !is_content_file(path) {
                if kind == PAGES {
                    loaded.assets.push(StaticAsset {
                        id,
                        full_source: path.to_path_buf(),
                    });
                } else {
                    tracing::debug!("Skipping non-content file {} in collection {}", id, kind);
                }
                continue;
            }

            match load_unit(path, &id, &kind, &rel) {
                Ok(unit) => loaded.units.push(unit),
                Err(e) => loaded.errors.push(e),
            }
        }

        loaded.units.sort_by(|a, b| a.id.cmp(&b.id));
        tracing::debug!(
            "Loaded {} content units and {} static files",
            loaded.units.len(),
            loaded.assets.len()
        );
        loaded
    }

    /// Prune hidden directories, `_`-prefixed directories that are not
    /// collections, and the output directory.
    fn keep_entry(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            return false;
        }
        if entry.path().starts_with(&self.site.output_dir) {
            return false;
        }
        if entry.depth() == 1 && name.starts_with('_') {
            return entry.file_type().is_dir() && self.collection_for_dir(&name).is_some();
        }
        true
    }

    fn collection_for_dir(&self, dir: &str) -> Option<String> {
        let kind = dir.strip_prefix('_')?;
        if kind == POSTS || self.site.config.collections.iter().any(|c| c == kind) {
            Some(kind.to_string())
        } else {
            None
        }
    }

    /// Kind and collection-relative path for a source id
    fn classify(&self, id: &str) -> Option<(String, String)> {
        match id.split_once('/') {
            Some((first, rest)) if first.starts_with('_') => {
                let kind = self.collection_for_dir(first)?;
                Some((kind, rest.to_string()))
            }
            _ => Some((PAGES.to_string(), id.to_string())),
        }
    }
}

/// Read and parse one content file
fn load_unit(path: &Path, id: &str, kind: &str, rel: &str) -> Result<ContentUnit, BuildError> {
    let content = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
    let (fm, body) = FrontMatter::parse(&content).map_err(|e| BuildError::MalformedMetadata {
        source_id: id.to_string(),
        line: e.line,
        message: e.message,
    })?;

    let header = &content[..content.len() - body.len()];
    let mut unit = ContentUnit::new(id, kind, body).with_metadata(fm.metadata);
    unit.body_line = header.matches('\n').count() + 1;
    unit.rel_path = strip_extension(rel).to_string();
    unit.full_source = path.to_path_buf();
    Ok(unit)
}

/// Source path relative to `base`, always `/`-separated
pub fn relative_id(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn strip_extension(path: &str) -> &str {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..name_start + dot],
        _ => path,
    }
}

/// Check if a file is a content file
fn is_content_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| CONTENT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn site(dir: &Path, config: SiteConfig) -> Site {
        Site::with_config(dir, config)
    }

    #[test]
    fn test_classify_files() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        write(dir, "_posts/2024-01-01-a.md", "---\ntitle: A\n---\nA body");
        write(dir, "_talks/keynote.md", "keynote");
        write(dir, "_layouts/post.html", "{{ content }}");
        write(dir, "_drafts/x.md", "draft");
        write(dir, "about.md", "about");
        write(dir, "teaching/index.html", "<p>teaching</p>");
        write(dir, "assets/cv.pdf", "%PDF");
        write(dir, ".git/config", "hidden");
        write(dir, "_site/old.html", "stale");
        write(dir, "notes/skip.md", "excluded");

        let mut config = SiteConfig::default();
        config.collections = vec!["talks".to_string()];
        config.exclude = vec!["notes/**".to_string()];
        let site = site(dir, config);

        let loaded = ContentLoader::new(&site).unwrap().load();
        assert!(loaded.errors.is_empty(), "{:?}", loaded.errors);

        let ids: Vec<_> = loaded.units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "_posts/2024-01-01-a.md",
                "_talks/keynote.md",
                "about.md",
                "teaching/index.html"
            ]
        );
        let kinds: Vec<_> = loaded.units.iter().map(|u| u.kind.as_str()).collect();
        assert_eq!(kinds, ["posts", "talks", "pages", "pages"]);
        assert_eq!(loaded.units[0].rel_path, "2024-01-01-a");
        assert_eq!(loaded.units[0].body, "A body");
        assert_eq!(loaded.units[0].body_line, 4);
        assert_eq!(loaded.units[3].rel_path, "teaching/index");

        assert_eq!(loaded.assets.len(), 1);
        assert_eq!(loaded.assets[0].id, "assets/cv.pdf");
    }

    #[test]
    fn test_malformed_front_matter_is_reported() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "bad.md", "---\ntitle: never closed\n");
        write(tmp.path(), "good.md", "fine");
        let site = site(tmp.path(), SiteConfig::default());

        let loaded = ContentLoader::new(&site).unwrap().load();
        assert_eq!(loaded.units.len(), 1);
        assert_eq!(loaded.errors.len(), 1);
        assert!(matches!(
            &loaded.errors[0],
            BuildError::MalformedMetadata { source_id, .. } if source_id == "bad.md"
        ));
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("a/b.md"), "a/b");
        assert_eq!(strip_extension("v1.2/readme"), "v1.2/readme");
        assert_eq!(strip_extension(".hidden"), ".hidden");
    }
}
