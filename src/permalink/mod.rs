//! Permalink router - maps each unit to its public URL and output file

use chrono::DateTime;
use chrono_tz::Tz;
use std::collections::{BTreeMap, HashMap};

use crate::collection::{Collections, Entry};
use crate::config::SiteConfig;
use crate::content::StaticAsset;
use crate::error::BuildError;
use crate::helpers::{slugify, split_date_prefix};

/// Placeholder names, longest first so `:i_month` wins over `:month`
const PLACEHOLDERS: [&str; 16] = [
    "categories",
    "collection",
    "output_ext",
    "short_year",
    "i_month",
    "minute",
    "second",
    "i_day",
    "month",
    "title",
    "hour",
    "name",
    "path",
    "slug",
    "year",
    "day",
];

/// Where a unit is published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPath {
    /// Site-relative URL, starting with `/`
    pub url: String,
    /// File under the output directory, `/`-separated
    pub file: String,
}

impl OutputPath {
    pub fn from_url(url: String) -> Self {
        let file = file_for_url(&url);
        Self { url, file }
    }
}

/// Routes of every unit and asset, keyed by source id
#[derive(Debug, Clone, Default)]
pub struct Routes {
    paths: HashMap<String, OutputPath>,
}

impl Routes {
    pub fn get(&self, id: &str) -> Option<&OutputPath> {
        self.paths.get(id)
    }

    pub fn url(&self, id: &str) -> Option<&str> {
        self.paths.get(id).map(|p| p.url.as_str())
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

pub struct Router {
    tz: Tz,
    config: SiteConfig,
}

impl Router {
    pub fn new(config: &SiteConfig) -> anyhow::Result<Self> {
        Ok(Self {
            tz: config.tz()?,
            config: config.clone(),
        })
    }

    /// Output location of one entry.
    ///
    /// Fails when `..` segments climb above the site root.
    pub fn route(&self, entry: &Entry) -> Result<OutputPath, BuildError> {
        let pattern = match entry.unit.get_str("permalink") {
            Some(permalink) => permalink.to_string(),
            None => self.config.permalink_for(&entry.unit.kind),
        };
        let expanded = self.expand(&pattern, entry);
        match normalize_url(&expanded) {
            Some(url) => Ok(OutputPath::from_url(url)),
            None => Err(BuildError::InvalidPermalink {
                source_id: entry.unit.id.clone(),
                permalink: expanded,
            }),
        }
    }

    /// Static assets keep their source path
    pub fn route_asset(&self, asset: &StaticAsset) -> OutputPath {
        OutputPath {
            url: format!("/{}", asset.id),
            file: asset.id.clone(),
        }
    }

    /// Route everything, reporting every output file claimed twice and
    /// every permalink that leaves the output directory
    pub fn route_all(&self, collections: &Collections, assets: &[StaticAsset]) -> (Routes, Vec<BuildError>) {
        let mut routes = Routes::default();
        let mut owners: BTreeMap<String, String> = BTreeMap::new();
        let mut errors = Vec::new();

        let units = collections.entries().map(|e| (e.unit.id.as_str(), self.route(e)));
        let files = assets.iter().map(|a| (a.id.as_str(), Ok(self.route_asset(a))));

        for (id, path) in units.chain(files) {
            let path = match path {
                Ok(path) => path,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            match owners.get(&path.file) {
                Some(first) => errors.push(BuildError::PermalinkCollision {
                    path: path.file.clone(),
                    first: first.clone(),
                    second: id.to_string(),
                }),
                None => {
                    owners.insert(path.file.clone(), id.to_string());
                }
            }
            tracing::trace!("{} -> {}", id, path.url);
            routes.paths.insert(id.to_string(), path);
        }

        (routes, errors)
    }

    /// Substitute placeholders in a single left-to-right pass, so values
    /// that themselves contain `:name` are left alone.
    pub fn expand(&self, pattern: &str, entry: &Entry) -> String {
        let mut out = String::with_capacity(pattern.len() + 16);
        let mut rest = pattern;

        while let Some(pos) = rest.find(':') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            match PLACEHOLDERS.iter().find(|name| after.starts_with(*name)) {
                Some(name) => {
                    out.push_str(&self.placeholder(name, entry));
                    rest = &after[name.len()..];
                }
                None => {
                    out.push(':');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn placeholder(&self, name: &str, entry: &Entry) -> String {
        let unit = &entry.unit;
        let date = |fmt: &str| {
            entry
                .date
                .as_ref()
                .map(|d: &DateTime<Tz>| d.with_timezone(&self.tz).format(fmt).to_string())
                .unwrap_or_default()
        };

        match name {
            "year" => date("%Y"),
            "short_year" => date("%y"),
            "month" => date("%m"),
            "day" => date("%d"),
            "i_month" => date("%-m"),
            "i_day" => date("%-d"),
            "hour" => date("%H"),
            "minute" => date("%M"),
            "second" => date("%S"),
            "title" => match unit.get_str("title") {
                Some(title) => slugify(title),
                None => slug_for(entry),
            },
            "slug" => slug_for(entry),
            "name" => unit.file_stem().to_string(),
            "path" => unit.rel_path.clone(),
            "collection" => unit.kind.clone(),
            "categories" => entry
                .categories
                .iter()
                .map(|c| slugify(c))
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
                .join("/"),
            "output_ext" => unit.output_ext(),
            _ => String::new(),
        }
    }
}

/// `slug` metadata, else the file stem without a `YYYY-MM-DD-` prefix
fn slug_for(entry: &Entry) -> String {
    match entry.unit.get_str("slug") {
        Some(slug) => slugify(slug),
        None => slugify(strip_date_prefix(entry.unit.file_stem())),
    }
}

fn strip_date_prefix(stem: &str) -> &str {
    split_date_prefix(stem).map_or(stem, |(_, rest)| rest)
}

/// Collapse empty and `.` segments, resolve `..`, force a leading `/`, and
/// reduce a trailing `index.html` or `index/` to its directory.
///
/// `None` when `..` climbs above the root.
pub fn normalize_url(url: &str) -> Option<String> {
    let trailing = matches!(url.rsplit('/').next(), Some("" | "." | ".."));
    let mut segments: Vec<&str> = Vec::new();
    for segment in url.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            segment => segments.push(segment),
        }
    }
    let mut out = format!("/{}", segments.join("/"));
    if trailing && out.len() > 1 {
        out.push('/');
    }

    for suffix in ["/index.html", "/index/"] {
        if out == suffix.trim_end_matches('/') || out == suffix {
            return Some("/".to_string());
        }
        if let Some(dir) = out.strip_suffix(suffix) {
            return Some(format!("{}/", dir));
        }
    }
    Some(out)
}

/// A URL ending in `/` or without an extension is a directory
fn file_for_url(url: &str) -> String {
    let path = url.trim_start_matches('/');
    let last = path.rsplit('/').next().unwrap_or("");
    if path.is_empty() || url.ends_with('/') {
        format!("{}index.html", path)
    } else if !last.contains('.') {
        format!("{}/index.html", path)
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentUnit, Value};
    use crate::helpers::parse_date;
    use indexmap::IndexMap;

    fn entry(id: &str, kind: &str, meta: &[(&str, &str)], date: Option<&str>) -> Entry {
        let metadata: IndexMap<String, Value> = meta
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect();
        let mut unit = ContentUnit::new(id, kind, "").with_metadata(metadata);
        if let Some(rest) = id.strip_prefix(&format!("_{}/", kind)) {
            unit.rel_path = rest.rsplit_once('.').map(|(p, _)| p).unwrap_or(rest).to_string();
        }
        Entry {
            date: date.and_then(|d| parse_date(d, Tz::UTC)),
            categories: Vec::new(),
            tags: Vec::new(),
            excerpt: String::new(),
            unit,
        }
    }

    fn router() -> Router {
        Router::new(&SiteConfig::default()).unwrap()
    }

    #[test]
    fn test_post_default_pattern() {
        let e = entry(
            "_posts/2024-03-05-hello.md",
            "posts",
            &[("title", "Hello, World")],
            Some("2024-03-05"),
        );
        let out = router().route(&e).unwrap();
        assert_eq!(out.url, "/2024/03/05/hello-world/");
        assert_eq!(out.file, "2024/03/05/hello-world/index.html");
    }

    #[test]
    fn test_title_falls_back_to_slug() {
        let e = entry("_posts/2024-03-05-My Post.md", "posts", &[], Some("2024-03-05"));
        assert_eq!(router().route(&e).unwrap().url, "/2024/03/05/my-post/");
    }

    #[test]
    fn test_page_paths() {
        let r = router();
        assert_eq!(r.route(&entry("about.md", "pages", &[], None)).unwrap().url, "/about.html");
        let index = r.route(&entry("index.html", "pages", &[], None)).unwrap();
        assert_eq!(index.url, "/");
        assert_eq!(index.file, "index.html");
        let nested = r.route(&entry("teaching/index.md", "pages", &[], None)).unwrap();
        assert_eq!(nested.url, "/teaching/");
        assert_eq!(nested.file, "teaching/index.html");
        assert_eq!(r.route(&entry("feed.xml", "pages", &[], None)).unwrap().file, "feed.xml");
    }

    #[test]
    fn test_explicit_permalink_overrides() {
        let r = router();
        let e = entry("cv.md", "pages", &[("permalink", "/cv/")], None);
        assert_eq!(r.route(&e).unwrap().file, "cv/index.html");
        let e = entry(
            "_posts/2024-01-02-x.md",
            "posts",
            &[("permalink", "/archive/:year/:i_month/:slug")],
            Some("2024-01-02"),
        );
        let out = r.route(&e).unwrap();
        assert_eq!(out.url, "/archive/2024/1/x");
        assert_eq!(out.file, "archive/2024/1/x/index.html");
    }

    #[test]
    fn test_collection_pattern() {
        let out = router().route(&entry("_talks/keynote.md", "talks", &[], None)).unwrap();
        assert_eq!(out.url, "/talks/keynote/");
    }

    #[test]
    fn test_missing_date_collapses() {
        let e = entry("_posts/undated.md", "posts", &[("title", "Undated")], None);
        assert_eq!(router().route(&e).unwrap().url, "/undated/");
    }

    #[test]
    fn test_longest_placeholder_and_unknown_names() {
        let e = entry(
            "_posts/2024-11-09-t.md",
            "posts",
            &[("permalink", "/:i_month-:month/:i_day:day/:nope/")],
            Some("2024-11-09"),
        );
        assert_eq!(router().route(&e).unwrap().url, "/11-11/909/:nope/");
    }

    #[test]
    fn test_date_in_site_timezone() {
        let config = SiteConfig {
            timezone: "America/New_York".to_string(),
            ..SiteConfig::default()
        };
        let r = Router::new(&config).unwrap();
        let e = entry(
            "_posts/late.md",
            "posts",
            &[("title", "Late")],
            Some("2024-03-06T02:00:00+00:00"),
        );
        assert_eq!(r.route(&e).unwrap().url, "/2024/03/05/late/");
    }

    #[test]
    fn test_categories_placeholder() {
        let mut e = entry("_posts/2024-01-01-c.md", "posts", &[("permalink", "/:categories/:slug/")], None);
        e.categories = vec!["Dev Ops".to_string(), "Rust".to_string()];
        assert_eq!(router().route(&e).unwrap().url, "/dev-ops/rust/c/");
    }

    #[test]
    fn test_collisions_are_all_reported() {
        use crate::collection::{build, CollectOptions};

        let units = vec![
            ContentUnit::new("about.md", "pages", ""),
            ContentUnit::new("about.html", "pages", ""),
            ContentUnit::new("style.md", "pages", ""),
        ];
        let (collections, _) = build(units, &CollectOptions::default());
        let assets = vec![StaticAsset {
            id: "style.html".to_string(),
            full_source: Default::default(),
        }];

        let (routes, errors) = router().route_all(&collections, &assets);
        assert_eq!(routes.len(), 4);
        assert_eq!(errors.len(), 2);
        let paths: Vec<_> = errors
            .iter()
            .map(|e| match e {
                BuildError::PermalinkCollision { path, .. } => path.as_str(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(paths, ["about.html", "style.html"]);
    }

    #[test]
    fn test_normalize_url() {
        let norm = |url: &str| normalize_url(url).unwrap();
        assert_eq!(norm("//a//b/"), "/a/b/");
        assert_eq!(norm("a"), "/a");
        assert_eq!(norm("/index.html"), "/");
        assert_eq!(norm("/docs/index/"), "/docs/");
        assert_eq!(norm(""), "/");
        assert_eq!(norm("/./a/./b"), "/a/b");
        assert_eq!(norm("/a/b/../c/"), "/a/c/");
        assert_eq!(norm("/a/.."), "/");
        assert_eq!(norm("/a/b/.."), "/a/");
        assert_eq!(normalize_url("/.."), None);
        assert_eq!(normalize_url("/x/../../escaped/"), None);
    }

    #[test]
    fn test_dot_segments_collide_with_plain_path() {
        use crate::collection::{build, CollectOptions};

        let permalink = |id: &str, p: &str| {
            let mut meta = IndexMap::new();
            meta.insert("permalink".to_string(), Value::from(p));
            ContentUnit::new(id, "pages", "").with_metadata(meta)
        };
        let units = vec![permalink("a.md", "/same/"), permalink("b.md", "/./same/")];
        let (collections, _) = build(units, &CollectOptions::default());

        let (_, errors) = router().route_all(&collections, &[]);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            BuildError::PermalinkCollision { path, first, second }
                if path == "same/index.html" && first == "a.md" && second == "b.md"
        ));
    }

    #[test]
    fn test_permalink_above_root_is_rejected() {
        let e = entry("c.md", "pages", &[("permalink", "/x/../../escaped/")], None);
        let err = router().route(&e).unwrap_err();
        assert!(matches!(
            err,
            BuildError::InvalidPermalink { ref source_id, .. } if source_id == "c.md"
        ));
    }

    #[test]
    fn test_short_year() {
        let e = entry(
            "_posts/2024-01-02-x.md",
            "posts",
            &[("permalink", "/:short_year/:slug/")],
            Some("2024-01-02"),
        );
        assert_eq!(router().route(&e).unwrap().url, "/24/x/");
    }

    #[test]
    fn test_strip_date_prefix() {
        assert_eq!(strip_date_prefix("2024-01-02-hello"), "hello");
        assert_eq!(strip_date_prefix("2024-01-02"), "2024-01-02");
        assert_eq!(strip_date_prefix("hello-2024"), "hello-2024");
    }
}
