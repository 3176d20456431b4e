//! Generator module - renders every unit through its templates and layouts
//! and writes the site

use anyhow::Result;
use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

use crate::collection::{self, CollectOptions, Collection, Collections, Entry};
use crate::content::loader::{relative_id, ContentLoader};
use crate::content::{FrontMatter, MarkdownRenderer, StaticAsset, Value, PAGES, POSTS};
use crate::data::load_data;
use crate::error::{BuildError, BuildReport};
use crate::helpers::date_xml;
use crate::permalink::{Router, Routes};
use crate::template::{Engine, Filters, RenderContext, Template, TemplateError};
use crate::Site;

/// Longest `layout:` chain followed before giving up
const MAX_LAYOUT_DEPTH: usize = 8;

/// Per-build switches from the command line
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Render units marked `published: false`
    pub drafts: bool,
    /// Empty the output directory before writing
    pub clean: bool,
}

/// A parsed layout file
struct Layout {
    /// Source id, for error messages
    id: String,
    /// Line on which the template text starts
    body_line: usize,
    parent: Option<String>,
    metadata: IndexMap<String, Value>,
    template: Template,
}

/// One unit's rendered output, waiting to be written
struct Rendered {
    id: String,
    file: String,
    html: String,
}

/// Static site generator
pub struct Generator<'a> {
    site: &'a Site,
    options: BuildOptions,
    markdown: MarkdownRenderer,
}

impl<'a> Generator<'a> {
    /// Create a new generator
    pub fn new(site: &'a Site, options: &BuildOptions) -> Self {
        Self {
            site,
            options: options.clone(),
            markdown: MarkdownRenderer::new(),
        }
    }

    /// Run a full build.
    ///
    /// Per-unit problems are collected in the report and the remaining units
    /// are still written. Permalink collisions and permalinks that leave the
    /// site root stop the build before anything touches the output directory.
    /// The outer `Err` is reserved for invalid configuration.
    pub fn generate(&self) -> Result<BuildReport> {
        let config = &self.site.config;
        let mut report = BuildReport::new();

        // Load content
        let loaded = ContentLoader::new(self.site)?.load();
        report.extend(loaded.errors);
        tracing::info!(
            "Loaded {} content units and {} static files",
            loaded.units.len(),
            loaded.assets.len()
        );

        let mut collect = CollectOptions::from_config(config)?;
        collect.render_drafts |= self.options.drafts;
        let (collections, errors) = collection::build(loaded.units, &collect);
        report.extend(errors);

        // Route everything before writing anything
        let router = Router::new(config)?;
        let (routes, errors) = router.route_all(&collections, &loaded.assets);
        if !errors.is_empty() {
            report.extend(errors);
            tracing::error!("Permalink errors found, nothing was written");
            return Ok(report);
        }

        let (data, errors) = load_data(&self.site.data_dir);
        report.extend(errors);

        let mut engine = Engine::new(Filters::from_config(config)?);
        report.extend(self.load_includes(&mut engine));
        let (layouts, errors) = self.load_layouts();
        report.extend(errors);

        let site = Arc::new(site_context(config.to_value(), data, &collections, &routes));
        let root = RenderContext::new().with_shared_layer(site);

        // Render in parallel, write in unit order
        let jobs: Vec<(&Collection, usize)> = collections
            .iter()
            .flat_map(|c| (0..c.len()).map(move |i| (c, i)))
            .collect();
        let results: Vec<Result<Rendered, BuildError>> = jobs
            .par_iter()
            .map(|(collection, i)| self.render_entry(collection, *i, &routes, &root, &engine, &layouts))
            .collect();

        if self.options.clean {
            crate::commands::clean::run(self.site)?;
        }

        for result in results {
            match result {
                Ok(rendered) => match write_output(&self.site.output_dir, &rendered.file, rendered.html.as_bytes()) {
                    Ok(()) => {
                        tracing::debug!("Generated {} -> {}", rendered.id, rendered.file);
                        report.rendered += 1;
                    }
                    Err(e) => report.push(e),
                },
                Err(e) => report.push(e),
            }
        }

        for asset in &loaded.assets {
            match copy_asset(&self.site.output_dir, asset, &routes) {
                Ok(()) => report.copied += 1,
                Err(e) => report.push(e),
            }
        }

        Ok(report)
    }

    /// Body template, then markdown, then the layout chain
    fn render_entry(
        &self,
        collection: &Collection,
        index: usize,
        routes: &Routes,
        root: &RenderContext,
        engine: &Engine,
        layouts: &HashMap<String, Layout>,
    ) -> Result<Rendered, BuildError> {
        let entry = &collection.entries[index];
        let unit = &entry.unit;
        let route = routes.get(&unit.id).ok_or_else(|| BuildError::UnresolvedDirective {
            source_id: unit.id.clone(),
            line: 1,
            message: "unit has no route".to_string(),
        })?;

        let mut page = match entry_value(entry, routes) {
            Value::Map(map) => map,
            _ => IndexMap::new(),
        };
        if collection.kind != PAGES {
            let neighbor = |i: Option<usize>| {
                i.and_then(|i| collection.entries.get(i))
                    .map(|e| nav_value(e, routes))
                    .unwrap_or_default()
            };
            page.insert("previous".to_string(), neighbor(index.checked_add(1)));
            page.insert("next".to_string(), neighbor(index.checked_sub(1)));
        }

        let mut vars = unit.metadata.clone();
        vars.insert("page".to_string(), Value::Map(page));
        let ctx = root.with_layer(vars);

        let directive_error = |e: TemplateError, id: &str, first_line: usize| BuildError::UnresolvedDirective {
            source_id: id.to_string(),
            line: first_line + e.line() - 1,
            message: e.to_string(),
        };

        let template =
            Template::parse(&unit.id, &unit.body).map_err(|e| directive_error(e, &unit.id, unit.body_line))?;
        let mut content = engine
            .render(&template, &ctx)
            .map_err(|e| directive_error(e, &unit.id, unit.body_line))?;
        if unit.is_markdown() {
            content = self.markdown.render(&content);
        }

        let mut layout_name = match unit.get("layout") {
            Some(Value::Null) => None,
            Some(value) => match value.scalar_string() {
                Some(name) if name == "none" || name.is_empty() => None,
                Some(name) => Some(name),
                None => None,
            },
            None => self
                .site
                .config
                .default_layout(&unit.kind)
                .filter(|name| layouts.contains_key(*name))
                .map(str::to_string),
        };

        let mut seen = HashSet::new();
        while let Some(name) = layout_name {
            let Some(layout) = layouts.get(&name) else {
                return Err(BuildError::UnresolvedDirective {
                    source_id: unit.id.clone(),
                    line: 1,
                    message: format!("layout `{}` not found", name),
                });
            };
            if !seen.insert(name.clone()) || seen.len() > MAX_LAYOUT_DEPTH {
                return Err(BuildError::UnresolvedDirective {
                    source_id: layout.id.clone(),
                    line: 1,
                    message: format!("layout chain through `{}` is cyclic or too deep", name),
                });
            }

            let mut vars = IndexMap::new();
            vars.insert("content".to_string(), Value::String(content));
            vars.insert("layout".to_string(), Value::Map(layout.metadata.clone()));
            content = engine
                .render(&layout.template, &ctx.with_layer(vars))
                .map_err(|e| directive_error(e, &layout.id, layout.body_line))?;
            layout_name = layout.parent.clone();
        }

        Ok(Rendered {
            id: unit.id.clone(),
            file: route.file.clone(),
            html: content,
        })
    }

    /// Layouts by file stem: `_layouts/post.html` is `post`
    fn load_layouts(&self) -> (HashMap<String, Layout>, Vec<BuildError>) {
        let mut layouts = HashMap::new();
        let mut errors = Vec::new();

        for (path, id) in template_files(&self.site.layouts_dir, &self.site.base_dir) {
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    errors.push(BuildError::io(&path, e));
                    continue;
                }
            };
            let (fm, body) = match FrontMatter::parse(&content) {
                Ok(parsed) => parsed,
                Err(e) => {
                    errors.push(BuildError::MalformedMetadata {
                        source_id: id,
                        line: e.line,
                        message: e.message,
                    });
                    continue;
                }
            };
            let body_line = content[..content.len() - body.len()].matches('\n').count() + 1;
            let template = match Template::parse(&id, body) {
                Ok(template) => template,
                Err(e) => {
                    errors.push(BuildError::UnresolvedDirective {
                        source_id: id,
                        line: body_line + e.line() - 1,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let name = relative_id(&self.site.layouts_dir, &path);
            let name = name.rsplit_once('.').map(|(stem, _)| stem.to_string()).unwrap_or(name);
            let parent = fm
                .metadata
                .get("layout")
                .and_then(Value::scalar_string)
                .filter(|p| !p.is_empty() && p != "none");
            layouts.insert(
                name,
                Layout {
                    id,
                    body_line,
                    parent,
                    metadata: fm.metadata,
                    template,
                },
            );
        }

        tracing::debug!("Loaded {} layouts", layouts.len());
        (layouts, errors)
    }

    /// Register `_includes/` fragments under their path: `nav.html`, `partials/head.html`
    fn load_includes(&self, engine: &mut Engine) -> Vec<BuildError> {
        let mut errors = Vec::new();
        for (path, id) in template_files(&self.site.includes_dir, &self.site.base_dir) {
            let name = relative_id(&self.site.includes_dir, &path);
            let source = match fs::read_to_string(&path) {
                Ok(source) => source,
                Err(e) => {
                    errors.push(BuildError::io(&path, e));
                    continue;
                }
            };
            if let Err(e) = engine.register_include(&name, &source) {
                errors.push(BuildError::UnresolvedDirective {
                    source_id: id,
                    line: e.line(),
                    message: e.to_string(),
                });
            }
        }
        errors
    }
}

/// Files under `dir` in name order, with their ids relative to `base`
fn template_files(dir: &Path, base: &Path) -> Vec<(std::path::PathBuf, String)> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| {
            let id = relative_id(base, e.path());
            (e.into_path(), id)
        })
        .collect()
}

/// The shared site layer: every `site` key both at the top level and under
/// `site`, plus `site.data`, one list per collection, and the tag and
/// category indexes of the posts.
fn site_context(
    mut site: IndexMap<String, Value>,
    data: IndexMap<String, Value>,
    collections: &Collections,
    routes: &Routes,
) -> IndexMap<String, Value> {
    site.insert("data".to_string(), Value::Map(data));

    for collection in collections.iter() {
        let docs = collection.entries.iter().map(|e| entry_value(e, routes)).collect();
        site.insert(collection.kind.clone(), Value::List(docs));
    }

    let index_value = |index: std::collections::BTreeMap<String, Vec<usize>>, posts: &Collection| {
        let map: IndexMap<String, Value> = index
            .into_iter()
            .map(|(name, ids)| {
                let docs = ids.iter().map(|&i| entry_value(&posts.entries[i], routes)).collect();
                (name, Value::List(docs))
            })
            .collect();
        Value::Map(map)
    };
    let (tags, categories) = match collections.get(POSTS) {
        Some(posts) => (
            index_value(posts.tag_index(), posts),
            index_value(posts.category_index(), posts),
        ),
        None => (Value::Map(IndexMap::new()), Value::Map(IndexMap::new())),
    };
    site.insert("tags".to_string(), tags);
    site.insert("categories".to_string(), categories);

    let names: Vec<String> = collections.iter().map(|c| c.kind.clone()).collect();
    site.insert("collections".to_string(), Value::from(names));

    let mut root = site.clone();
    root.insert("site".to_string(), Value::Map(site));
    root
}

/// What templates see of a unit, as `page` or inside a collection list
fn entry_value(entry: &Entry, routes: &Routes) -> Value {
    let unit = &entry.unit;
    let mut map = unit.metadata.clone();
    map.insert("title".to_string(), Value::String(unit.title()));
    map.insert("id".to_string(), Value::from(unit.id.as_str()));
    map.insert("path".to_string(), Value::from(unit.id.as_str()));
    map.insert("collection".to_string(), Value::from(unit.kind.as_str()));
    map.insert(
        "url".to_string(),
        routes.url(&unit.id).map(Value::from).unwrap_or_default(),
    );
    map.insert(
        "date".to_string(),
        entry.date.as_ref().map(|d| Value::String(date_xml(d))).unwrap_or_default(),
    );
    map.insert("excerpt".to_string(), Value::String(entry.excerpt.clone()));
    map.insert("tags".to_string(), Value::from(entry.tags.clone()));
    map.insert("categories".to_string(), Value::from(entry.categories.clone()));
    map.insert("slug".to_string(), Value::from(unit.file_stem()));
    Value::Map(map)
}

/// Short form used for `page.previous` and `page.next`
fn nav_value(entry: &Entry, routes: &Routes) -> Value {
    let mut map = IndexMap::new();
    map.insert("title".to_string(), Value::String(entry.unit.title()));
    map.insert(
        "url".to_string(),
        routes.url(&entry.unit.id).map(Value::from).unwrap_or_default(),
    );
    map.insert("id".to_string(), Value::from(entry.unit.id.as_str()));
    map.insert(
        "date".to_string(),
        entry.date.as_ref().map(|d| Value::String(date_xml(d))).unwrap_or_default(),
    );
    Value::Map(map)
}

fn write_output(output_dir: &Path, file: &str, bytes: &[u8]) -> Result<(), BuildError> {
    let path = output_dir.join(file);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    fs::write(&path, bytes).map_err(|e| BuildError::io(&path, e))
}

fn copy_asset(output_dir: &Path, asset: &StaticAsset, routes: &Routes) -> Result<(), BuildError> {
    let file = routes.get(&asset.id).map(|r| r.file.as_str()).unwrap_or(&asset.id);
    let dest = output_dir.join(file);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    fs::copy(&asset.full_source, &dest).map_err(|e| BuildError::io(&asset.full_source, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read(dir: &Path, rel: &str) -> String {
        fs::read_to_string(dir.join("_site").join(rel)).unwrap()
    }

    fn build(dir: &Path) -> BuildReport {
        let site = Site::with_config(dir, SiteConfig::default());
        Generator::new(&site, &BuildOptions::default()).generate().unwrap()
    }

    fn blog(dir: &Path) {
        write(
            dir,
            "_layouts/default.html",
            "<title>{{ page.title }} | {{ site.title }}</title>{{ content }}",
        );
        write(
            dir,
            "_layouts/post.html",
            "---\nlayout: default\nkind: article\n---\n<article class=\"{{ layout.kind }}\">{{ content }}</article>{% if page.previous.url %}<a href=\"{{ page.previous.url }}\">prev</a>{% endif %}",
        );
        write(dir, "_includes/footer.html", "<footer>{{ include.note }}</footer>");
        write(dir, "_data/nav.yml", "- title: Home\n  url: /\n");
        write(
            dir,
            "_posts/2024-01-01-first.md",
            "---\ntitle: First Post\ntags: [rust]\n---\nHello *world*.",
        );
        write(
            dir,
            "_posts/2024-02-01-second.md",
            "---\ntitle: Second Post\ntags: [rust, web]\n---\nAgain.",
        );
        write(
            dir,
            "index.html",
            "---\nlayout: default\ntitle: Home\n---\n{% for p in site.posts %}<li>{{ p.title }} {{ p.url }}</li>{% endfor %}{% for n in site.data.nav %}{{ n.title }}{% endfor %}{% include footer.html note=\"bye\" %}",
        );
        write(dir, "assets/logo.svg", "<svg/>");
    }

    #[test]
    fn test_full_build() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        blog(dir);

        let report = build(dir);
        assert!(report.is_success(), "{:?}", report.errors);
        assert_eq!(report.rendered, 3);
        assert_eq!(report.copied, 1);

        let first = read(dir, "2024/01/01/first-post/index.html");
        assert_eq!(
            first,
            "<title>First Post | My Site</title><article class=\"article\"><p>Hello <em>world</em>.</p>\n</article>"
        );
        let second = read(dir, "2024/02/01/second-post/index.html");
        assert!(second.contains("<a href=\"/2024/01/01/first-post/\">prev</a>"));

        let index = read(dir, "index.html");
        assert_eq!(
            index,
            "<title>Home | My Site</title><li>Second Post /2024/02/01/second-post/</li><li>First Post /2024/01/01/first-post/</li>Home<footer>bye</footer>"
        );
        assert_eq!(read(dir, "assets/logo.svg"), "<svg/>");
    }

    #[test]
    fn test_build_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        blog(tmp.path());
        build(tmp.path());
        let once = read(tmp.path(), "index.html");
        build(tmp.path());
        assert_eq!(read(tmp.path(), "index.html"), once);
    }

    #[test]
    fn test_directive_error_line_includes_front_matter() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "bad.html", "---\ntitle: x\n---\nok\n{% if %}");
        write(tmp.path(), "good.html", "fine");

        let report = build(tmp.path());
        assert_eq!(report.rendered, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(
            &report.errors[0],
            BuildError::UnresolvedDirective { source_id, line: 5, .. } if source_id == "bad.html"
        ));
    }

    #[test]
    fn test_missing_explicit_layout_is_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.md", "---\nlayout: nope\n---\nbody");
        let report = build(tmp.path());
        assert_eq!(report.rendered, 0);
        assert!(report.errors[0].to_string().contains("layout `nope` not found"));
    }

    #[test]
    fn test_layout_cycle_is_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "_layouts/a.html", "---\nlayout: b\n---\n{{ content }}");
        write(tmp.path(), "_layouts/b.html", "---\nlayout: a\n---\n{{ content }}");
        write(tmp.path(), "x.html", "---\nlayout: a\n---\nbody");
        let report = build(tmp.path());
        assert_eq!(report.rendered, 0);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_collision_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "about.md", "one");
        write(tmp.path(), "about.html", "two");
        write(tmp.path(), "other.md", "fine");
        let report = build(tmp.path());
        assert!(report.has_collisions());
        assert_eq!(report.rendered, 0);
        assert!(!tmp.path().join("_site").exists());
    }

    #[test]
    fn test_unknown_date_specifier_renders_input() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "bad.html", "{{ \"2024-01-01\" | date: \"%Q\" }}");
        write(tmp.path(), "good.html", "fine");
        let report = build(tmp.path());
        assert_eq!(report.rendered, 2);
        assert_eq!(read(tmp.path(), "bad.html"), "2024-01-01");
        assert_eq!(read(tmp.path(), "good.html"), "fine");
    }

    #[test]
    fn test_permalink_leaving_site_root_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.md", "---\npermalink: /x/../../escaped/\n---\nbody");
        write(tmp.path(), "other.md", "fine");
        let report = build(tmp.path());
        assert_eq!(report.rendered, 0);
        assert!(matches!(
            &report.errors[0],
            BuildError::InvalidPermalink { source_id, .. } if source_id == "a.md"
        ));
        assert!(!tmp.path().join("_site").exists());
        assert!(!tmp.path().join("escaped").exists());
    }
}
