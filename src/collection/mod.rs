//! Collection manager - groups units by kind, orders them and derives
//! excerpts and tag lists

use chrono::DateTime;
use chrono_tz::Tz;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::SiteConfig;
use crate::content::markdown::{plain_text, split_excerpt};
use crate::content::{ContentUnit, Value};
use crate::error::BuildError;
use crate::helpers::{
    collapse_whitespace, parse_date, split_date_prefix, strip_directives, strip_html, truncate_at_word,
};

/// Settings the collection manager needs from the site configuration
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub tz: Tz,
    pub excerpt_length: usize,
    pub excerpt_separator: String,
    pub render_drafts: bool,
    /// Kinds that exist even when no unit belongs to them
    pub kinds: Vec<String>,
}

impl CollectOptions {
    pub fn from_config(config: &SiteConfig) -> anyhow::Result<Self> {
        let mut kinds = vec![crate::content::POSTS.to_string(), crate::content::PAGES.to_string()];
        kinds.extend(config.collections.iter().cloned());
        Ok(Self {
            tz: config.tz()?,
            excerpt_length: config.excerpt_length,
            excerpt_separator: config.excerpt_separator.clone(),
            render_drafts: config.render_drafts,
            kinds,
        })
    }
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            tz: Tz::UTC,
            excerpt_length: 200,
            excerpt_separator: "<!-- more -->".to_string(),
            render_drafts: false,
            kinds: Vec::new(),
        }
    }
}

/// A unit together with the fields derived from it
#[derive(Debug, Clone)]
pub struct Entry {
    pub unit: ContentUnit,
    pub date: Option<DateTime<Tz>>,
    pub excerpt: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
}

/// Units of one kind, newest first
#[derive(Debug, Clone)]
pub struct Collection {
    pub kind: String,
    pub entries: Vec<Entry>,
}

impl Collection {
    fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tag name → indices of the entries carrying it, names sorted
    pub fn tag_index(&self) -> BTreeMap<String, Vec<usize>> {
        index_by(&self.entries, |e| &e.tags)
    }

    /// Category name → indices of the entries carrying it, names sorted
    pub fn category_index(&self) -> BTreeMap<String, Vec<usize>> {
        index_by(&self.entries, |e| &e.categories)
    }

    /// Stable sort: dated entries newest first (ties by source id), then
    /// undated entries in their original order.
    fn sort(&mut self) {
        self.entries.sort_by(|a, b| match (&a.date, &b.date) {
            (Some(x), Some(y)) => y.cmp(x).then_with(|| a.unit.id.cmp(&b.unit.id)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }
}

fn index_by(entries: &[Entry], field: impl Fn(&Entry) -> &Vec<String>) -> BTreeMap<String, Vec<usize>> {
    let mut index: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, entry) in entries.iter().enumerate() {
        for name in field(entry) {
            index.entry(name.clone()).or_default().push(i);
        }
    }
    index
}

/// All collections of a build, keyed by kind
#[derive(Debug, Clone, Default)]
pub struct Collections {
    collections: BTreeMap<String, Collection>,
}

impl Collections {
    pub fn get(&self, kind: &str) -> Option<&Collection> {
        self.collections.get(kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }

    /// Every entry of every collection, kinds in name order
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.collections.values().flat_map(|c| c.entries.iter())
    }

    pub fn total(&self) -> usize {
        self.collections.values().map(Collection::len).sum()
    }
}

/// Group, filter and order units, deriving per-unit fields.
///
/// Units with an unparsable `date` are left out and reported.
pub fn build(units: Vec<ContentUnit>, options: &CollectOptions) -> (Collections, Vec<BuildError>) {
    let mut collections = Collections::default();
    let mut errors = Vec::new();

    for kind in &options.kinds {
        collections
            .collections
            .entry(kind.clone())
            .or_insert_with(|| Collection::new(kind));
    }

    for unit in units {
        if !options.render_drafts && !unit.is_published() {
            tracing::debug!("Skipping unpublished {}", unit.id);
            continue;
        }
        match derive_entry(unit, options) {
            Ok(entry) => collections
                .collections
                .entry(entry.unit.kind.clone())
                .or_insert_with(|| Collection::new(&entry.unit.kind))
                .entries
                .push(entry),
            Err(e) => errors.push(e),
        }
    }

    for collection in collections.collections.values_mut() {
        collection.sort();
        tracing::debug!("Collection {}: {} entries", collection.kind, collection.len());
    }

    (collections, errors)
}

fn derive_entry(unit: ContentUnit, options: &CollectOptions) -> Result<Entry, BuildError> {
    let date = match unit.get("date") {
        None | Some(Value::Null) => split_date_prefix(unit.file_stem())
            .and_then(|(prefix, _)| parse_date(prefix, options.tz)),
        Some(value) => {
            let raw = value.scalar_string().unwrap_or_default();
            match parse_date(&raw, options.tz) {
                Some(date) => Some(date),
                None => {
                    return Err(BuildError::InvalidDate {
                        source_id: unit.id.clone(),
                        value: value.to_output_string(),
                    })
                }
            }
        }
    };

    let tags = coerce_string_list(unit.get("tags"), "tags", &unit.id);
    let categories = coerce_string_list(unit.get("categories"), "categories", &unit.id);
    let excerpt = excerpt(&unit, options);

    Ok(Entry {
        unit,
        date,
        excerpt,
        tags,
        categories,
    })
}

/// Markup-free preview of a unit, cut at a word boundary
pub fn excerpt(unit: &ContentUnit, options: &CollectOptions) -> String {
    let source = unit
        .get_str("excerpt")
        .or_else(|| split_excerpt(&unit.body, &options.excerpt_separator))
        .unwrap_or(&unit.body);
    let source = strip_directives(source);

    let text = if unit.is_markdown() {
        plain_text(&source)
    } else {
        collapse_whitespace(&strip_html(&source))
    };
    truncate_at_word(&text, options.excerpt_length)
}

/// Coerce a metadata value to an ordered, duplicate-free list of strings
pub fn coerce_string_list(value: Option<&Value>, field: &str, source_id: &str) -> Vec<String> {
    let items: Vec<String> = match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::List(items)) => items
            .iter()
            .filter_map(|item| {
                let s = item.scalar_string();
                if s.is_none() && !item.is_null() {
                    tracing::warn!("{}: ignoring non-scalar item in `{}`", source_id, field);
                }
                s
            })
            .collect(),
        Some(Value::Map(_)) => {
            tracing::warn!("{}: `{}` is a mapping, expected a list", source_id, field);
            Vec::new()
        }
        Some(scalar) => scalar.scalar_string().into_iter().collect(),
    };

    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim().to_string();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
