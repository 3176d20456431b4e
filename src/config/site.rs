//! Site configuration (_config.yml)

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::content::Value;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub author: String,
    pub timezone: String,

    // URL
    pub url: String,
    pub baseurl: String,
    /// Default permalink pattern per collection kind
    pub permalinks: HashMap<String, String>,

    // Directories
    pub source_dir: String,
    pub output_dir: String,
    pub layouts_dir: String,
    pub includes_dir: String,
    pub data_dir: String,

    // Content
    /// Collection kinds beyond `posts` and `pages`; each lives in `_<kind>/`
    pub collections: Vec<String>,
    /// Default layout per collection kind
    pub defaults: HashMap<String, String>,
    /// Glob patterns of source paths to leave out
    pub exclude: Vec<String>,
    pub render_drafts: bool,
    pub excerpt_length: usize,
    pub excerpt_separator: String,
    pub date_format: String,

    /// Any other keys, exposed to templates under `site`
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let permalinks = [
            ("posts", "/:year/:month/:day/:title/"),
            ("pages", "/:path:output_ext"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let defaults = [("posts", "post"), ("pages", "page")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self {
            title: "My Site".to_string(),
            description: String::new(),
            author: String::new(),
            timezone: "UTC".to_string(),

            url: "http://localhost".to_string(),
            baseurl: String::new(),
            permalinks,

            source_dir: ".".to_string(),
            output_dir: "_site".to_string(),
            layouts_dir: "_layouts".to_string(),
            includes_dir: "_includes".to_string(),
            data_dir: "_data".to_string(),

            collections: Vec::new(),
            defaults,
            exclude: Vec::new(),
            render_drafts: false,
            excerpt_length: 200,
            excerpt_separator: "<!-- more -->".to_string(),
            date_format: "%b %-d, %Y".to_string(),

            extra: IndexMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: SiteConfig = serde_yaml::from_str(content)?;
        // User entries replace the defaults per kind, not as a whole
        let defaults = Self::default();
        for (kind, pattern) in defaults.permalinks {
            config.permalinks.entry(kind).or_insert(pattern);
        }
        for (kind, layout) in defaults.defaults {
            config.defaults.entry(kind).or_insert(layout);
        }
        config.tz()?;
        if crate::helpers::date_pattern(&config.date_format).is_none() {
            anyhow::bail!("invalid date_format `{}`", config.date_format);
        }
        Ok(config)
    }

    /// The configured timezone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("unknown timezone `{}`: {}", self.timezone, e))
    }

    /// Default permalink pattern for a collection kind
    pub fn permalink_for(&self, kind: &str) -> String {
        self.permalinks
            .get(kind)
            .cloned()
            .unwrap_or_else(|| "/:collection/:path/".to_string())
    }

    /// Default layout for a collection kind
    pub fn default_layout(&self, kind: &str) -> Option<&str> {
        self.defaults.get(kind).map(String::as_str)
    }

    /// Site-level keys visible to templates
    pub fn to_value(&self) -> IndexMap<String, Value> {
        let mut map = IndexMap::new();
        map.insert("title".to_string(), Value::from(self.title.as_str()));
        map.insert("description".to_string(), Value::from(self.description.as_str()));
        map.insert("author".to_string(), Value::from(self.author.as_str()));
        map.insert("url".to_string(), Value::from(self.url.as_str()));
        map.insert("baseurl".to_string(), Value::from(self.baseurl.as_str()));
        map.insert("timezone".to_string(), Value::from(self.timezone.as_str()));
        for (key, value) in &self.extra {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }
        map
    }
}
