//! List site content

use anyhow::Result;
use std::fmt::Write;

use crate::collection::{self, CollectOptions, Collections};
use crate::content::loader::ContentLoader;
use crate::content::POSTS;
use crate::Site;

/// Print a listing of one collection, or of the posts' tags or categories
pub fn run(site: &Site, content_type: &str) -> Result<()> {
    print!("{}", listing(site, content_type)?);
    Ok(())
}

fn listing(site: &Site, content_type: &str) -> Result<String> {
    let loaded = ContentLoader::new(site)?.load();
    for e in &loaded.errors {
        tracing::warn!("{}", e);
    }
    let options = CollectOptions::from_config(&site.config)?;
    let (collections, errors) = collection::build(loaded.units, &options);
    for e in &errors {
        tracing::warn!("{}", e);
    }

    let mut out = String::new();
    match content_type {
        "tag" | "tags" => list_index(&mut out, "Tags", &collections, true)?,
        "category" | "categories" => list_index(&mut out, "Categories", &collections, false)?,
        kind => {
            let kind = match kind {
                "post" => "posts",
                "page" => "pages",
                other => other,
            };
            let Some(collection) = collections.get(kind) else {
                let known: Vec<_> = collections.iter().map(|c| c.kind.as_str()).collect();
                anyhow::bail!(
                    "Unknown type: {}. Available: {}, tags, categories",
                    content_type,
                    known.join(", ")
                );
            };
            writeln!(out, "{} ({}):", collection.kind, collection.len())?;
            for entry in &collection.entries {
                let date = entry
                    .date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "----------".to_string());
                writeln!(out, "  {} - {} [{}]", date, entry.unit.title(), entry.unit.id)?;
            }
        }
    }
    Ok(out)
}

/// Names with their post counts, most used first
fn list_index(out: &mut String, label: &str, collections: &Collections, tags: bool) -> Result<()> {
    let Some(posts) = collections.get(POSTS) else {
        writeln!(out, "{} (0):", label)?;
        return Ok(());
    };
    let index = if tags {
        posts.tag_index()
    } else {
        posts.category_index()
    };

    let mut counts: Vec<(String, usize)> = index.into_iter().map(|(k, v)| (k, v.len())).collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    writeln!(out, "{} ({}):", label, counts.len())?;
    for (name, count) in counts {
        writeln!(out, "  {} ({})", name, count)?;
    }
    Ok(())
}
