//! folio-rs: a static content pipeline for personal and academic websites
//!
//! Source files with YAML front matter are grouped into collections,
//! rendered through a small Liquid-style template language and a layout
//! chain, and written to permalink-derived paths under the output
//! directory.

pub mod collection;
pub mod commands;
pub mod config;
pub mod content;
pub mod data;
pub mod error;
pub mod generator;
pub mod helpers;
pub mod permalink;
pub mod template;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use error::{BuildError, BuildReport};
pub use generator::BuildOptions;

/// A site rooted at a base directory
#[derive(Debug, Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory, where `_config.yml` lives
    pub base_dir: PathBuf,
    /// Source directory
    pub source_dir: PathBuf,
    /// Output directory
    pub output_dir: PathBuf,
    pub layouts_dir: PathBuf,
    pub includes_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl Site {
    /// Open a site, reading `_config.yml` when present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };

        Ok(Self::with_config(base_dir, config))
    }

    /// A site with an already-built configuration
    pub fn with_config<P: AsRef<Path>>(base_dir: P, config: config::SiteConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let source_dir = join_dir(&base_dir, &config.source_dir);
        let output_dir = join_dir(&base_dir, &config.output_dir);
        let layouts_dir = join_dir(&source_dir, &config.layouts_dir);
        let includes_dir = join_dir(&source_dir, &config.includes_dir);
        let data_dir = join_dir(&source_dir, &config.data_dir);

        Self {
            config,
            base_dir,
            source_dir,
            output_dir,
            layouts_dir,
            includes_dir,
            data_dir,
        }
    }

    /// Build the site
    pub fn build(&self, options: &BuildOptions) -> Result<BuildReport> {
        commands::build::run(self, options)
    }

    /// Remove the output directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}

fn join_dir(base: &Path, rel: &str) -> PathBuf {
    match rel.trim() {
        "" | "." => base.to_path_buf(),
        rel => base.join(rel),
    }
}
