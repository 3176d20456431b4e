//! Clean the output directory

use anyhow::{Context, Result};
use std::fs;

use crate::Site;

/// Remove the output directory and everything in it
pub fn run(site: &Site) -> Result<()> {
    if site.output_dir.exists() {
        fs::remove_dir_all(&site.output_dir)
            .with_context(|| format!("Failed to remove {:?}", site.output_dir))?;
        tracing::info!("Deleted: {:?}", site.output_dir);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_output() {
        let tmp = TempDir::new().unwrap();
        let site = Site::with_config(tmp.path(), SiteConfig::default());
        fs::create_dir_all(site.output_dir.join("a")).unwrap();
        fs::write(site.output_dir.join("a/index.html"), "x").unwrap();

        run(&site).unwrap();
        assert!(!site.output_dir.exists());
        // Nothing to remove is fine
        run(&site).unwrap();
    }
}
