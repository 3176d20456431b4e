//! Build the site

use anyhow::Result;
use std::time::Instant;

use crate::error::BuildReport;
use crate::generator::{BuildOptions, Generator};
use crate::Site;

/// Run one build pass and log its outcome
pub fn run(site: &Site, options: &BuildOptions) -> Result<BuildReport> {
    let start = Instant::now();
    tracing::info!("Building {:?} -> {:?}", site.source_dir, site.output_dir);

    let report = Generator::new(site, options).generate()?;

    let duration = start.elapsed();
    if report.is_success() {
        tracing::info!(
            "Wrote {} pages and {} static files in {:.2}s",
            report.rendered,
            report.copied,
            duration.as_secs_f64()
        );
    } else {
        tracing::warn!(
            "Wrote {} pages and {} static files in {:.2}s with {} errors ({})",
            report.rendered,
            report.copied,
            duration.as_secs_f64(),
            report.errors.len(),
            report.summary()
        );
    }
    Ok(report)
}
