//! Build errors and the end-of-build report

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building the site.
///
/// Per-unit errors are collected into a [`BuildReport`] instead of aborting
/// the build; only routing errors ([`BuildError::PermalinkCollision`] and
/// [`BuildError::InvalidPermalink`]) stop a build before any output is
/// written.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("{source_id}:{line}: malformed front matter: {message}")]
    MalformedMetadata {
        source_id: String,
        line: usize,
        message: String,
    },

    #[error("{source_id}: invalid date `{value}`")]
    InvalidDate { source_id: String, value: String },

    #[error("permalink collision on `{path}` between {first} and {second}")]
    PermalinkCollision {
        path: String,
        first: String,
        second: String,
    },

    #[error("{source_id}: permalink `{permalink}` leaves the site root")]
    InvalidPermalink { source_id: String, permalink: String },

    #[error("{source_id}:{line}: {message}")]
    UnresolvedDirective {
        source_id: String,
        line: usize,
        message: String,
    },

    #[error("{}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            BuildError::MalformedMetadata { .. } => "MalformedMetadata",
            BuildError::InvalidDate { .. } => "InvalidDate",
            BuildError::PermalinkCollision { .. } => "PermalinkCollision",
            BuildError::InvalidPermalink { .. } => "InvalidPermalink",
            BuildError::UnresolvedDirective { .. } => "UnresolvedDirective",
            BuildError::Config { .. } => "Config",
            BuildError::Io { .. } => "Io",
        }
    }
}

/// Outcome of a build pass
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Rendered files written to the output directory
    pub rendered: usize,
    /// Static files copied verbatim
    pub copied: usize,
    /// Everything that went wrong, in detection order
    pub errors: Vec<BuildError>,
}

impl BuildReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: BuildError) {
        tracing::error!("{}", error);
        self.errors.push(error);
    }

    pub fn extend<I: IntoIterator<Item = BuildError>>(&mut self, errors: I) {
        for error in errors {
            self.push(error);
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_collisions(&self) -> bool {
        self.errors
            .iter()
            .any(|e| {
                matches!(
                    e,
                    BuildError::PermalinkCollision { .. } | BuildError::InvalidPermalink { .. }
                )
            })
    }

    /// Count errors per kind, in a stable order
    pub fn summary(&self) -> String {
        let mut counts: std::collections::BTreeMap<&str, usize> = Default::default();
        for e in &self.errors {
            *counts.entry(e.kind()).or_insert(0) += 1;
        }
        counts
            .iter()
            .map(|(k, v)| format!("{} {}", v, k))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_summary() {
        let mut report = BuildReport::new();
        assert!(report.is_success());
        report.push(BuildError::InvalidDate {
            source_id: "_posts/a.md".to_string(),
            value: "nope".to_string(),
        });
        report.push(BuildError::InvalidDate {
            source_id: "_posts/b.md".to_string(),
            value: "nope".to_string(),
        });
        report.push(BuildError::PermalinkCollision {
            path: "same/index.html".to_string(),
            first: "a.md".to_string(),
            second: "b.md".to_string(),
        });
        assert!(!report.is_success());
        assert!(report.has_collisions());
        assert_eq!(report.summary(), "2 InvalidDate, 1 PermalinkCollision");
    }

    #[test]
    fn test_error_display() {
        let err = BuildError::MalformedMetadata {
            source_id: "about.md".to_string(),
            line: 3,
            message: "missing closing `---`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "about.md:3: malformed front matter: missing closing `---`"
        );
    }
}
