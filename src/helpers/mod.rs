//! Helper functions shared by the collection manager, router and filters

mod date;
mod html;
mod url;

pub use date::*;
pub use html::*;
pub use url::*;

/// Slug for use in a URL path segment
pub fn slugify(s: &str) -> String {
    slug::slugify(s)
}
