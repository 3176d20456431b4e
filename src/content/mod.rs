//! Content module - content units, front matter, markdown

mod frontmatter;
pub mod loader;
pub mod markdown;
mod unit;
mod value;

pub use frontmatter::{FrontMatter, FrontMatterError};
pub use markdown::MarkdownRenderer;
pub use unit::{ContentUnit, StaticAsset, PAGES, POSTS};
pub use value::Value;
