//! Sitemap discovery.

pub mod parser;
pub mod resolver;
pub mod robots;

pub use parser::{parse_sitemap, SitemapDocument, SitemapParseError};
pub use resolver::{filter_entries, SitemapResolver};
pub use robots::parse_sitemap_directives;
