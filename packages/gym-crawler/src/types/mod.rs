//! Data types shared across the crawl pipeline.

pub mod category;
pub mod config;
pub mod dataset;
pub mod facts;
pub mod lenient;
pub mod sitemap;
