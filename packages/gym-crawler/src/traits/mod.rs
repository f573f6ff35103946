//! Boundary traits for the crawl pipeline.
//!
//! The LLM provider, the headless browser and the storage sink are external
//! collaborators; the pipeline talks to them only through these traits.

pub mod ai;
pub mod browser;
pub mod sink;
