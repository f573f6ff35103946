//! Gym Studio Crawler
//!
//! Crawls gym-studio websites and turns them into one deduplicated dataset
//! per gym: locations, prices, class schedules and disciplines, each record
//! carrying a search summary for downstream vector search.
//!
//! # Flow
//!
//! ```text
//! robots.txt -> sitemaps -> categorize URLs -> crawl pages + frames
//!     -> prune -> extract facts -> merge across pages -> sink
//! ```
//!
//! Every core step is total: failures are logged and become empty results
//! scoped to one URL, frame or model call. Only the sink and configuration
//! can fail a run.
//!
//! # Usage
//!
//! ```rust,ignore
//! use gym_crawler::{GymPipeline, GymTarget, PipelineConfig};
//! use gym_crawler::testing::{MemorySink, MockAI, MockBrowser};
//!
//! let pipeline = GymPipeline::new(MockAI::new(), MemorySink::new(), PipelineConfig::default())?;
//! let reports = pipeline
//!     .run(&MockBrowser::new(), &[GymTarget::new("Zenda", "https://zenda.pe")], &cancel)
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - [`sitemap`] - robots.txt and sitemap resolution
//! - [`prune`] - HTML pruning for model input
//! - [`crawler`] - Page and frame crawling
//! - [`pipeline`] - Extraction, categorization, merge and the per-gym run
//! - [`traits`] - AI, browser and sink boundaries
//! - [`ai`] - OpenAI and rate-limited AI implementations
//! - [`stores`] - Sink implementations (MemorySink, PostgresSink)
//! - [`testing`] - Mock implementations for testing

pub mod ai;
pub mod crawler;
pub mod error;
pub mod pipeline;
pub mod prune;
pub mod sitemap;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

#[cfg(feature = "chromium")]
pub mod browser;

// Re-export core types at crate root
pub use error::{CrawlError, CrawlResult, PipelineError, Result};
pub use pipeline::{GymPipeline, GymRunReport, GymStatus};
pub use prune::{prune, PrunedHtml};
pub use sitemap::SitemapResolver;
pub use traits::{
    ai::{CompletionRequest, ModelSelector, ResponseMode, AI},
    browser::{BrowserSession, PageDriver, WaitUntil},
    sink::GymSink,
};
pub use types::{
    category::{CategorizedUrls, UrlCategory},
    config::{
        CrawlerConfig, ExtractorConfig, MergeStrategy, ModelConfig, PipelineConfig,
        ResolverConfig, ScrollConfig, DEFAULT_SKIP_DOMAINS,
    },
    dataset::{GymDataset, GymTarget, SourceAccumulator, SourceResults},
    facts::{Discipline, ExtractionResult, FactCategory, FactRecord, Location, Price, ScheduleSlot},
    sitemap::{ChangeFrequency, SitemapEntry},
};
