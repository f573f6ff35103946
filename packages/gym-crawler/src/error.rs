//! Typed errors for the gym crawler library.
//!
//! Core components are total and report failures through logs and empty
//! defaults; these errors cross the boundary traits and escalate only from
//! the sink and configuration.

use thiserror::Error;

/// Errors surfaced by the crawl pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Fetch, navigation or browser failure
    #[error("crawl failed: {0}")]
    Crawl(#[from] CrawlError),

    /// LLM provider unavailable or failed
    #[error("AI service error: {0}")]
    AI(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Sink operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Invalid or missing configuration
    #[error("config error: {0}")]
    Config(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Run was cancelled
    #[error("operation cancelled")]
    Cancelled,
}

/// Errors from HTTP fetches and browser navigation.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Navigation or fetch exceeded its budget
    #[error("timeout crawling: {url}")]
    Timeout { url: String },

    /// Page reported a navigation error
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Browser process or protocol failure
    #[error("browser error: {0}")]
    Browser(String),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for crawl operations.
pub type CrawlResult<T> = std::result::Result<T, CrawlError>;

impl PipelineError {
    /// Wrap any error as an AI failure.
    pub fn ai(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::AI(error.into())
    }

    /// Wrap any error as a storage failure.
    pub fn storage(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage(error.into())
    }

    pub fn config(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Config(error.into())
    }
}
