//! Configuration for the crawl pipeline components.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Third-party frame hosts that never carry gym facts.
pub const DEFAULT_SKIP_DOMAINS: &[&str] = &[
    "stripe.com",
    "facebook.com",
    "google.com",
    "analytics",
    "wixapps",
    "googletagmanager.com",
    "doubleclick.net",
    "instagram.com",
    "twitter.com",
    "paypal.com",
    "hotjar.com",
];

/// Configuration for sitemap discovery.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Per-request timeout for robots and sitemap fetches.
    pub http_timeout: Duration,

    pub user_agent: String,

    /// Upper bound on sitemap documents fetched per site.
    ///
    /// Sitemap indexes may nest arbitrarily and there is no cycle
    /// detection, so this bounds the work queue. Default: 50.
    pub max_sitemaps: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
            user_agent: format!("gym-crawler/{}", env!("CARGO_PKG_VERSION")),
            max_sitemaps: 50,
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_max_sitemaps(mut self, max: usize) -> Self {
        self.max_sitemaps = max;
        self
    }
}

/// Progressive scroll tuning used to trigger lazy-loaded frames.
#[derive(Debug, Clone)]
pub struct ScrollConfig {
    pub max_steps: u32,
    pub step_px: u32,
    /// Consecutive unchanged iframe counts before stopping early.
    pub stable_checks: u32,
    pub pause: Duration,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            max_steps: 30,
            step_px: 1000,
            stable_checks: 3,
            pause: Duration::from_secs(1),
        }
    }
}

impl ScrollConfig {
    pub fn with_max_steps(mut self, steps: u32) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn with_step_px(mut self, px: u32) -> Self {
        self.step_px = px;
        self
    }

    pub fn with_stable_checks(mut self, checks: u32) -> Self {
        self.stable_checks = checks;
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

/// Configuration for page and frame crawling.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Main page navigation budget. Default: 180s.
    pub page_timeout: Duration,

    /// Per-frame navigation budget. Default: 45s.
    pub frame_timeout: Duration,

    /// Frame host denylist.
    ///
    /// Entries containing a dot match as a host suffix (`stripe.com` matches
    /// `js.stripe.com`); bare words match anywhere in the host.
    pub skip_domains: Vec<String>,

    pub scroll: ScrollConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(180),
            frame_timeout: Duration::from_secs(45),
            skip_domains: DEFAULT_SKIP_DOMAINS.iter().map(|d| d.to_string()).collect(),
            scroll: ScrollConfig::default(),
        }
    }
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    pub fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    pub fn with_skip_domains(mut self, domains: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.skip_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scroll(mut self, scroll: ScrollConfig) -> Self {
        self.scroll = scroll;
        self
    }
}

/// Model identifiers per LLM call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Cheap yes/no timetable detector.
    pub schedule_classifier: String,
    pub extraction: String,
    /// Stronger model used when a timetable was detected.
    pub schedule_extraction: String,
    pub categorizer: String,
    pub merger: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            schedule_classifier: "gpt-5-nano".to_string(),
            extraction: "gpt-5-nano".to_string(),
            schedule_extraction: "gpt-4.1-mini".to_string(),
            categorizer: "gpt-4o-mini".to_string(),
            merger: "gpt-4o-mini".to_string(),
        }
    }
}

/// Configuration for the fact extractor.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Language every extracted text field is written in.
    pub output_language: String,

    /// Run the timetable classifier before extraction.
    pub detect_schedules: bool,

    /// Cap on page content sent to the model, in bytes.
    pub max_content_bytes: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            output_language: "Spanish".to_string(),
            detect_schedules: true,
            max_content_bytes: 120_000,
        }
    }
}

impl ExtractorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_language(mut self, language: impl Into<String>) -> Self {
        self.output_language = language.into();
        self
    }

    pub fn with_detect_schedules(mut self, detect: bool) -> Self {
        self.detect_schedules = detect;
        self
    }

    pub fn with_max_content_bytes(mut self, max: usize) -> Self {
        self.max_content_bytes = max;
        self
    }
}

/// How per-source results become one dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Natural-key dedup, no model call.
    #[default]
    Deterministic,
    /// Fusion prompt, followed by natural-key dedup of the model output.
    Llm,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deterministic => f.write_str("deterministic"),
            Self::Llm => f.write_str("llm"),
        }
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deterministic" | "key" | "keys" => Ok(Self::Deterministic),
            "llm" | "ai" => Ok(Self::Llm),
            other => Err(format!("unknown merge strategy: {other}")),
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub resolver: ResolverConfig,
    pub crawler: CrawlerConfig,
    pub extractor: ExtractorConfig,
    pub merge_strategy: MergeStrategy,

    /// URLs crawled concurrently per gym. Default: 1 (sequential).
    pub url_concurrency: usize,

    /// When non-empty, crawl these URLs instead of sitemap discovery.
    pub url_overrides: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            crawler: CrawlerConfig::default(),
            extractor: ExtractorConfig::default(),
            merge_strategy: MergeStrategy::default(),
            url_concurrency: 1,
            url_overrides: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_crawler(mut self, crawler: CrawlerConfig) -> Self {
        self.crawler = crawler;
        self
    }

    pub fn with_extractor(mut self, extractor: ExtractorConfig) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = strategy;
        self
    }

    /// Set URL concurrency (clamped to at least 1).
    pub fn with_url_concurrency(mut self, concurrency: usize) -> Self {
        self.url_concurrency = concurrency.max(1);
        self
    }

    pub fn with_url_overrides(mut self, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.url_overrides = urls.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let crawler = CrawlerConfig::default();
        assert_eq!(crawler.page_timeout, Duration::from_secs(180));
        assert_eq!(crawler.frame_timeout, Duration::from_secs(45));
        assert_eq!(crawler.scroll.max_steps, 30);
        assert_eq!(crawler.scroll.stable_checks, 3);
        assert!(crawler.skip_domains.iter().any(|d| d == "stripe.com"));

        let pipeline = PipelineConfig::default();
        assert_eq!(pipeline.merge_strategy, MergeStrategy::Deterministic);
        assert_eq!(pipeline.url_concurrency, 1);
    }

    #[test]
    fn test_url_concurrency_is_clamped() {
        assert_eq!(PipelineConfig::new().with_url_concurrency(0).url_concurrency, 1);
    }

    #[test]
    fn test_merge_strategy_parsing() {
        assert_eq!("LLM".parse::<MergeStrategy>(), Ok(MergeStrategy::Llm));
        assert_eq!(
            "deterministic".parse::<MergeStrategy>(),
            Ok(MergeStrategy::Deterministic)
        );
        assert!("magic".parse::<MergeStrategy>().is_err());
    }
}
