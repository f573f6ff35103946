//! Page and frame crawling.
//!
//! One URL becomes one browser tab: the main document is rendered, scrolled
//! to trigger lazy widgets and extracted, then every relevant embedded frame
//! is visited in the same tab and extracted on its own.

mod frames;
mod scroll;

pub use frames::{select_frames, should_skip_frame};
pub use scroll::{scroll_until_frames_stable, ScrollOutcome};

use chrono::{Local, NaiveDate};
use tracing::{debug, info, instrument, warn};

use crate::error::CrawlResult;
use crate::pipeline::extract::FactExtractor;
use crate::pipeline::prompts::RecencyContext;
use crate::prune::prune;
use crate::traits::ai::AI;
use crate::traits::browser::{BrowserSession, PageDriver, WaitUntil};
use crate::types::config::CrawlerConfig;
use crate::types::dataset::SourceResults;
use crate::types::facts::ExtractionResult;
use crate::types::sitemap::SitemapEntry;

/// Category hint used for embedded frame documents.
pub const IFRAME_HINT: &str = "iframe_content";

/// Everything one URL visit produced.
#[derive(Debug, Clone, Default)]
pub struct PageCrawl {
    /// One result per extracted document, keyed by its URL
    pub sources: SourceResults,
    pub main_loaded: bool,
    pub frames_extracted: usize,
    /// Frames that failed to load or rendered empty
    pub frames_skipped: usize,
    pub scroll: Option<ScrollOutcome>,
}

/// Crawls one URL and its frames, extracting each document.
pub struct PageCrawler<'a, A: AI + ?Sized> {
    extractor: FactExtractor<'a, A>,
    config: &'a CrawlerConfig,
    today: NaiveDate,
}

impl<'a, A: AI + ?Sized> PageCrawler<'a, A> {
    pub fn new(extractor: FactExtractor<'a, A>, config: &'a CrawlerConfig) -> Self {
        Self {
            extractor,
            config,
            today: Local::now().date_naive(),
        }
    }

    /// Pin the date handed to the extractor as "today".
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Crawl one entry. Never fails.
    ///
    /// A main page that cannot be loaded yields `{url: empty result}`; a frame
    /// that cannot be loaded is skipped.
    pub async fn crawl(
        &self,
        session: &dyn BrowserSession,
        entry: &SitemapEntry,
        category_hint: &str,
        gym_name: &str,
    ) -> SourceResults {
        self.crawl_detailed(session, entry, category_hint, gym_name)
            .await
            .sources
    }

    #[instrument(skip_all, fields(url = %entry.location, category = %category_hint, gym = %gym_name))]
    pub async fn crawl_detailed(
        &self,
        session: &dyn BrowserSession,
        entry: &SitemapEntry,
        category_hint: &str,
        gym_name: &str,
    ) -> PageCrawl {
        let mut crawl = PageCrawl::default();

        let page = match session.new_page().await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %entry.location, error = %e, "Failed to open browser page");
                crawl.sources.insert(entry.location.clone(), ExtractionResult::empty());
                return crawl;
            }
        };

        self.crawl_in_page(page.as_ref(), entry, category_hint, gym_name, &mut crawl)
            .await;

        if let Err(e) = page.close().await {
            debug!(error = %e, "Failed to close page");
        }
        crawl
    }

    async fn crawl_in_page(
        &self,
        page: &dyn PageDriver,
        entry: &SitemapEntry,
        category_hint: &str,
        gym_name: &str,
        crawl: &mut PageCrawl,
    ) {
        let url = entry.location.as_str();
        let context = RecencyContext::from_entry(entry, self.today);

        if let Err(e) = page
            .navigate(url, WaitUntil::DomContentLoaded, self.config.page_timeout)
            .await
        {
            warn!(url = %url, category = %category_hint, gym = %gym_name, error = %e, "Failed to load page");
            crawl.sources.insert(url.to_string(), ExtractionResult::empty());
            return;
        }
        crawl.main_loaded = true;

        crawl.scroll = Some(scroll_until_frames_stable(page, &self.config.scroll).await);

        // Frames are listed before the tab navigates away from the main document.
        let frame_urls = match page.frame_urls().await {
            Ok(urls) => urls,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to enumerate frames");
                Vec::new()
            }
        };

        match page.content().await {
            Ok(html) => {
                let pruned = prune(&html, &[]);
                let result = if pruned.is_empty() {
                    debug!(url = %url, "Main document pruned to nothing");
                    ExtractionResult::empty()
                } else {
                    self.extractor
                        .extract(url, category_hint, &pruned, gym_name, &context)
                        .await
                };
                crawl.sources.insert(url.to_string(), result);
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to read page content");
                crawl.sources.insert(url.to_string(), ExtractionResult::empty());
            }
        }

        let selected = select_frames(&frame_urls, url, &self.config.skip_domains);
        debug!(
            url = %url,
            frames = frame_urls.len(),
            selected = selected.len(),
            "Selected frames"
        );

        for frame_url in selected {
            match self.frame_html(page, &frame_url).await {
                Ok(html) => {
                    let pruned = prune(&html, &[]);
                    if pruned.is_empty() {
                        debug!(frame = %frame_url, "Frame pruned to nothing");
                        crawl.frames_skipped += 1;
                        continue;
                    }
                    info!(frame = %frame_url, "Extracting from iframe content");
                    let result = self
                        .extractor
                        .extract(&frame_url, IFRAME_HINT, &pruned, gym_name, &context)
                        .await;
                    crawl.sources.insert(frame_url, result);
                    crawl.frames_extracted += 1;
                }
                Err(e) => {
                    warn!(frame = %frame_url, url = %url, gym = %gym_name, error = %e, "Failed to scrape iframe");
                    crawl.frames_skipped += 1;
                }
            }
        }
    }

    /// Load a frame URL in the tab, preferring network idle.
    async fn frame_html(&self, page: &dyn PageDriver, frame_url: &str) -> CrawlResult<String> {
        let timeout = self.config.frame_timeout;
        if let Err(e) = page.navigate(frame_url, WaitUntil::NetworkIdle, timeout).await {
            debug!(frame = %frame_url, error = %e, "Network idle wait failed, retrying on DOM ready");
            page.navigate(frame_url, WaitUntil::DomContentLoaded, timeout)
                .await?;
        }
        page.content().await
    }
}
