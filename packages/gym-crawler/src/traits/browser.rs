//! Browser automation boundary.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CrawlResult;

/// Navigation completion condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// DOM parsed; scripts may still be loading content
    DomContentLoaded,
    /// `load` event fired
    Load,
    /// Load finished and no new network activity for a short window
    NetworkIdle,
}

/// A running browser that hands out isolated pages.
///
/// One session is shared by a whole run; each URL gets its own page.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> CrawlResult<Box<dyn PageDriver>>;
}

/// One browser tab.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for `wait_until`, failing after `timeout`.
    async fn navigate(&self, url: &str, wait_until: WaitUntil, timeout: Duration)
        -> CrawlResult<()>;

    /// Fully rendered HTML of the current document.
    async fn content(&self) -> CrawlResult<String>;

    /// URLs of every frame in the page, main frame first.
    async fn frame_urls(&self) -> CrawlResult<Vec<String>>;

    /// Scroll the viewport vertically by `delta_px`.
    async fn scroll_by(&self, delta_px: u32) -> CrawlResult<()>;

    /// Number of elements in the live DOM matching a CSS selector.
    async fn count_elements(&self, selector: &str) -> CrawlResult<usize>;

    async fn close(&self) -> CrawlResult<()>;
}
