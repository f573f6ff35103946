//! Headless Chromium session on chromiumoxide.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{FrameTree, GetFrameTreeParams, NavigateParams};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::error::{CrawlError, CrawlResult};
use crate::traits::browser::{BrowserSession, PageDriver, WaitUntil};

/// Poll interval while waiting on document state.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Quiet window with no new resource entries that counts as network idle.
const IDLE_WINDOW: Duration = Duration::from_millis(500);

/// A headless Chromium process shared by a whole run.
pub struct ChromiumBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    /// Launch headless Chromium, auto-detecting the binary unless given.
    pub async fn launch(executable: Option<PathBuf>) -> CrawlResult<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--mute-audio");
        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| CrawlError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CrawlError::Browser(format!("failed to launch Chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler event error");
                }
            }
        });

        Ok(Self { browser, handler })
    }

    /// Close the browser process.
    pub async fn shutdown(mut self) -> CrawlResult<()> {
        let result = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| CrawlError::Browser(e.to_string()));
        self.handler.abort();
        result
    }
}

#[async_trait]
impl BrowserSession for ChromiumBrowser {
    async fn new_page(&self) -> CrawlResult<Box<dyn PageDriver>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| CrawlError::Browser(format!("failed to open page: {e}")))?;
        Ok(Box::new(ChromiumPage { page }))
    }
}

/// One Chromium tab.
pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: &str) -> CrawlResult<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| CrawlError::Browser(format!("script failed: {e}")))?
            .into_value()
            .map_err(|e| CrawlError::Browser(format!("unexpected script result: {e:?}")))
    }

    async fn ready_state(&self) -> CrawlResult<String> {
        self.eval("document.readyState").await
    }

    async fn resource_count(&self) -> CrawlResult<u64> {
        self.eval("performance.getEntriesByType('resource').length").await
    }

    async fn wait_for(&self, wait_until: WaitUntil) -> CrawlResult<()> {
        loop {
            let state = self.ready_state().await?;
            let reached = match wait_until {
                WaitUntil::DomContentLoaded => state != "loading",
                WaitUntil::Load | WaitUntil::NetworkIdle => state == "complete",
            };
            if reached {
                break;
            }
            sleep(POLL_INTERVAL).await;
        }

        if wait_until == WaitUntil::NetworkIdle {
            let mut last = self.resource_count().await?;
            let mut quiet_since = Instant::now();
            while quiet_since.elapsed() < IDLE_WINDOW {
                sleep(POLL_INTERVAL).await;
                let count = self.resource_count().await?;
                if count != last {
                    last = count;
                    quiet_since = Instant::now();
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn navigate(
        &self,
        url: &str,
        wait_until: WaitUntil,
        budget: Duration,
    ) -> CrawlResult<()> {
        let navigation = async {
            let response = self
                .page
                .execute(NavigateParams::new(url))
                .await
                .map_err(|e| CrawlError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            if let Some(reason) = response.result.error_text.clone() {
                return Err(CrawlError::Navigation {
                    url: url.to_string(),
                    reason,
                });
            }
            self.wait_for(wait_until).await
        };

        match timeout(budget, navigation).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url = %url, wait = ?wait_until, "Navigation timed out");
                Err(CrawlError::Timeout {
                    url: url.to_string(),
                })
            }
        }
    }

    async fn content(&self) -> CrawlResult<String> {
        self.page
            .content()
            .await
            .map_err(|e| CrawlError::Browser(format!("failed to read content: {e}")))
    }

    /// Current URLs of the whole CDP frame tree, main frame first.
    async fn frame_urls(&self) -> CrawlResult<Vec<String>> {
        let response = self
            .page
            .execute(GetFrameTreeParams::default())
            .await
            .map_err(|e| CrawlError::Browser(format!("failed to read frame tree: {e}")))?;

        Ok(flatten_frames(
            &response.result.frame_tree,
            |tree: &FrameTree| {
                let frame = &tree.frame;
                match &frame.url_fragment {
                    Some(fragment) => format!("{}{fragment}", frame.url),
                    None => frame.url.clone(),
                }
            },
            |tree: &FrameTree| tree.child_frames.as_deref().unwrap_or_default(),
        ))
    }

    async fn scroll_by(&self, delta_px: u32) -> CrawlResult<()> {
        self.page
            .evaluate(format!("window.scrollBy(0, {delta_px})").as_str())
            .await
            .map(|_| ())
            .map_err(|e| CrawlError::Browser(format!("scroll failed: {e}")))
    }

    async fn count_elements(&self, selector: &str) -> CrawlResult<usize> {
        let quoted = serde_json::to_string(selector)
            .map_err(|e| CrawlError::Browser(e.to_string()))?;
        self.eval(&format!("document.querySelectorAll({quoted}).length"))
            .await
    }

    async fn close(&self) -> CrawlResult<()> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| CrawlError::Browser(format!("failed to close page: {e}")))
    }
}

/// Pre-order walk of a frame tree: parents before children, siblings in order.
fn flatten_frames<T>(
    root: &T,
    url: impl Fn(&T) -> String,
    children: impl Fn(&T) -> &[T],
) -> Vec<String> {
    let mut urls = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        urls.push(url(node));
        stack.extend(children(node).iter().rev());
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node {
        url: &'static str,
        children: Vec<Node>,
    }

    fn node(url: &'static str, children: Vec<Node>) -> Node {
        Node { url, children }
    }

    #[test]
    fn test_flatten_frames_includes_nested_frames() {
        let tree = node(
            "https://zenda.pe/horarios",
            vec![
                node(
                    "https://app.glofox.com/portal",
                    vec![node("https://app.glofox.com/portal/schedule", vec![])],
                ),
                node("https://js.stripe.com/v3", vec![]),
            ],
        );

        let urls = flatten_frames(&tree, |n| n.url.to_string(), |n| n.children.as_slice());
        assert_eq!(
            urls,
            vec![
                "https://zenda.pe/horarios",
                "https://app.glofox.com/portal",
                "https://app.glofox.com/portal/schedule",
                "https://js.stripe.com/v3",
            ]
        );
    }

    #[test]
    fn test_flatten_frames_single_frame() {
        let tree = node("about:blank", vec![]);
        assert_eq!(
            flatten_frames(&tree, |n| n.url.to_string(), |n| n.children.as_slice()),
            vec!["about:blank"]
        );
    }
}
