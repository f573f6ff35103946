//! Testing utilities including mock implementations.
//!
//! These are useful for exercising the pipeline without a browser, a model
//! provider or a database.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{CrawlError, CrawlResult, PipelineError, Result};
use crate::traits::{
    ai::{CompletionRequest, ModelSelector, ResponseMode, AI},
    browser::{BrowserSession, PageDriver, WaitUntil},
};

pub use crate::stores::memory::MemorySink;

/// A mock AI implementation for testing.
///
/// Responses are resolved in order: prompt-marker rules (first match wins),
/// then per-selector responses, then the default response. Anything else is
/// an AI error.
#[derive(Default)]
pub struct MockAI {
    /// (optional selector, prompt marker, response)
    rules: Arc<RwLock<Vec<(Option<ModelSelector>, String, String)>>>,

    /// Predefined responses by call site
    responses: Arc<RwLock<HashMap<ModelSelector, String>>>,

    default_response: Arc<RwLock<Option<String>>>,

    /// Call sites that fail outright
    failures: Arc<RwLock<HashSet<ModelSelector>>>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockAICall>>>,
}

/// Record of a call made to the mock AI.
#[derive(Debug, Clone)]
pub struct MockAICall {
    pub model: ModelSelector,
    pub prompt: String,
    pub system: Option<String>,
    pub response_mode: ResponseMode,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl MockAI {
    /// Create a new mock AI with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond with `response` to every call for `model`.
    pub fn with_response(self, model: ModelSelector, response: impl Into<String>) -> Self {
        self.responses.write().unwrap().insert(model, response.into());
        self
    }

    /// Respond with `response` whenever the prompt contains `marker`.
    pub fn with_response_when(self, marker: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules
            .write()
            .unwrap()
            .push((None, marker.into(), response.into()));
        self
    }

    /// Like [`with_response_when`](Self::with_response_when), limited to one call site.
    pub fn with_response_for(
        self,
        model: ModelSelector,
        marker: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.rules
            .write()
            .unwrap()
            .push((Some(model), marker.into(), response.into()));
        self
    }

    /// Fallback for calls no other rule answers.
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        *self.default_response.write().unwrap() = Some(response.into());
        self
    }

    /// Make every call for `model` fail.
    pub fn with_failure(self, model: ModelSelector) -> Self {
        self.failures.write().unwrap().insert(model);
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockAICall> {
        self.calls.read().unwrap().clone()
    }

    /// Calls made for one call site.
    pub fn calls_for(&self, model: ModelSelector) -> Vec<MockAICall> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.model == model)
            .cloned()
            .collect()
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    fn resolve(&self, request: &CompletionRequest) -> Option<String> {
        let rules = self.rules.read().unwrap();
        let by_marker = rules.iter().find(|(model, marker, _)| {
            model.map_or(true, |m| m == request.model) && request.prompt.contains(marker.as_str())
        });
        if let Some((_, _, response)) = by_marker {
            return Some(response.clone());
        }
        if let Some(response) = self.responses.read().unwrap().get(&request.model) {
            return Some(response.clone());
        }
        self.default_response.read().unwrap().clone()
    }
}

#[async_trait]
impl AI for MockAI {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.calls.write().unwrap().push(MockAICall {
            model: request.model,
            prompt: request.prompt.clone(),
            system: request.system.clone(),
            response_mode: request.response_mode,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        });

        if self.failures.read().unwrap().contains(&request.model) {
            return Err(PipelineError::ai(format!(
                "mock failure for {:?}",
                request.model
            )));
        }

        self.resolve(&request)
            .ok_or_else(|| PipelineError::ai(format!("no mock response for {:?}", request.model)))
    }
}

/// A static document served by [`MockBrowser`].
#[derive(Debug, Clone, Default)]
pub struct MockDocument {
    pub html: String,

    /// Embedded frame URLs, in document order
    pub frames: Vec<String>,

    /// Iframe counts reported on successive checks; the last one repeats.
    /// Empty means "the number of frames".
    pub iframe_counts: Vec<usize>,
}

impl MockDocument {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Default::default()
        }
    }

    pub fn with_frames(mut self, frames: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.frames = frames.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_iframe_counts(mut self, counts: Vec<usize>) -> Self {
        self.iframe_counts = counts;
        self
    }
}

#[derive(Default)]
struct SiteState {
    documents: RwLock<HashMap<String, MockDocument>>,
    failing: RwLock<HashSet<String>>,
    navigations: RwLock<Vec<String>>,
    pages_opened: AtomicUsize,
}

/// A mock browser serving static documents by URL.
///
/// Unknown and failing URLs produce navigation errors. Every navigation
/// attempt is logged, failed ones included.
#[derive(Clone, Default)]
pub struct MockBrowser {
    state: Arc<SiteState>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, url: impl Into<String>, document: MockDocument) -> Self {
        self.state
            .documents
            .write()
            .unwrap()
            .insert(url.into(), document);
        self
    }

    /// Serve a page with no frames.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.with_document(url, MockDocument::new(html))
    }

    pub fn with_failing_url(self, url: impl Into<String>) -> Self {
        self.state.failing.write().unwrap().insert(url.into());
        self
    }

    /// Every URL navigated to, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.state.navigations.read().unwrap().clone()
    }

    pub fn pages_opened(&self) -> usize {
        self.state.pages_opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSession for MockBrowser {
    async fn new_page(&self) -> CrawlResult<Box<dyn PageDriver>> {
        self.state.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockPage::attached(self.state.clone())))
    }
}

/// One tab of a [`MockBrowser`], or a standalone page over fixed HTML.
pub struct MockPage {
    state: Arc<SiteState>,
    current: RwLock<Option<(String, MockDocument)>>,
    checks: AtomicUsize,
    scrolls: AtomicU32,
}

impl MockPage {
    /// A page already showing `html`.
    pub fn new(html: impl Into<String>) -> Self {
        let page = Self::attached(Arc::default());
        *page.current.write().unwrap() = Some(("about:blank".to_string(), MockDocument::new(html)));
        page
    }

    pub fn with_iframe_counts(self, counts: Vec<usize>) -> Self {
        if let Some((_, document)) = self.current.write().unwrap().as_mut() {
            document.iframe_counts = counts;
        }
        self
    }

    /// Number of scroll calls so far.
    pub fn scrolls(&self) -> u32 {
        self.scrolls.load(Ordering::SeqCst)
    }

    fn attached(state: Arc<SiteState>) -> Self {
        Self {
            state,
            current: RwLock::new(None),
            checks: AtomicUsize::new(0),
            scrolls: AtomicU32::new(0),
        }
    }

    fn current(&self) -> CrawlResult<(String, MockDocument)> {
        self.current
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| CrawlError::Browser("no document loaded".to_string()))
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn navigate(&self, url: &str, _wait_until: WaitUntil, _timeout: Duration) -> CrawlResult<()> {
        self.state.navigations.write().unwrap().push(url.to_string());

        if self.state.failing.read().unwrap().contains(url) {
            return Err(CrawlError::Timeout {
                url: url.to_string(),
            });
        }
        let document = self
            .state
            .documents
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| CrawlError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            })?;

        *self.current.write().unwrap() = Some((url.to_string(), document));
        self.checks.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn content(&self) -> CrawlResult<String> {
        Ok(self.current()?.1.html)
    }

    async fn frame_urls(&self) -> CrawlResult<Vec<String>> {
        let (url, document) = self.current()?;
        let mut urls = vec![url];
        urls.extend(document.frames);
        Ok(urls)
    }

    async fn scroll_by(&self, _delta_px: u32) -> CrawlResult<()> {
        self.scrolls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn count_elements(&self, selector: &str) -> CrawlResult<usize> {
        let (_, document) = self.current()?;
        if selector != "iframe" {
            return Ok(0);
        }
        let check = self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(match document.iframe_counts.as_slice() {
            [] => document.frames.len(),
            counts => counts[check.min(counts.len() - 1)],
        })
    }

    async fn close(&self) -> CrawlResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_ai_resolution_order() {
        let ai = MockAI::new()
            .with_response_when("precios", "marker")
            .with_response(ModelSelector::Categorizer, "selector")
            .with_default_response("default");

        let ask = |model, prompt: &str| ai.complete(CompletionRequest::new(model, prompt));
        assert_eq!(ask(ModelSelector::Extraction, "pagina de precios").await.unwrap(), "marker");
        assert_eq!(ask(ModelSelector::Categorizer, "urls").await.unwrap(), "selector");
        assert_eq!(ask(ModelSelector::Merger, "fuentes").await.unwrap(), "default");
        assert_eq!(ai.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_ai_failure() {
        let ai = MockAI::new()
            .with_default_response("{}")
            .with_failure(ModelSelector::Merger);
        let result = ai
            .complete(CompletionRequest::new(ModelSelector::Merger, "x"))
            .await;
        assert!(matches!(result, Err(PipelineError::AI(_))));
        assert_eq!(ai.calls_for(ModelSelector::Merger).len(), 1);
    }

    #[tokio::test]
    async fn test_mock_browser_pages_share_site() {
        let browser = MockBrowser::new()
            .with_document("https://a.pe/", MockDocument::new("<p>a</p>").with_frames(["https://w.pe/x"]))
            .with_failing_url("https://a.pe/down");

        let page = browser.new_page().await.unwrap();
        page.navigate("https://a.pe/", WaitUntil::Load, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(page.content().await.unwrap(), "<p>a</p>");
        assert_eq!(
            page.frame_urls().await.unwrap(),
            vec!["https://a.pe/", "https://w.pe/x"]
        );
        assert_eq!(page.count_elements("iframe").await.unwrap(), 1);
        assert!(page
            .navigate("https://a.pe/down", WaitUntil::Load, Duration::from_secs(1))
            .await
            .is_err());
        assert_eq!(browser.navigations(), vec!["https://a.pe/", "https://a.pe/down"]);
    }
}
