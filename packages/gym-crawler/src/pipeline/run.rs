//! The per-gym crawl-and-merge run.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::categorize::categorize;
use super::extract::FactExtractor;
use super::merge::{merge_deterministic, merge_with_llm};
use super::report::{GymRunReport, GymStatus, RecordCounts};
use crate::crawler::PageCrawler;
use crate::error::Result;
use crate::sitemap::SitemapResolver;
use crate::traits::ai::AI;
use crate::traits::browser::BrowserSession;
use crate::traits::sink::GymSink;
use crate::types::category::{CategorizedUrls, UrlCategory};
use crate::types::config::{MergeStrategy, PipelineConfig};
use crate::types::dataset::{GymDataset, GymTarget, SourceAccumulator, SourceResults};
use crate::types::sitemap::SitemapEntry;

/// Sitemap -> categorize -> crawl -> merge -> sink, one gym at a time.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = GymPipeline::new(ai, PostgresSink::new(&url).await?, PipelineConfig::default())?;
/// let reports = pipeline.run(&browser, &gyms, &cancel).await?;
/// ```
pub struct GymPipeline<A: AI, S: GymSink> {
    ai: A,
    sink: S,
    resolver: SitemapResolver,
    config: PipelineConfig,
}

impl<A: AI, S: GymSink> GymPipeline<A, S> {
    pub fn new(ai: A, sink: S, config: PipelineConfig) -> Result<Self> {
        let resolver = SitemapResolver::new(config.resolver.clone())?;
        Ok(Self {
            ai,
            sink,
            resolver,
            config,
        })
    }

    pub fn with_resolver(mut self, resolver: SitemapResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn ai(&self) -> &A {
        &self.ai
    }

    /// Process every gym in order.
    ///
    /// Per-gym failures are contained in the gym's report; only sink errors
    /// abort the run. Cancellation stops before the next gym.
    pub async fn run(
        &self,
        browser: &dyn BrowserSession,
        gyms: &[GymTarget],
        cancel: &CancellationToken,
    ) -> Result<Vec<GymRunReport>> {
        let mut reports = Vec::with_capacity(gyms.len());

        for gym in gyms {
            if cancel.is_cancelled() {
                warn!(remaining = gyms.len() - reports.len(), "Run cancelled");
                break;
            }
            let report = self.process_gym(browser, gym, cancel).await?;
            report.log();
            reports.push(report);
        }

        let stored = reports.iter().filter(|r| r.is_stored()).count();
        info!(gyms = gyms.len(), stored, "Run complete");
        Ok(reports)
    }

    /// Crawl, merge and store one gym.
    #[instrument(skip(self, browser, cancel), fields(gym = %gym.name, url = %gym.base_url))]
    pub async fn process_gym(
        &self,
        browser: &dyn BrowserSession,
        gym: &GymTarget,
        cancel: &CancellationToken,
    ) -> Result<GymRunReport> {
        let mut report = GymRunReport::new(&gym.name, self.config.merge_strategy);

        let entries = self.discover(gym).await;
        report.urls_discovered = entries.len();
        if entries.is_empty() {
            return Ok(report.skipped("no URLs discovered"));
        }

        let mut categorized = categorize(&self.ai, &entries).await;
        let homepage = entries
            .iter()
            .find(|e| same_page(&e.location, &gym.base_url))
            .cloned()
            .unwrap_or_else(|| SitemapEntry::new(&gym.base_url));
        categorized.push(UrlCategory::Homepage, homepage);

        let Some(sources) = self.crawl_all(browser, gym, &categorized, cancel, &mut report).await
        else {
            report.status = GymStatus::Cancelled;
            return Ok(report);
        };
        report.sources = sources.len();

        let dataset = self.merge(gym, &sources, &mut report).await;
        report.records = RecordCounts::of(&dataset);

        if cancel.is_cancelled() {
            report.status = GymStatus::Cancelled;
            return Ok(report);
        }

        let gym_id = self.sink.store(&dataset).await.inspect_err(|e| {
            error!(gym = %gym.name, error = %e, "Failed to store gym dataset");
        })?;
        report.status = GymStatus::Stored { gym_id };
        Ok(report)
    }

    /// Override URLs for this gym's host, else the sitemap.
    async fn discover(&self, gym: &GymTarget) -> Vec<SitemapEntry> {
        let host = host_of(&gym.base_url);
        let overrides: Vec<SitemapEntry> = self
            .config
            .url_overrides
            .iter()
            .filter(|u| host.is_some() && host_of(u) == host)
            .map(SitemapEntry::new)
            .collect();

        if overrides.is_empty() {
            self.resolver.resolve(&gym.base_url).await
        } else {
            info!(gym = %gym.name, urls = overrides.len(), "Using override URL list");
            overrides
        }
    }

    /// Crawl every (category, URL) pair with a bounded worker pool.
    ///
    /// Returns `None` when cancelled; results are folded in submission order.
    async fn crawl_all(
        &self,
        browser: &dyn BrowserSession,
        gym: &GymTarget,
        categorized: &CategorizedUrls,
        cancel: &CancellationToken,
        report: &mut GymRunReport,
    ) -> Option<SourceResults> {
        let extractor = FactExtractor::new(&self.ai, &self.config.extractor);
        let crawler = PageCrawler::new(extractor, &self.config.crawler);
        let crawler = &crawler;

        let work: Vec<(UrlCategory, &SitemapEntry)> = categorized.iter().collect();
        debug!(gym = %gym.name, visits = work.len(), "Crawling categorized URLs");

        let mut crawls = futures::stream::iter(work)
            .map(|(category, entry)| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let crawl = crawler
                    .crawl_detailed(browser, entry, category.as_str(), &gym.name)
                    .await;
                Some((entry, crawl))
            })
            .buffered(self.config.url_concurrency.max(1));

        let mut accumulator = SourceAccumulator::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(gym = %gym.name, "Cancelled during crawl");
                    return None;
                }
                next = crawls.next() => match next {
                    Some(Some((entry, crawl))) => {
                        report.urls_attempted += 1;
                        report.frames_extracted += crawl.frames_extracted;
                        if !crawl.main_loaded {
                            report.failed_urls.push(entry.location.clone());
                        }
                        accumulator.absorb(crawl.sources);
                    }
                    Some(None) => return None,
                    None => break,
                },
            }
        }

        Some(accumulator.into_sources())
    }

    /// Merge with the configured strategy.
    ///
    /// A failed or unusable LLM merge falls back to the deterministic merge;
    /// the raw response is kept on the report.
    async fn merge(&self, gym: &GymTarget, sources: &SourceResults, report: &mut GymRunReport) -> GymDataset {
        match self.config.merge_strategy {
            MergeStrategy::Deterministic => merge_deterministic(&gym.name, sources),
            MergeStrategy::Llm => {
                let language = &self.config.extractor.output_language;
                match merge_with_llm(&self.ai, &gym.name, language, sources).await {
                    Ok(dataset) if !dataset.is_degraded() => dataset,
                    Ok(degraded) => {
                        warn!(gym = %gym.name, "LLM merge unusable, falling back to deterministic merge");
                        report.merge_fell_back = true;
                        report.degraded_raw_output = degraded.raw_output;
                        merge_deterministic(&gym.name, sources)
                    }
                    Err(e) => {
                        warn!(gym = %gym.name, error = %e, "LLM merge failed, falling back to deterministic merge");
                        report.merge_fell_back = true;
                        merge_deterministic(&gym.name, sources)
                    }
                }
            }
        }
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}

/// Same URL ignoring a trailing slash.
fn same_page(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_page() {
        assert!(same_page("https://zenda.pe/", "https://zenda.pe"));
        assert!(!same_page("https://zenda.pe/precios", "https://zenda.pe"));
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://WWW.Zenda.pe/x").as_deref(), Some("www.zenda.pe"));
        assert_eq!(host_of("not a url"), None);
    }
}
