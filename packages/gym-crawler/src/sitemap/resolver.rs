//! Sitemap discovery: robots.txt -> sitemap documents -> filtered entries.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info, instrument, warn};
use url::Url;

use super::parser::{parse_sitemap, SitemapDocument};
use super::robots::{parse_sitemap_directives, robots_url};
use crate::error::{CrawlError, CrawlResult, PipelineError, Result};
use crate::types::config::ResolverConfig;
use crate::types::sitemap::SitemapEntry;

/// Resolves a site's page list from its sitemaps.
#[derive(Debug, Clone)]
pub struct SitemapResolver {
    client: reqwest::Client,
    config: ResolverConfig,
}

impl SitemapResolver {
    pub fn new(config: ResolverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(PipelineError::config)?;
        Ok(Self { client, config })
    }

    /// Use an existing HTTP client (its own timeout settings apply).
    pub fn with_client(client: reqwest::Client, config: ResolverConfig) -> Self {
        Self { client, config }
    }

    /// Every same-host page entry reachable from the site's robots.txt.
    ///
    /// Never fails: an unreachable robots file, a robots file without
    /// `Sitemap:` lines, or network errors all yield an empty list. A
    /// malformed sitemap is skipped without affecting the others.
    #[instrument(skip(self), fields(base_url = %base_url))]
    pub async fn resolve(&self, base_url: &str) -> Vec<SitemapEntry> {
        let base = match Url::parse(base_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Invalid base URL");
                return Vec::new();
            }
        };
        let Some(base_host) = base.host_str().map(str::to_string) else {
            warn!("Base URL has no host");
            return Vec::new();
        };

        let sitemaps = match self.sitemap_urls(&base).await {
            Ok(urls) => urls,
            Err(e) => {
                warn!(error = %e, "Failed to fetch robots.txt");
                return Vec::new();
            }
        };
        if sitemaps.is_empty() {
            info!("No sitemap directive found");
            return Vec::new();
        }

        let entries = self.expand(sitemaps).await;
        let total = entries.len();
        let filtered = filter_entries(entries, &base_host);

        info!(
            discovered = total,
            kept = filtered.len(),
            "Sitemap resolution complete"
        );
        filtered
    }

    /// `Sitemap:` directives of the site's robots.txt.
    pub async fn sitemap_urls(&self, base: &Url) -> CrawlResult<Vec<String>> {
        let robots = robots_url(base).ok_or_else(|| CrawlError::InvalidUrl {
            url: base.to_string(),
        })?;

        match self.fetch_text(robots.as_str()).await? {
            Some(content) => Ok(parse_sitemap_directives(&content, Some(base))),
            None => {
                debug!(url = %robots, "robots.txt not available");
                Ok(Vec::new())
            }
        }
    }

    /// Drain the sitemap work queue breadth-first, collecting page entries.
    async fn expand(&self, seeds: Vec<String>) -> Vec<SitemapEntry> {
        let mut queue: VecDeque<String> = seeds.into();
        let mut entries = Vec::new();
        let mut visited = HashSet::new();
        let mut fetched = 0usize;

        while let Some(sitemap_url) = queue.pop_front() {
            if !visited.insert(sitemap_url.clone()) {
                continue;
            }
            if fetched >= self.config.max_sitemaps {
                warn!(
                    max = self.config.max_sitemaps,
                    remaining = queue.len() + 1,
                    "Sitemap document limit reached"
                );
                break;
            }
            fetched += 1;

            let body = match self.fetch_text(&sitemap_url).await {
                Ok(Some(body)) => body,
                Ok(None) => {
                    warn!(url = %sitemap_url, "Sitemap returned non-success status");
                    continue;
                }
                Err(e) => {
                    warn!(url = %sitemap_url, error = %e, "Failed to fetch sitemap");
                    continue;
                }
            };

            match parse_sitemap(&body) {
                Ok(SitemapDocument::Index(nested)) => {
                    debug!(url = %sitemap_url, count = nested.len(), "Sitemap index");
                    queue.extend(nested);
                }
                Ok(SitemapDocument::UrlSet(found)) => {
                    debug!(url = %sitemap_url, count = found.len(), "Sitemap urlset");
                    entries.extend(found);
                }
                Err(e) => {
                    warn!(url = %sitemap_url, error = %e, "Skipping malformed sitemap");
                }
            }
        }

        entries
    }

    /// Body of a successful GET, `None` for a non-success status.
    async fn fetch_text(&self, url: &str) -> CrawlResult<Option<String>> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                CrawlError::Timeout {
                    url: url.to_string(),
                }
            } else {
                CrawlError::Http(Box::new(e))
            }
        })?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| CrawlError::Http(Box::new(e)))?;
        Ok(Some(body))
    }
}

/// Keep entries on exactly `host`, first occurrence of each location.
pub fn filter_entries(entries: Vec<SitemapEntry>, host: &str) -> Vec<SitemapEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| e.host().as_deref() == Some(host))
        .filter(|e| seen.insert(e.location.clone()))
        .collect()
}
