//! Per-gym run reports.

use serde::Serialize;
use tracing::{info, warn};

use crate::types::config::MergeStrategy;
use crate::types::dataset::GymDataset;

/// How a gym's run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GymStatus {
    Stored { gym_id: i64 },
    /// Nothing to crawl (no sitemap, empty sitemap, no usable URLs)
    Skipped { reason: String },
    /// Interrupted before the write; nothing was stored
    Cancelled,
}

/// Records per category in the stored dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordCounts {
    pub locations: usize,
    pub prices: usize,
    pub schedules: usize,
    pub disciplines: usize,
}

impl RecordCounts {
    pub fn of(dataset: &GymDataset) -> Self {
        Self {
            locations: dataset.locations.len(),
            prices: dataset.prices.len(),
            schedules: dataset.schedules.len(),
            disciplines: dataset.disciplines.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.locations + self.prices + self.schedules + self.disciplines
    }
}

/// What happened to one gym.
#[derive(Debug, Clone, Serialize)]
pub struct GymRunReport {
    pub gym: String,
    #[serde(flatten)]
    pub status: GymStatus,
    /// Entries from sitemaps or the override list
    pub urls_discovered: usize,
    /// (category, URL) visits, repeats across categories included
    pub urls_attempted: usize,
    /// Main pages that failed to load
    pub failed_urls: Vec<String>,
    /// Distinct extracted documents (pages and frames)
    pub sources: usize,
    pub frames_extracted: usize,
    pub records: RecordCounts,
    pub merge_strategy: MergeStrategy,
    /// The LLM merge failed and the deterministic merge was used instead
    pub merge_fell_back: bool,
    /// Raw text of an unusable LLM merge response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_raw_output: Option<String>,
}

impl GymRunReport {
    pub fn new(gym: impl Into<String>, merge_strategy: MergeStrategy) -> Self {
        Self {
            gym: gym.into(),
            status: GymStatus::Cancelled,
            urls_discovered: 0,
            urls_attempted: 0,
            failed_urls: Vec::new(),
            sources: 0,
            frames_extracted: 0,
            records: RecordCounts::default(),
            merge_strategy,
            merge_fell_back: false,
            degraded_raw_output: None,
        }
    }

    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.status = GymStatus::Skipped {
            reason: reason.into(),
        };
        self
    }

    pub fn is_stored(&self) -> bool {
        matches!(self.status, GymStatus::Stored { .. })
    }

    /// One structured log line summarizing the run.
    pub fn log(&self) {
        match &self.status {
            GymStatus::Stored { gym_id } => info!(
                gym = %self.gym,
                gym_id,
                urls = self.urls_attempted,
                failed = self.failed_urls.len(),
                sources = self.sources,
                locations = self.records.locations,
                prices = self.records.prices,
                schedules = self.records.schedules,
                disciplines = self.records.disciplines,
                merge = %self.merge_strategy,
                fell_back = self.merge_fell_back,
                "Gym stored"
            ),
            GymStatus::Skipped { reason } => warn!(gym = %self.gym, reason = %reason, "Gym skipped"),
            GymStatus::Cancelled => warn!(
                gym = %self.gym,
                urls = self.urls_attempted,
                "Gym cancelled before storing"
            ),
        }
    }
}
