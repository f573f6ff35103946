//! Per-gym aggregates: targets, per-source results and the merged dataset.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::facts::{Discipline, ExtractionResult, FactCategory, Location, Price, ScheduleSlot};

/// A gym to crawl: display name plus site root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GymTarget {
    pub name: String,
    pub base_url: String,
}

impl GymTarget {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
        }
    }
}

/// Source id (page or frame URL) -> facts extracted from that document.
pub type SourceResults = IndexMap<String, ExtractionResult>;

/// Folds per-URL crawl output into one per-gym mapping.
///
/// A source id seen twice (the same URL visited under two category hints)
/// keeps both results instead of the later one replacing the earlier.
#[derive(Debug, Default)]
pub struct SourceAccumulator {
    sources: SourceResults,
}

impl SourceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, results: SourceResults) {
        for (source, result) in results {
            match self.sources.get_mut(&source) {
                Some(existing) => existing.extend(result),
                None => {
                    self.sources.insert(source, result);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn into_sources(self) -> SourceResults {
        self.sources
    }
}

/// The merged, deduplicated facts for one gym. Written once per run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GymDataset {
    pub gym: String,

    #[serde(default)]
    pub locations: Vec<Location>,

    #[serde(default)]
    pub prices: Vec<Price>,

    #[serde(default)]
    pub schedules: Vec<ScheduleSlot>,

    #[serde(default)]
    pub disciplines: Vec<Discipline>,

    /// Unparsed merge output, set only when the merge response was unusable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

impl GymDataset {
    pub fn new(gym: impl Into<String>) -> Self {
        Self {
            gym: gym.into(),
            ..Default::default()
        }
    }

    pub fn from_result(gym: impl Into<String>, result: ExtractionResult) -> Self {
        Self {
            gym: gym.into(),
            locations: result.locations,
            prices: result.prices,
            schedules: result.schedules,
            disciplines: result.disciplines,
            raw_output: None,
        }
    }

    /// A dataset carrying only the raw text of a failed merge.
    pub fn degraded(gym: impl Into<String>, raw_output: impl Into<String>) -> Self {
        Self {
            gym: gym.into(),
            raw_output: Some(raw_output.into()),
            ..Default::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.raw_output.is_some()
    }

    pub fn record_count(&self) -> usize {
        self.locations.len() + self.prices.len() + self.schedules.len() + self.disciplines.len()
    }

    pub fn count(&self, category: FactCategory) -> usize {
        match category {
            FactCategory::Locations => self.locations.len(),
            FactCategory::Prices => self.prices.len(),
            FactCategory::Schedules => self.schedules.len(),
            FactCategory::Disciplines => self.disciplines.len(),
        }
    }

    /// The record arrays without the gym tag.
    pub fn to_result(&self) -> ExtractionResult {
        ExtractionResult {
            locations: self.locations.clone(),
            prices: self.prices.clone(),
            schedules: self.schedules.clone(),
            disciplines: self.disciplines.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discipline(name: &str) -> ExtractionResult {
        ExtractionResult {
            disciplines: vec![Discipline {
                name: Some(name.into()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_accumulator_extends_on_repeated_source() {
        let mut acc = SourceAccumulator::new();
        acc.absorb(IndexMap::from([("https://gym.pe/a".to_string(), discipline("Yoga"))]));
        acc.absorb(IndexMap::from([
            ("https://gym.pe/a".to_string(), discipline("Pilates")),
            ("https://gym.pe/b".to_string(), discipline("Barre")),
        ]));

        let sources = acc.into_sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources["https://gym.pe/a"].disciplines.len(), 2);
        assert_eq!(sources.get_index(1).unwrap().0, "https://gym.pe/b");
    }

    #[test]
    fn test_degraded_dataset() {
        let dataset = GymDataset::degraded("Zenda", "not json");
        assert!(dataset.is_degraded());
        assert_eq!(dataset.record_count(), 0);

        let json = serde_json::to_value(GymDataset::new("Zenda")).unwrap();
        assert!(json.get("raw_output").is_none());
        assert_eq!(json["gym"], "Zenda");
    }
}
