//! URL intent buckets produced by the categorizer.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::sitemap::SitemapEntry;

/// Coarse intent of a crawl target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlCategory {
    Locations,
    Pricing,
    Schedules,
    Disciplines,
    /// The gym's base URL, added by the pipeline
    Homepage,
}

impl UrlCategory {
    /// Categories the model is asked to classify into.
    pub const CLASSIFIED: [UrlCategory; 4] = [
        Self::Locations,
        Self::Pricing,
        Self::Schedules,
        Self::Disciplines,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locations => "locations",
            Self::Pricing => "pricing",
            Self::Schedules => "schedules",
            Self::Disciplines => "disciplines",
            Self::Homepage => "homepage",
        }
    }
}

impl fmt::Display for UrlCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrlCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "locations" => Ok(Self::Locations),
            "pricing" => Ok(Self::Pricing),
            "schedules" => Ok(Self::Schedules),
            "disciplines" => Ok(Self::Disciplines),
            "homepage" => Ok(Self::Homepage),
            other => Err(format!("unknown URL category: {other}")),
        }
    }
}

/// Category -> ordered entries. Classification is non-exclusive, so one entry
/// may appear under several categories; within a category it appears once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorizedUrls {
    buckets: IndexMap<UrlCategory, Vec<SitemapEntry>>,
}

impl Default for CategorizedUrls {
    fn default() -> Self {
        Self::new()
    }
}

impl CategorizedUrls {
    /// All four classified categories present and empty.
    pub fn new() -> Self {
        let buckets = UrlCategory::CLASSIFIED
            .into_iter()
            .map(|c| (c, Vec::new()))
            .collect();
        Self { buckets }
    }

    /// Append an entry unless the category already holds its location.
    pub fn push(&mut self, category: UrlCategory, entry: SitemapEntry) {
        let bucket = self.buckets.entry(category).or_default();
        if !bucket.iter().any(|e| e.location == entry.location) {
            bucket.push(entry);
        }
    }

    pub fn get(&self, category: UrlCategory) -> &[SitemapEntry] {
        self.buckets.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, category: UrlCategory) -> bool {
        self.buckets.contains_key(&category)
    }

    /// (category, entry) pairs in crawl order.
    pub fn iter(&self) -> impl Iterator<Item = (UrlCategory, &SitemapEntry)> {
        self.buckets
            .iter()
            .flat_map(|(category, entries)| entries.iter().map(move |e| (*category, e)))
    }

    pub fn categories(&self) -> impl Iterator<Item = UrlCategory> + '_ {
        self.buckets.keys().copied()
    }

    /// Total (category, entry) pairs, counting repeats across categories.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_has_all_classified_keys() {
        let urls = CategorizedUrls::new();
        for category in UrlCategory::CLASSIFIED {
            assert!(urls.contains(category));
            assert!(urls.get(category).is_empty());
        }
        assert!(!urls.contains(UrlCategory::Homepage));

        let json = serde_json::to_value(&urls).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_push_dedups_within_category_only() {
        let mut urls = CategorizedUrls::new();
        let entry = SitemapEntry::new("https://gym.pe/clases");
        urls.push(UrlCategory::Schedules, entry.clone());
        urls.push(UrlCategory::Schedules, entry.clone());
        urls.push(UrlCategory::Disciplines, entry);

        assert_eq!(urls.get(UrlCategory::Schedules).len(), 1);
        assert_eq!(urls.get(UrlCategory::Disciplines).len(), 1);
        assert_eq!(urls.len(), 2);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("Pricing".parse::<UrlCategory>(), Ok(UrlCategory::Pricing));
        assert!("blog".parse::<UrlCategory>().is_err());
    }
}
