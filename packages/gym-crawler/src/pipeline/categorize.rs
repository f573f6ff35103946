//! URL categorization into crawl intent buckets.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::prompts::format_categorize_prompt;
use super::response::decode_keyed_object;
use crate::traits::ai::{CompletionRequest, ModelSelector, AI};
use crate::types::category::{CategorizedUrls, UrlCategory};
use crate::types::sitemap::SitemapEntry;

/// Classify sitemap entries into the four intent categories.
///
/// One model call over the whole list, at temperature 0. URLs the model
/// returns are mapped back to their entries; URLs it invents are kept as
/// bare stub entries. Never fails: any error yields four empty categories.
#[instrument(skip_all, fields(urls = entries.len()))]
pub async fn categorize<A: AI + ?Sized>(ai: &A, entries: &[SitemapEntry]) -> CategorizedUrls {
    let mut categorized = CategorizedUrls::new();
    if entries.is_empty() {
        return categorized;
    }

    let urls: Vec<&str> = entries.iter().map(|e| e.location.as_str()).collect();
    let urls_json = match serde_json::to_string(&urls) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize URL list");
            return categorized;
        }
    };

    let request = CompletionRequest::new(
        ModelSelector::Categorizer,
        format_categorize_prompt(&urls_json),
    )
    .json()
    .with_temperature(0.0);

    let response = match ai.complete(request).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Categorization call failed");
            return categorized;
        }
    };

    let keys = UrlCategory::CLASSIFIED.map(|c| c.as_str());
    let Some(object) = decode_keyed_object(&response, &keys).into_object() else {
        warn!("Unusable categorization response");
        return categorized;
    };

    let lookup: HashMap<&str, &SitemapEntry> = entries
        .iter()
        .map(|e| (e.location.as_str(), e))
        .collect();

    for (key, value) in &object {
        let category = match key.parse::<UrlCategory>() {
            Ok(category) if UrlCategory::CLASSIFIED.contains(&category) => category,
            _ => {
                debug!(key = %key, "Discarding unknown category");
                continue;
            }
        };
        let Value::Array(items) = value else {
            debug!(category = %category, "Category is not a list");
            continue;
        };

        for url in items.iter().filter_map(url_of) {
            let entry = match lookup.get(url) {
                Some(entry) => (*entry).clone(),
                None => {
                    debug!(url = %url, category = %category, "Keeping unknown URL as stub entry");
                    SitemapEntry::new(url)
                }
            };
            categorized.push(category, entry);
        }
    }

    info!(
        locations = categorized.get(UrlCategory::Locations).len(),
        pricing = categorized.get(UrlCategory::Pricing).len(),
        schedules = categorized.get(UrlCategory::Schedules).len(),
        disciplines = categorized.get(UrlCategory::Disciplines).len(),
        "Categorized URLs"
    );
    categorized
}

/// A URL from a list element: a string, or an object with `url`/`loc`.
fn url_of(item: &Value) -> Option<&str> {
    let url = match item {
        Value::String(s) => s.as_str(),
        Value::Object(o) => o.get("url").or_else(|| o.get("loc"))?.as_str()?,
        _ => return None,
    };
    let url = url.trim();
    (!url.is_empty()).then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAI;
    use crate::traits::ai::ResponseMode;

    fn entries() -> Vec<SitemapEntry> {
        vec![
            SitemapEntry::new("https://zenda.pe/sedes").with_priority(0.8),
            SitemapEntry::new("https://zenda.pe/precios"),
            SitemapEntry::new("https://zenda.pe/blog/post-1"),
        ]
    }

    #[tokio::test]
    async fn test_maps_urls_back_to_entries() {
        let ai = MockAI::new().with_response(
            ModelSelector::Categorizer,
            r#"```json
            {"locations": ["https://zenda.pe/sedes"],
             "pricing": ["https://zenda.pe/precios", "https://zenda.pe/planes"],
             "schedules": [{"url": "https://zenda.pe/sedes"}],
             "blog": ["https://zenda.pe/blog/post-1"]}
            ```"#,
        );

        let categorized = categorize(&ai, &entries()).await;

        assert_eq!(categorized.get(UrlCategory::Locations)[0].priority, Some(0.8));
        // Unknown URL kept as a stub.
        assert_eq!(categorized.get(UrlCategory::Pricing).len(), 2);
        assert_eq!(categorized.get(UrlCategory::Pricing)[1].priority, None);
        // Non-exclusive membership.
        assert_eq!(categorized.get(UrlCategory::Schedules)[0].location, "https://zenda.pe/sedes");
        assert!(categorized.get(UrlCategory::Disciplines).is_empty());
        assert_eq!(categorized.categories().count(), 4);

        let calls = ai.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].response_mode, ResponseMode::Json);
        assert_eq!(calls[0].temperature, Some(0.0));
        assert!(calls[0].prompt.contains("https://zenda.pe/blog/post-1"));
    }

    #[tokio::test]
    async fn test_failure_yields_four_empty_categories() {
        let ai = MockAI::new().with_failure(ModelSelector::Categorizer);
        let categorized = categorize(&ai, &entries()).await;

        assert!(categorized.is_empty());
        assert!(UrlCategory::CLASSIFIED.iter().all(|c| categorized.contains(*c)));
    }

    #[tokio::test]
    async fn test_malformed_response_yields_empty() {
        let ai = MockAI::new().with_default_response("Sorry, I cannot help with that.");
        assert!(categorize(&ai, &entries()).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_skips_the_call() {
        let ai = MockAI::new();
        assert!(categorize(&ai, &[]).await.is_empty());
        assert!(ai.calls().is_empty());
    }
}
