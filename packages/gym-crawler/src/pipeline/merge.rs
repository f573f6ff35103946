//! Cross-page merge of per-source results into one gym dataset.
//!
//! Two strategies share one output shape. The deterministic merge dedups by
//! natural key; the LLM merge asks the model to fuse everything and then runs
//! the same dedup over its answer, so neither can emit duplicate keys.

use std::collections::HashMap;

use tracing::{info, instrument, warn};

use super::prompts::{format_merge_prompt, MERGE_SYSTEM_PROMPT};
use super::response::{decode_keyed_object, looks_truncated};
use super::sanitize::{backfill_result, sanitize_result};
use crate::error::Result;
use crate::traits::ai::{CompletionRequest, ModelSelector, AI};
use crate::types::dataset::{GymDataset, SourceResults};
use crate::types::facts::{ExtractionResult, FactCategory, FactRecord};

/// Sampling temperature of the fusion call.
pub const MERGE_TEMPERATURE: f32 = 0.1;

/// Output token budget of the fusion call.
pub const MERGE_MAX_TOKENS: u32 = 10_000;

/// Collapse records sharing a natural key.
///
/// Among colliding records the one with more populated fields wins, then
/// the one with the longer summary, then the first seen. The winner takes
/// the position of the first record with its key. Unkeyable records are
/// always kept.
pub fn dedup_records<R: FactRecord>(records: impl IntoIterator<Item = R>) -> Vec<R> {
    let mut kept: Vec<R> = Vec::new();
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();

    for record in records {
        let Some(key) = record.natural_key() else {
            kept.push(record);
            continue;
        };
        match index.get(&key) {
            Some(&slot) => {
                if prefer(&record, &kept[slot]) {
                    kept[slot] = record;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(record);
            }
        }
    }

    kept
}

/// Whether `candidate` should replace `current`.
fn prefer<R: FactRecord>(candidate: &R, current: &R) -> bool {
    let by_fields = candidate.populated_fields().cmp(&current.populated_fields());
    let by_summary = candidate
        .search_summary()
        .trim()
        .chars()
        .count()
        .cmp(&current.search_summary().trim().chars().count());
    by_fields.then(by_summary).is_gt()
}

/// Dedup every category of a result.
pub fn dedup_result(result: ExtractionResult) -> ExtractionResult {
    ExtractionResult {
        locations: dedup_records(result.locations),
        prices: dedup_records(result.prices),
        schedules: dedup_records(result.schedules),
        disciplines: dedup_records(result.disciplines),
    }
}

/// Key-based merge, no model call.
#[instrument(skip(sources), fields(sources = sources.len()))]
pub fn merge_deterministic(gym_name: &str, sources: &SourceResults) -> GymDataset {
    let mut combined = ExtractionResult::empty();
    for result in sources.values() {
        combined.extend(result.clone());
    }
    let before = combined.record_count();

    backfill_result(&mut combined);
    let merged = dedup_result(combined);

    info!(
        gym = %gym_name,
        before,
        after = merged.record_count(),
        "Deterministic merge complete"
    );
    GymDataset::from_result(gym_name, merged)
}

/// Fuse sources with one model call.
///
/// An unusable response yields a degraded dataset carrying the raw text.
/// Only the model call itself can fail.
#[instrument(skip(ai, sources), fields(sources = sources.len()))]
pub async fn merge_with_llm<A: AI + ?Sized>(
    ai: &A,
    gym_name: &str,
    language: &str,
    sources: &SourceResults,
) -> Result<GymDataset> {
    if sources.values().all(ExtractionResult::is_empty) {
        return Ok(GymDataset::new(gym_name));
    }

    let mut blocks = Vec::with_capacity(sources.len());
    for (source, result) in sources {
        blocks.push((source.clone(), serde_json::to_string_pretty(result)?));
    }

    let request = CompletionRequest::new(
        ModelSelector::Merger,
        format_merge_prompt(gym_name, language, &blocks),
    )
    .with_system(MERGE_SYSTEM_PROMPT)
    .json()
    .with_temperature(MERGE_TEMPERATURE)
    .with_max_tokens(MERGE_MAX_TOKENS);

    let text = ai.complete(request).await?;
    let text = text.trim();
    if looks_truncated(text) {
        warn!(gym = %gym_name, bytes = text.len(), "Merge output looks truncated");
    }

    let keys = FactCategory::ALL.map(|c| c.key());
    let Some(object) = decode_keyed_object(text, &keys).into_object() else {
        warn!(gym = %gym_name, "Merge response is not valid JSON, keeping raw output");
        return Ok(GymDataset::degraded(gym_name, text));
    };

    let merged = dedup_result(sanitize_result(&object));
    info!(gym = %gym_name, records = merged.record_count(), "LLM merge complete");
    Ok(GymDataset::from_result(gym_name, merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::facts::{Discipline, Location};
    use indexmap::IndexMap;
    use serde_json::json;

    fn location(district: &str, address: &str, summary: &str) -> Location {
        Location {
            search_summary: summary.into(),
            district: Some(district.into()),
            full_address: Some(address.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_more_complete_record_wins() {
        let plain = location("Miraflores", "Av. Larco 123", "Sede Miraflores");
        let mut rich = location("miraflores", "av. larco 123", "Sede");
        rich.opening_hours = Some("Lunes a Viernes 06:00-22:00".into());

        let merged = dedup_records(vec![plain, rich.clone()]);
        assert_eq!(merged, vec![rich]);
    }

    #[test]
    fn test_longer_summary_breaks_ties() {
        let short = location("Surco", "Av. Primavera 264", "Sede Surco");
        let long = location("Surco", "Av. Primavera 264", "Sede Surco, frente al parque");
        let merged = dedup_records(vec![short, long.clone()]);
        assert_eq!(merged, vec![long]);
    }

    #[test]
    fn test_first_seen_wins_full_tie_and_keeps_position() {
        let a = location("Surco", "Av. Primavera 264", "Sede A");
        let b = location("Barranco", "Jr. Union 1", "Sede B");
        let a2 = location("Surco", "Av. Primavera 264", "Sede C");

        let merged = dedup_records(vec![a.clone(), b.clone(), a2]);
        assert_eq!(merged, vec![a, b]);
    }

    #[test]
    fn test_unkeyable_records_are_never_merged() {
        let unkeyed = Discipline {
            search_summary: "Clases grupales".into(),
            ..Default::default()
        };
        let merged = dedup_records(vec![unkeyed.clone(), unkeyed.clone()]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_deterministic_is_idempotent() {
        let result: ExtractionResult = serde_json::from_value(json!({
            "locations": [
                {"search_summary": "Sede Miraflores", "district": "Miraflores", "full_address": "Av. Larco 123"},
                {"district": "Miraflores", "full_address": "Av. Larco 123"}
            ],
            "prices": [{"plan_description": "Plan Anual", "value": 1500, "recurrence": "anual"}],
            "disciplines": [{"name": "Yoga"}, {"name": "yoga"}]
        }))
        .unwrap();
        let sources: SourceResults = IndexMap::from([
            ("https://gym.pe/a".to_string(), result.clone()),
            ("https://gym.pe/b".to_string(), result),
        ]);

        let once = merge_deterministic("Zenda", &sources);
        assert_eq!(once.locations.len(), 1);
        assert_eq!(once.prices.len(), 1);
        assert_eq!(once.disciplines.len(), 1);
        assert!(once.to_result().all_summarized());

        let again = merge_deterministic(
            "Zenda",
            &IndexMap::from([
                ("x".to_string(), once.to_result()),
                ("y".to_string(), once.to_result()),
            ]),
        );
        assert_eq!(again, once);
    }
}
