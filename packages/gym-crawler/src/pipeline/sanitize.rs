//! Turning loosely-shaped model JSON into typed, summarized records.
//!
//! Sanitization is total: every record that comes out has a non-empty
//! `search_summary`, and anything that is not a record is dropped.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::types::facts::{ExtractionResult, FactCategory, FactRecord};

/// Typed, summarized records from one category array.
///
/// Non-object elements are discarded. Missing or blank summaries are
/// synthesized from the record's structured fields.
pub fn sanitize_records<R: FactRecord>(value: Option<&Value>) -> Vec<R> {
    let Some(value) = value else {
        return Vec::new();
    };
    let Value::Array(items) = value else {
        debug!(category = %R::CATEGORY, "Category is not a list, using empty");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            if !item.is_object() {
                debug!(category = %R::CATEGORY, "Discarding non-object element");
                return None;
            }
            match serde_json::from_value::<R>(item.clone()) {
                Ok(mut record) => {
                    backfill_summary(&mut record);
                    Some(record)
                }
                Err(e) => {
                    warn!(category = %R::CATEGORY, error = %e, "Discarding undecodable record");
                    None
                }
            }
        })
        .collect()
}

/// An extraction result from a keyed object.
///
/// The four categories are always present; keys outside the closed set are
/// discarded, never folded into a known category.
pub fn sanitize_result(object: &Map<String, Value>) -> ExtractionResult {
    for key in object.keys() {
        if FactCategory::from_key(key).is_none() && key != "gym" {
            debug!(key = %key, "Discarding unknown category");
        }
    }

    ExtractionResult {
        locations: sanitize_records(object.get(FactCategory::Locations.key())),
        prices: sanitize_records(object.get(FactCategory::Prices.key())),
        schedules: sanitize_records(object.get(FactCategory::Schedules.key())),
        disciplines: sanitize_records(object.get(FactCategory::Disciplines.key())),
    }
}

/// Fill blank summaries across an already typed result.
pub fn backfill_result(result: &mut ExtractionResult) {
    result.locations.iter_mut().for_each(backfill_summary);
    result.prices.iter_mut().for_each(backfill_summary);
    result.schedules.iter_mut().for_each(backfill_summary);
    result.disciplines.iter_mut().for_each(backfill_summary);
}

fn backfill_summary<R: FactRecord>(record: &mut R) {
    if record.search_summary().trim().is_empty() {
        debug!(category = %R::CATEGORY, "Synthesizing missing search_summary");
        let summary = record.synthesize_summary();
        record.set_search_summary(summary);
    }
}
