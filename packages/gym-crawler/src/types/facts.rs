//! Fact records and the per-document extraction result.
//!
//! Every record carries a `search_summary`: one natural-language sentence used
//! for vector search downstream. The four categories form a closed set.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;

/// The closed set of fact categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
    Locations,
    Prices,
    Schedules,
    Disciplines,
}

impl FactCategory {
    pub const ALL: [FactCategory; 4] = [
        Self::Locations,
        Self::Prices,
        Self::Schedules,
        Self::Disciplines,
    ];

    /// JSON key of this category in model responses and datasets.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Locations => "locations",
            Self::Prices => "prices",
            Self::Schedules => "schedules",
            Self::Disciplines => "disciplines",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

impl fmt::Display for FactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Natural key of a record: normalized components, compared as a tuple.
pub type NaturalKey = Vec<String>;

/// Behaviour shared by the four record variants.
pub trait FactRecord: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync {
    const CATEGORY: FactCategory;

    fn search_summary(&self) -> &str;

    fn set_search_summary(&mut self, summary: String);

    /// Structured attributes as (name, value) pairs, in schema order.
    fn fields(&self) -> Vec<(&'static str, Option<String>)>;

    /// Unknown attributes the model added beyond the schema.
    fn extra(&self) -> &Map<String, Value>;

    /// Natural-key components; `None` entries make the record unkeyable.
    fn key_components(&self) -> Vec<Option<String>>;

    /// Deterministic summary built from structured attributes.
    fn template_summary(&self) -> String;

    /// Key used for deduplication, or `None` when any component is missing.
    fn natural_key(&self) -> Option<NaturalKey> {
        self.key_components()
            .into_iter()
            .map(|c| c.as_deref().and_then(normalize_key_part))
            .collect()
    }

    /// Number of populated attributes, summary excluded.
    fn populated_fields(&self) -> usize {
        let structured = self.fields().iter().filter(|(_, v)| v.is_some()).count();
        let extra = self
            .extra()
            .values()
            .filter(|v| lenient::value_to_string(v).is_some())
            .count();
        structured + extra
    }

    /// Fallback summary: the category template when any structured field is
    /// set, else a listing of whatever unknown attributes the model produced.
    fn synthesize_summary(&self) -> String {
        let has_structured = self.fields().iter().any(|(_, v)| v.is_some());
        if has_structured || self.extra().is_empty() {
            return self.template_summary();
        }
        let listed: Vec<String> = self
            .extra()
            .iter()
            .filter_map(|(k, v)| lenient::value_to_string(v).map(|v| format!("{k}: {v}")))
            .collect();
        if listed.is_empty() {
            self.template_summary()
        } else {
            format!("{} record: {}", Self::CATEGORY, listed.join(", "))
        }
    }
}

fn normalize_key_part(part: &str) -> Option<String> {
    let normalized = part.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// A physical gym site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, deserialize_with = "lenient::string")]
    pub search_summary: String,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub full_address: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,

    /// Business hours of the whole site (not class times)
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FactRecord for Location {
    const CATEGORY: FactCategory = FactCategory::Locations;

    fn search_summary(&self) -> &str {
        &self.search_summary
    }

    fn set_search_summary(&mut self, summary: String) {
        self.search_summary = summary;
    }

    fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("full_address", self.full_address.clone()),
            ("district", self.district.clone()),
            ("opening_hours", self.opening_hours.clone()),
        ]
    }

    fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    fn key_components(&self) -> Vec<Option<String>> {
        vec![self.district.clone(), self.full_address.clone()]
    }

    fn template_summary(&self) -> String {
        let mut summary = format!(
            "Gym location at {}",
            self.full_address.as_deref().unwrap_or("an unspecified address")
        );
        if let Some(district) = &self.district {
            summary.push_str(&format!(" in the {district} district"));
        }
        summary.push('.');
        if let Some(hours) = &self.opening_hours {
            summary.push_str(&format!(" Opening hours: {hours}."));
        }
        summary
    }
}

/// A membership plan or fee.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Price {
    #[serde(default, deserialize_with = "lenient::string")]
    pub search_summary: String,

    /// Site the price applies to ("All" when site-independent)
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub plan_description: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_number", skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    /// ISO 4217 code, e.g. "PEN"
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FactRecord for Price {
    const CATEGORY: FactCategory = FactCategory::Prices;

    fn search_summary(&self) -> &str {
        &self.search_summary
    }

    fn set_search_summary(&mut self, summary: String) {
        self.search_summary = summary;
    }

    fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("site", self.site.clone()),
            ("plan_description", self.plan_description.clone()),
            ("value", self.value.map(format_amount)),
            ("currency", self.currency.clone()),
            ("recurrence", self.recurrence.clone()),
        ]
    }

    fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    fn key_components(&self) -> Vec<Option<String>> {
        vec![
            self.plan_description.clone(),
            self.value.map(format_amount),
            self.recurrence.clone(),
        ]
    }

    fn template_summary(&self) -> String {
        let mut summary = format!(
            "Plan '{}'",
            self.plan_description.as_deref().unwrap_or("unspecified")
        );
        if let Some(value) = self.value {
            summary.push_str(&format!(" costs {}", format_amount(value)));
            if let Some(currency) = &self.currency {
                summary.push_str(&format!(" {currency}"));
            }
        }
        if let Some(recurrence) = &self.recurrence {
            summary.push_str(&format!(" ({recurrence})"));
        }
        if let Some(site) = &self.site {
            summary.push_str(&format!(" at site {site}"));
        }
        summary.push('.');
        summary
    }
}

/// One class session in a timetable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    #[serde(default, deserialize_with = "lenient::string")]
    pub search_summary: String,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,

    /// Calendar date, DD-MM-YYYY or DD-MM
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub weekday: Option<String>,

    /// 24-hour HH:MM
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FactRecord for ScheduleSlot {
    const CATEGORY: FactCategory = FactCategory::Schedules;

    fn search_summary(&self) -> &str {
        &self.search_summary
    }

    fn set_search_summary(&mut self, summary: String) {
        self.search_summary = summary;
    }

    fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("site", self.site.clone()),
            ("class_name", self.class_name.clone()),
            ("instructor", self.instructor.clone()),
            ("date", self.date.clone()),
            ("weekday", self.weekday.clone()),
            ("start_time", self.start_time.clone()),
            ("end_time", self.end_time.clone()),
        ]
    }

    fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    fn key_components(&self) -> Vec<Option<String>> {
        vec![
            self.site.clone(),
            self.class_name.clone(),
            self.weekday.clone(),
            self.start_time.clone(),
        ]
    }

    fn template_summary(&self) -> String {
        let mut summary = format!(
            "Class '{}'",
            self.class_name.as_deref().unwrap_or("unspecified")
        );
        if let Some(instructor) = &self.instructor {
            summary.push_str(&format!(" taught by {instructor}"));
        }
        if let Some(weekday) = &self.weekday {
            summary.push_str(&format!(" on {weekday}"));
        }
        if let Some(date) = &self.date {
            summary.push_str(&format!(" on date {date}"));
        }
        match (&self.start_time, &self.end_time) {
            (Some(start), Some(end)) => summary.push_str(&format!(" from {start} to {end}")),
            (Some(start), None) => summary.push_str(&format!(" at {start}")),
            _ => {}
        }
        if let Some(site) = &self.site {
            summary.push_str(&format!(" at site {site}"));
        }
        summary.push('.');
        summary
    }
}

/// A discipline or activity the gym offers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Discipline {
    #[serde(default, deserialize_with = "lenient::string")]
    pub search_summary: String,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FactRecord for Discipline {
    const CATEGORY: FactCategory = FactCategory::Disciplines;

    fn search_summary(&self) -> &str {
        &self.search_summary
    }

    fn set_search_summary(&mut self, summary: String) {
        self.search_summary = summary;
    }

    fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("name", self.name.clone()),
            ("description", self.description.clone()),
        ]
    }

    fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    fn key_components(&self) -> Vec<Option<String>> {
        vec![self.name.clone()]
    }

    fn template_summary(&self) -> String {
        match (&self.name, &self.description) {
            (Some(name), Some(description)) => format!("{name}: {description}"),
            (Some(name), None) => format!("Discipline offered: {name}."),
            (None, Some(description)) => format!("Discipline offered: {description}"),
            (None, None) => "Discipline offered: unspecified.".to_string(),
        }
    }
}

/// Facts extracted from one source document.
///
/// All four categories are always present (possibly empty), including when
/// extraction failed outright.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub locations: Vec<Location>,

    #[serde(default)]
    pub prices: Vec<Price>,

    #[serde(default)]
    pub schedules: Vec<ScheduleSlot>,

    #[serde(default)]
    pub disciplines: Vec<Discipline>,
}

impl ExtractionResult {
    /// The zero value: all four categories empty.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    pub fn record_count(&self) -> usize {
        self.locations.len() + self.prices.len() + self.schedules.len() + self.disciplines.len()
    }

    /// Record count for one category.
    pub fn count(&self, category: FactCategory) -> usize {
        match category {
            FactCategory::Locations => self.locations.len(),
            FactCategory::Prices => self.prices.len(),
            FactCategory::Schedules => self.schedules.len(),
            FactCategory::Disciplines => self.disciplines.len(),
        }
    }

    /// Append every record of `other`, category by category.
    pub fn extend(&mut self, other: ExtractionResult) {
        self.locations.extend(other.locations);
        self.prices.extend(other.prices);
        self.schedules.extend(other.schedules);
        self.disciplines.extend(other.disciplines);
    }

    /// Every record has a non-empty summary.
    pub fn all_summarized(&self) -> bool {
        fn ok<R: FactRecord>(records: &[R]) -> bool {
            records.iter().all(|r| !r.search_summary().trim().is_empty())
        }
        ok(&self.locations) && ok(&self.prices) && ok(&self.schedules) && ok(&self.disciplines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lenient_record_decoding_keeps_unknown_fields() {
        let price: Price = serde_json::from_value(json!({
            "plan_description": "Plan Anual",
            "value": "S/ 1500",
            "currency": "PEN",
            "recurrence": null,
            "promo_code": "VERANO"
        }))
        .unwrap();

        assert_eq!(price.value, Some(1500.0));
        assert_eq!(price.recurrence, None);
        assert_eq!(price.search_summary, "");
        assert_eq!(price.extra.get("promo_code"), Some(&json!("VERANO")));
    }

    #[test]
    fn test_natural_key_normalizes_and_requires_all_parts() {
        let a = Location {
            district: Some("Miraflores".into()),
            full_address: Some("Av.  Larco 123".into()),
            ..Default::default()
        };
        let b = Location {
            district: Some(" miraflores".into()),
            full_address: Some("av. larco 123 ".into()),
            ..Default::default()
        };
        assert_eq!(a.natural_key(), b.natural_key());

        let unkeyed = Location {
            full_address: Some("Av. Larco 123".into()),
            ..Default::default()
        };
        assert_eq!(unkeyed.natural_key(), None);
    }

    #[test]
    fn test_populated_fields_counts_extra() {
        let mut d = Discipline {
            name: Some("Yoga".into()),
            ..Default::default()
        };
        assert_eq!(d.populated_fields(), 1);
        d.extra.insert("level".into(), json!("beginner"));
        d.extra.insert("empty".into(), json!(""));
        assert_eq!(d.populated_fields(), 2);
    }

    #[test]
    fn test_templates_are_never_empty() {
        assert!(!Location::default().synthesize_summary().is_empty());
        assert!(!Price::default().synthesize_summary().is_empty());
        assert!(!ScheduleSlot::default().synthesize_summary().is_empty());
        assert!(!Discipline::default().synthesize_summary().is_empty());
    }

    #[test]
    fn test_schedule_template() {
        let slot = ScheduleSlot {
            class_name: Some("Yoga Flow".into()),
            instructor: Some("Mariana".into()),
            weekday: Some("Tuesday".into()),
            start_time: Some("09:00".into()),
            end_time: Some("10:00".into()),
            site: Some("Miraflores".into()),
            ..Default::default()
        };
        assert_eq!(
            slot.synthesize_summary(),
            "Class 'Yoga Flow' taught by Mariana on Tuesday from 09:00 to 10:00 at site Miraflores."
        );
    }

    #[test]
    fn test_summary_falls_back_to_extra_fields() {
        let mut location = Location::default();
        location.extra.insert("sede".into(), json!("Surco"));
        assert_eq!(location.synthesize_summary(), "locations record: sede: Surco");
    }

    #[test]
    fn test_extraction_result_always_serializes_four_keys() {
        let value = serde_json::to_value(ExtractionResult::empty()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        for category in FactCategory::ALL {
            assert_eq!(obj[category.key()], json!([]));
        }
    }
}
