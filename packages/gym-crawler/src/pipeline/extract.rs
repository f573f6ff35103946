//! Fact extraction from one pruned document.

use openai_client::truncate_to_char_boundary;
use tracing::{debug, info, instrument, warn};

use super::prompts::{format_extract_prompt, format_schedule_classifier_prompt, RecencyContext};
use super::response::decode_keyed_object;
use super::sanitize::sanitize_result;
use crate::prune::PrunedHtml;
use crate::traits::ai::{CompletionRequest, ModelSelector, AI};
use crate::types::config::ExtractorConfig;
use crate::types::facts::{ExtractionResult, FactCategory};

/// Outcome of the timetable pre-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleSignal {
    Present,
    Absent,
    /// Check disabled, failed or unreadable
    Unknown,
}

/// Pick the extraction model from the timetable signal.
///
/// Only a positive signal pays for the stronger model.
pub fn select_extraction_model(signal: ScheduleSignal) -> ModelSelector {
    match signal {
        ScheduleSignal::Present => ModelSelector::ScheduleExtraction,
        ScheduleSignal::Absent | ScheduleSignal::Unknown => ModelSelector::Extraction,
    }
}

/// Read a YES/NO classifier answer. Tolerates case, punctuation and Spanish.
pub fn parse_yes_no(text: &str) -> Option<bool> {
    let word: String = text
        .trim()
        .chars()
        .skip_while(|c| !c.is_alphabetic())
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_uppercase();

    match word.as_str() {
        "YES" | "Y" | "SI" | "SÍ" | "TRUE" => Some(true),
        "NO" | "N" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Page text plus a plain-text table appendix, capped at `max_bytes`.
pub fn compose_content(pruned: &PrunedHtml, max_bytes: usize) -> String {
    let mut content = pruned.html.clone();
    if !pruned.tables.is_empty() {
        content.push_str("\n\nTABLES:\n");
        content.push_str(&pruned.tables_text());
    }
    if content.len() > max_bytes {
        debug!(bytes = content.len(), max_bytes, "Truncating page content");
        content = truncate_to_char_boundary(&content, max_bytes).to_string();
    }
    content
}

/// Extracts the four fact categories from documents via the LLM.
pub struct FactExtractor<'a, A: AI + ?Sized> {
    ai: &'a A,
    config: &'a ExtractorConfig,
}

impl<A: AI + ?Sized> Clone for FactExtractor<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: AI + ?Sized> Copy for FactExtractor<'_, A> {}

impl<'a, A: AI + ?Sized> FactExtractor<'a, A> {
    pub fn new(ai: &'a A, config: &'a ExtractorConfig) -> Self {
        Self { ai, config }
    }

    /// Extract facts from one document.
    ///
    /// Never fails: an LLM error or an unusable response yields the empty
    /// result with all four categories present.
    #[instrument(skip_all, fields(url = %source_url, category = %category_hint))]
    pub async fn extract(
        &self,
        source_url: &str,
        category_hint: &str,
        pruned: &PrunedHtml,
        gym_name: &str,
        context: &RecencyContext,
    ) -> ExtractionResult {
        let content = compose_content(pruned, self.config.max_content_bytes);

        let signal = if self.config.detect_schedules {
            self.detect_schedule(&content).await
        } else {
            ScheduleSignal::Unknown
        };
        let model = select_extraction_model(signal);
        if signal == ScheduleSignal::Present {
            info!(url = %source_url, "Timetable detected, using schedule extraction model");
        }

        let prompt = format_extract_prompt(
            gym_name,
            source_url,
            category_hint,
            &content,
            &self.config.output_language,
            context,
        );

        let response = match self
            .ai
            .complete(CompletionRequest::new(model, prompt).json())
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(url = %source_url, gym = %gym_name, error = %e, "Extraction call failed");
                return ExtractionResult::empty();
            }
        };

        let keys = FactCategory::ALL.map(|c| c.key());
        let Some(object) = decode_keyed_object(&response, &keys).into_object() else {
            warn!(url = %source_url, gym = %gym_name, "Unusable extraction response");
            return ExtractionResult::empty();
        };

        let result = sanitize_result(&object);
        debug!(
            url = %source_url,
            locations = result.locations.len(),
            prices = result.prices.len(),
            schedules = result.schedules.len(),
            disciplines = result.disciplines.len(),
            "Extraction complete"
        );
        result
    }

    /// Cheap yes/no check for a class timetable.
    pub async fn detect_schedule(&self, content: &str) -> ScheduleSignal {
        let request = CompletionRequest::new(
            ModelSelector::ScheduleClassifier,
            format_schedule_classifier_prompt(content),
        );

        match self.ai.complete(request).await {
            Ok(answer) => match parse_yes_no(&answer) {
                Some(true) => ScheduleSignal::Present,
                Some(false) => ScheduleSignal::Absent,
                None => {
                    debug!(answer = %answer, "Unreadable classifier answer");
                    ScheduleSignal::Unknown
                }
            },
            Err(e) => {
                debug!(error = %e, "Schedule classifier failed");
                ScheduleSignal::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAI;

    const SCHEDULE_JSON: &str = r#"{
        "locations": [], "prices": [], "disciplines": [],
        "schedules": [{"site": "Surco", "class_name": "Yoga", "weekday": "Lunes", "start_time": "07:00"}]
    }"#;

    fn timetable() -> PrunedHtml {
        PrunedHtml {
            html: "<h2>Horarios Surco</h2>".into(),
            tables: vec![vec!["Lunes | Yoga | 07:00".into(), "Martes | Spinning | 08:00".into()]],
        }
    }

    async fn run(ai: &MockAI, config: &ExtractorConfig) -> ExtractionResult {
        FactExtractor::new(ai, config)
            .extract(
                "https://zenda.pe/horarios",
                "schedules",
                &timetable(),
                "Zenda",
                &RecencyContext::default(),
            )
            .await
    }

    #[tokio::test]
    async fn test_failed_call_yields_all_four_categories() {
        let ai = MockAI::new()
            .with_response(ModelSelector::ScheduleClassifier, "NO")
            .with_failure(ModelSelector::Extraction);
        let config = ExtractorConfig::default();

        let result = run(&ai, &config).await;

        assert_eq!(result, ExtractionResult::empty());
        let json = serde_json::to_value(&result).unwrap();
        for category in FactCategory::ALL {
            assert_eq!(json[category.key()], serde_json::json!([]));
        }
        assert_eq!(ai.calls_for(ModelSelector::Extraction).len(), 1);
    }

    #[tokio::test]
    async fn test_unusable_response_yields_empty_result() {
        let ai = MockAI::new()
            .with_response(ModelSelector::ScheduleClassifier, "NO")
            .with_response(ModelSelector::Extraction, "Sorry, I cannot help with that.");

        assert_eq!(run(&ai, &ExtractorConfig::default()).await, ExtractionResult::empty());
    }

    #[tokio::test]
    async fn test_timetable_escalates_to_schedule_model() {
        let ai = MockAI::new()
            .with_response(ModelSelector::ScheduleClassifier, "YES")
            .with_response(ModelSelector::ScheduleExtraction, SCHEDULE_JSON);

        let result = run(&ai, &ExtractorConfig::default()).await;

        assert_eq!(result.schedules.len(), 1);
        assert!(!result.schedules[0].search_summary.trim().is_empty());
        assert_eq!(ai.calls_for(ModelSelector::ScheduleClassifier).len(), 1);
        assert_eq!(ai.calls_for(ModelSelector::ScheduleExtraction).len(), 1);
        assert!(ai.calls_for(ModelSelector::Extraction).is_empty());

        let classifier = &ai.calls_for(ModelSelector::ScheduleClassifier)[0];
        assert!(classifier.prompt.contains("Lunes | Yoga | 07:00"));
    }

    #[tokio::test]
    async fn test_classifier_failure_falls_back_to_extraction_model() {
        let ai = MockAI::new()
            .with_failure(ModelSelector::ScheduleClassifier)
            .with_response(ModelSelector::Extraction, SCHEDULE_JSON);

        let result = run(&ai, &ExtractorConfig::default()).await;

        assert_eq!(result.schedules.len(), 1);
        assert_eq!(ai.calls_for(ModelSelector::ScheduleClassifier).len(), 1);
        assert_eq!(ai.calls_for(ModelSelector::Extraction).len(), 1);
        assert!(ai.calls_for(ModelSelector::ScheduleExtraction).is_empty());
    }

    #[tokio::test]
    async fn test_detection_disabled_skips_classifier() {
        let ai = MockAI::new().with_response(ModelSelector::Extraction, SCHEDULE_JSON);
        let config = ExtractorConfig::default().with_detect_schedules(false);

        run(&ai, &config).await;

        assert!(ai.calls_for(ModelSelector::ScheduleClassifier).is_empty());
        let call = &ai.calls_for(ModelSelector::Extraction)[0];
        assert_eq!(call.response_mode, crate::traits::ai::ResponseMode::Json);
    }

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(parse_yes_no("YES"), Some(true));
        assert_eq!(parse_yes_no(" \"Sí.\""), Some(true));
        assert_eq!(parse_yes_no("no"), Some(false));
        assert_eq!(parse_yes_no("Answer"), None);
        assert_eq!(parse_yes_no(""), None);
    }

    #[test]
    fn test_model_selection() {
        assert_eq!(
            select_extraction_model(ScheduleSignal::Present),
            ModelSelector::ScheduleExtraction
        );
        assert_eq!(
            select_extraction_model(ScheduleSignal::Absent),
            ModelSelector::Extraction
        );
        assert_eq!(
            select_extraction_model(ScheduleSignal::Unknown),
            ModelSelector::Extraction
        );
    }

    #[test]
    fn test_compose_content_appends_tables_and_truncates() {
        let pruned = PrunedHtml {
            html: "<p>Horarios</p>".into(),
            tables: vec![vec!["Yoga | 07:00".into()]],
        };
        assert_eq!(
            compose_content(&pruned, 1000),
            "<p>Horarios</p>\n\nTABLES:\nYoga | 07:00"
        );
        assert_eq!(compose_content(&pruned, 8), "<p>Horar");
    }
}
