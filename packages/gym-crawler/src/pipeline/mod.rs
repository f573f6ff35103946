//! Crawl-and-merge pipeline.
//!
//! The pipeline orchestrates:
//! - URL categorization (one LLM call over the sitemap)
//! - Per-document fact extraction with timetable-aware model selection
//! - Cross-page merge (deterministic or LLM fusion)
//! - The per-gym run: discover, crawl, merge, store

pub mod categorize;
pub mod extract;
pub mod merge;
pub mod prompts;
pub mod report;
pub mod response;
pub mod run;
pub mod sanitize;

pub use categorize::categorize;
pub use extract::{compose_content, select_extraction_model, FactExtractor, ScheduleSignal};
pub use merge::{dedup_records, dedup_result, merge_deterministic, merge_with_llm};
pub use prompts::{
    format_categorize_prompt, format_extract_prompt, format_merge_prompt, RecencyContext,
    CATEGORIZE_PROMPT, EXTRACT_PROMPT, MERGE_PROMPT,
};
pub use report::{GymRunReport, GymStatus, RecordCounts};
pub use response::{decode_keyed_object, Decoded};
pub use run::GymPipeline;
pub use sanitize::{sanitize_records, sanitize_result};
