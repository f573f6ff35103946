//! AI trait for LLM completions.
//!
//! The pipeline treats the model as a fallible oracle: a prompt goes in,
//! text comes out, and that text may be malformed, truncated or missing.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which call site a completion serves.
///
/// Implementations map selectors to concrete model identifiers, so the
/// pipeline never names a model directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSelector {
    ScheduleClassifier,
    Extraction,
    ScheduleExtraction,
    Categorizer,
    Merger,
}

/// Output format requested from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    #[default]
    Text,
    /// JSON-object constrained output
    Json,
}

/// A single completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub model: ModelSelector,
    pub response_mode: ResponseMode,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(model: ModelSelector, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            model,
            response_mode: ResponseMode::Text,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.response_mode = ResponseMode::Json;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// AI trait for LLM operations.
///
/// Implementations must tolerate concurrent calls.
#[async_trait]
pub trait AI: Send + Sync {
    /// Run one completion and return the raw response text.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

#[async_trait]
impl<T: AI + ?Sized> AI for Arc<T> {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        (**self).complete(request).await
    }
}
