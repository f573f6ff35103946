//! OpenAI implementation of the AI trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use gym_crawler::ai::OpenAIModel;
//!
//! let ai = OpenAIModel::from_env()?.with_models(ModelConfig::default());
//! ```

use std::time::Duration;

use async_trait::async_trait;
use openai_client::{ChatRequest, ChatResponse, Message, OpenAIClient};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::traits::ai::{CompletionRequest, ModelSelector, ResponseMode, AI};
use crate::types::config::ModelConfig;

/// Chat-completions backed model, one concrete model per call site.
#[derive(Clone)]
pub struct OpenAIModel {
    client: OpenAIClient,
    models: ModelConfig,
    max_retries: u32,
    retry_backoff: Duration,
}

impl OpenAIModel {
    pub fn new(client: OpenAIClient) -> Self {
        Self {
            client,
            models: ModelConfig::default(),
            max_retries: 2,
            retry_backoff: Duration::from_secs(1),
        }
    }

    /// Retries for transient failures (network, timeout, 429, 5xx).
    ///
    /// The wait doubles after each attempt, starting at `backoff`.
    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    /// Create from environment variable `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let client = OpenAIClient::from_env().map_err(PipelineError::config)?;
        Ok(Self::new(client))
    }

    pub fn with_models(mut self, models: ModelConfig) -> Self {
        self.models = models;
        self
    }

    pub fn models(&self) -> &ModelConfig {
        &self.models
    }

    /// Concrete model id for a call site.
    pub fn model_for(&self, selector: ModelSelector) -> &str {
        match selector {
            ModelSelector::ScheduleClassifier => &self.models.schedule_classifier,
            ModelSelector::Extraction => &self.models.extraction,
            ModelSelector::ScheduleExtraction => &self.models.schedule_extraction,
            ModelSelector::Categorizer => &self.models.categorizer,
            ModelSelector::Merger => &self.models.merger,
        }
    }

    /// Translate a completion into a chat request for the selected model.
    ///
    /// Temperature is dropped for models that only accept the default.
    pub fn chat_request(&self, request: &CompletionRequest) -> ChatRequest {
        let model = self.model_for(request.model);
        let mut chat = ChatRequest::new(model);

        if let Some(system) = &request.system {
            chat = chat.message(Message::system(system.as_str()));
        }
        chat = chat.message(Message::user(request.prompt.as_str()));

        if request.response_mode == ResponseMode::Json {
            chat = chat.json_object();
        }
        if let Some(temperature) = request.temperature {
            if ChatRequest::accepts_temperature(model) {
                chat = chat.temperature(temperature);
            } else {
                debug!(model = %model, "Model only accepts default temperature");
            }
        }
        if let Some(limit) = request.max_tokens {
            chat = chat.token_limit(limit);
        }
        chat
    }

    async fn send(&self, chat: ChatRequest) -> Result<ChatResponse> {
        let mut attempt = 0;
        loop {
            match self.client.chat_completion(chat.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.retry_backoff * 2u32.pow(attempt);
                    attempt += 1;
                    warn!(
                        model = %chat.model,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient completion failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(PipelineError::ai(e)),
            }
        }
    }
}

#[async_trait]
impl AI for OpenAIModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let chat = self.chat_request(&request);
        let model = chat.model.clone();

        let response = self.send(chat).await?;

        if response.is_truncated() {
            warn!(
                model = %model,
                selector = ?request.model,
                "Completion hit the token limit, output may be truncated"
            );
        }
        if let Some(usage) = &response.usage {
            debug!(
                model = %model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion usage"
            );
        }

        Ok(response.content)
    }
}
