//! AI implementations for the gym crawler.
//!
//! `OpenAIModel` talks to the chat-completions API; `RateLimitedAI` wraps any
//! implementation with a request quota.

mod openai;
mod rate_limited;

pub use openai::OpenAIModel;
pub use rate_limited::RateLimitedAI;
