//! Rate-limited AI wrapper.
//!
//! Wraps any AI implementation with a request quota using the governor crate.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::Result;
use crate::traits::ai::{CompletionRequest, AI};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// An AI wrapper that enforces a request quota.
///
/// Every completion waits for a permit, so concurrent URL workers share one
/// budget.
pub struct RateLimitedAI<A: AI> {
    inner: A,
    limiter: Arc<DefaultRateLimiter>,
}

impl<A: AI> RateLimitedAI<A> {
    /// Allow `requests_per_minute` completions per minute. Zero is treated as one.
    pub fn per_minute(inner: A, requests_per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));
        Self::with_quota(inner, quota)
    }

    /// Create with a custom quota.
    pub fn with_quota(inner: A, quota: Quota) -> Self {
        Self {
            inner,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

#[async_trait]
impl<A: AI> AI for RateLimitedAI<A> {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.limiter.until_ready().await;
        self.inner.complete(request).await
    }
}
