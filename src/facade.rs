//! User-facing [`RateLimiter`] facade (§4.I): builds the runtime key as
//! `base_key ":" key`, dispatches to the single or composite engine, and
//! reduces the per-quota results to one allow/deny boolean.

use crate::backend::Backend;
use crate::cancel::CancelToken;
use crate::clock::{Clock, SystemClock};
use crate::composite_strategy;
use crate::config::{CompositeConfig, StrategyConfig};
use crate::engine::{all_allowed, GcraEngine, LeakyBucketEngine, LimitResults, TokenBucketEngine};
use crate::engine::FixedWindowEngine;
use crate::error::{ConfigError, Result};
use std::sync::Arc;

enum Strategy {
    Single(StrategyConfig),
    Composite(CompositeConfig),
}

/// Builds a [`RateLimiter`]. `backend` and a primary strategy are required;
/// a secondary strategy turns the limiter into a composite.
pub struct RateLimiterBuilder<B> {
    backend: Option<B>,
    primary: Option<StrategyConfig>,
    secondary: Option<StrategyConfig>,
    base_key: String,
    clock: Arc<dyn Clock>,
}

impl<B: Backend> RateLimiterBuilder<B> {
    pub fn new() -> Self {
        Self {
            backend: None,
            primary: None,
            secondary: None,
            base_key: String::new(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_backend(mut self, backend: B) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_primary_strategy(mut self, config: impl Into<StrategyConfig>) -> Self {
        self.primary = Some(config.into());
        self
    }

    pub fn with_secondary_strategy(mut self, config: impl Into<StrategyConfig>) -> Self {
        self.secondary = Some(config.into());
        self
    }

    pub fn with_base_key(mut self, base_key: impl Into<String>) -> Self {
        self.base_key = base_key.into();
        self
    }

    /// Overrides the clock, mainly so tests can drive a [`crate::clock::FakeClock`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<RateLimiter<B>> {
        let backend = self
            .backend
            .ok_or_else(|| ConfigError::MissingRequired("backend is required".into()))?;
        let primary = self
            .primary
            .ok_or_else(|| ConfigError::MissingRequired("primary_strategy is required".into()))?;

        let strategy = match self.secondary {
            Some(secondary) => Strategy::Composite(CompositeConfig::new(self.base_key.clone(), primary, secondary)?),
            None => {
                primary.validate()?;
                Strategy::Single(primary)
            }
        };

        Ok(RateLimiter {
            backend,
            strategy,
            base_key: self.base_key,
            clock: self.clock,
        })
    }
}

impl<B: Backend> Default for RateLimiterBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// A rate limiter over one backend and one or two strategies (§4.I).
pub struct RateLimiter<B> {
    backend: B,
    strategy: Strategy,
    base_key: String,
    clock: Arc<dyn Clock>,
}

impl<B: Backend> RateLimiter<B> {
    pub fn builder() -> RateLimiterBuilder<B> {
        RateLimiterBuilder::new()
    }

    fn runtime_key(&self, key: &str) -> String {
        format!("{}:{}", self.base_key, key)
    }

    /// Attempts to consume one unit for `key`. Returns `(allowed, results)`;
    /// `allowed` is true iff every sub-result allowed.
    pub async fn allow(&self, key: &str, cancel: Option<&CancelToken>) -> Result<(bool, LimitResults)> {
        let runtime_key = self.runtime_key(key);
        let results = match &self.strategy {
            Strategy::Single(config) => dispatch_allow(&self.backend, self.clock.as_ref(), cancel, &runtime_key, config).await?,
            Strategy::Composite(config) => {
                composite_strategy::allow(&self.backend, self.clock.as_ref(), cancel, key, config).await?
            }
        };
        Ok((all_allowed(&results), results))
    }

    /// Reports what `allow` would return, without consuming.
    pub async fn peek(&self, key: &str) -> Result<(bool, LimitResults)> {
        let runtime_key = self.runtime_key(key);
        let results = match &self.strategy {
            Strategy::Single(config) => dispatch_peek(&self.backend, self.clock.as_ref(), &runtime_key, config).await?,
            Strategy::Composite(config) => composite_strategy::peek(&self.backend, self.clock.as_ref(), key, config).await?,
        };
        Ok((all_allowed(&results), results))
    }

    /// Deletes this key's state.
    pub async fn reset(&self, key: &str) -> Result<()> {
        let runtime_key = self.runtime_key(key);
        match &self.strategy {
            Strategy::Single(config) => dispatch_reset(&self.backend, &runtime_key, config).await,
            Strategy::Composite(config) => composite_strategy::reset(&self.backend, key, config).await,
        }
    }

    /// Closes the backend. Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.backend.close().await
    }
}

async fn dispatch_allow<B: Backend>(
    backend: &B,
    clock: &dyn Clock,
    cancel: Option<&CancelToken>,
    key: &str,
    config: &StrategyConfig,
) -> Result<LimitResults> {
    match config {
        StrategyConfig::FixedWindow(c) => FixedWindowEngine.allow(backend, clock, cancel, key, c).await,
        StrategyConfig::TokenBucket(c) => TokenBucketEngine.allow(backend, clock, cancel, key, c).await,
        StrategyConfig::LeakyBucket(c) => LeakyBucketEngine.allow(backend, clock, cancel, key, c).await,
        StrategyConfig::Gcra(c) => GcraEngine.allow(backend, clock, cancel, key, c).await,
    }
}

async fn dispatch_peek<B: Backend>(backend: &B, clock: &dyn Clock, key: &str, config: &StrategyConfig) -> Result<LimitResults> {
    match config {
        StrategyConfig::FixedWindow(c) => FixedWindowEngine.peek(backend, clock, key, c).await,
        StrategyConfig::TokenBucket(c) => TokenBucketEngine.peek(backend, clock, key, c).await,
        StrategyConfig::LeakyBucket(c) => LeakyBucketEngine.peek(backend, clock, key, c).await,
        StrategyConfig::Gcra(c) => GcraEngine.peek(backend, clock, key, c).await,
    }
}

async fn dispatch_reset<B: Backend>(backend: &B, key: &str, config: &StrategyConfig) -> Result<()> {
    match config {
        StrategyConfig::FixedWindow(_) => FixedWindowEngine.reset(backend, key).await,
        StrategyConfig::TokenBucket(_) => TokenBucketEngine.reset(backend, key).await,
        StrategyConfig::LeakyBucket(_) => LeakyBucketEngine.reset(backend, key).await,
        StrategyConfig::Gcra(_) => GcraEngine.reset(backend, key).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::clock::FakeClock;
    use crate::config::{FixedWindowConfig, TokenBucketConfig};
    use crate::quota::Quota;

    #[tokio::test]
    async fn single_strategy_allow_and_peek() {
        let clock = Arc::new(FakeClock::new(0));
        let limiter = RateLimiter::builder()
            .with_backend(MemoryBackend::new())
            .with_primary_strategy(FixedWindowConfig::new(vec![Quota::per_second("u", 2)]).unwrap())
            .with_base_key("svc")
            .with_clock(clock.clone())
            .build()
            .unwrap();

        let (allowed, _) = limiter.peek("tenant").await.unwrap();
        assert!(allowed);

        let (allowed, _) = limiter.allow("tenant", None).await.unwrap();
        assert!(allowed);
        let (allowed, _) = limiter.allow("tenant", None).await.unwrap();
        assert!(allowed);
        let (allowed, _) = limiter.allow("tenant", None).await.unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn composite_strategy_requires_both_roles() {
        let limiter = RateLimiter::builder()
            .with_backend(MemoryBackend::new())
            .with_primary_strategy(FixedWindowConfig::new(vec![Quota::per_second("u", 20)]).unwrap())
            .with_secondary_strategy(TokenBucketConfig::new(5, 1.0).unwrap())
            .with_base_key("svc")
            .build()
            .unwrap();

        let (allowed, results) = limiter.allow("tenant", None).await.unwrap();
        assert!(allowed);
        assert!(results.iter().any(|(name, _)| name == "primary_u"));
    }

    #[tokio::test]
    async fn missing_backend_fails_at_build() {
        let result = RateLimiterBuilder::<MemoryBackend>::new()
            .with_primary_strategy(TokenBucketConfig::new(5, 1.0).unwrap())
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reset_clears_state() {
        let limiter = RateLimiter::builder()
            .with_backend(MemoryBackend::new())
            .with_primary_strategy(TokenBucketConfig::new(1, 1.0).unwrap())
            .build()
            .unwrap();

        limiter.allow("k", None).await.unwrap();
        let (allowed, _) = limiter.allow("k", None).await.unwrap();
        assert!(!allowed);

        limiter.reset("k").await.unwrap();
        let (allowed, _) = limiter.allow("k", None).await.unwrap();
        assert!(allowed);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let limiter = RateLimiter::builder()
            .with_backend(MemoryBackend::new())
            .with_primary_strategy(TokenBucketConfig::new(1, 1.0).unwrap())
            .build()
            .unwrap();
        limiter.close().await.unwrap();
        limiter.close().await.unwrap();
    }
}
