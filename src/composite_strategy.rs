//! Composite dual-strategy (§4.E): a hard `primary` quota and a smoothing
//! `secondary` burst shaper, committed atomically under one combined key via
//! one outer CAS. The sub-engines run unmodified against in-memory
//! [`SingleKeyBackend`] adapters seeded from the decoded halves of the
//! combined state, so neither sub-engine needs to know it's part of a pair.

use crate::backend::{Backend, SingleKeyBackend};
use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::codec::CompositeState;
use crate::config::{CompositeConfig, StrategyConfig};
use crate::engine::{all_allowed, GcraEngine, LeakyBucketEngine, LimitResults, TokenBucketEngine};
use crate::engine::FixedWindowEngine;
use crate::error::{RateLimitError, Result};
use crate::retry::{sleep_cancellable, RetryPolicy};
use std::time::Duration;
use tracing::{trace, warn};

const PRIMARY_PREFIX: &str = "primary_";
const SECONDARY_PREFIX: &str = "secondary_";

async fn peek_strategy<B: Backend>(adapter: &B, clock: &dyn Clock, config: &StrategyConfig) -> Result<LimitResults> {
    match config {
        StrategyConfig::FixedWindow(c) => FixedWindowEngine.peek(adapter, clock, "", c).await,
        StrategyConfig::TokenBucket(c) => TokenBucketEngine.peek(adapter, clock, "", c).await,
        StrategyConfig::LeakyBucket(c) => LeakyBucketEngine.peek(adapter, clock, "", c).await,
        StrategyConfig::Gcra(c) => GcraEngine.peek(adapter, clock, "", c).await,
    }
}

async fn allow_strategy<B: Backend>(adapter: &B, clock: &dyn Clock, config: &StrategyConfig) -> Result<LimitResults> {
    match config {
        StrategyConfig::FixedWindow(c) => FixedWindowEngine.allow(adapter, clock, None, "", c).await,
        StrategyConfig::TokenBucket(c) => TokenBucketEngine.allow(adapter, clock, None, "", c).await,
        StrategyConfig::LeakyBucket(c) => LeakyBucketEngine.allow(adapter, clock, None, "", c).await,
        StrategyConfig::Gcra(c) => GcraEngine.allow(adapter, clock, None, "", c).await,
    }
}

fn prefixed(prefix: &str, results: LimitResults) -> LimitResults {
    results.into_iter().map(|(name, result)| (format!("{prefix}{name}"), result)).collect()
}

/// Runs the `Peek` side of the protocol (§4.E steps 1-4): decode, peek both
/// sub-strategies, never writing or consuming.
pub async fn peek<B: Backend>(
    backend: &B,
    clock: &dyn Clock,
    key: &str,
    config: &CompositeConfig,
) -> Result<LimitResults> {
    let composite_key = config.composite_key(key);
    let current = backend.get(&composite_key).await?;
    let state = CompositeState::decode(&current)?;

    let primary_adapter = SingleKeyBackend::seeded(state.primary);
    let primary_results = peek_strategy(&primary_adapter, clock, config.primary()).await?;
    if !all_allowed(&primary_results) {
        return Ok(prefixed(PRIMARY_PREFIX, primary_results));
    }

    let secondary_adapter = SingleKeyBackend::seeded(state.secondary);
    let secondary_results = peek_strategy(&secondary_adapter, clock, config.secondary()).await?;

    let mut merged = prefixed(PRIMARY_PREFIX, primary_results);
    merged.extend(prefixed(SECONDARY_PREFIX, secondary_results));
    Ok(merged)
}

/// Runs the `Allow` side of the protocol (§4.E full 7 steps), retrying the
/// outer CAS on loss with the same adaptive backoff the single-strategy
/// engines use.
pub async fn allow<B: Backend>(
    backend: &B,
    clock: &dyn Clock,
    cancel: Option<&CancelToken>,
    key: &str,
    config: &CompositeConfig,
) -> Result<LimitResults> {
    let composite_key = config.composite_key(key);
    let mut attempt: u32 = 0;

    loop {
        if let Some(cancel) = cancel {
            if cancel.is_cancelled() {
                return Err(RateLimitError::Cancelled);
            }
        }

        let cycle_start = std::time::Instant::now();
        let old = backend.get(&composite_key).await?;
        let state = CompositeState::decode(&old)?;

        let primary_adapter = SingleKeyBackend::seeded(state.primary);
        let primary_peek = peek_strategy(&primary_adapter, clock, config.primary()).await?;
        if !all_allowed(&primary_peek) {
            return Ok(prefixed(PRIMARY_PREFIX, primary_peek));
        }

        let secondary_adapter = SingleKeyBackend::seeded(state.secondary);
        let secondary_peek = peek_strategy(&secondary_adapter, clock, config.secondary()).await?;
        if !all_allowed(&secondary_peek) {
            let mut merged = prefixed(PRIMARY_PREFIX, primary_peek);
            merged.extend(prefixed(SECONDARY_PREFIX, secondary_peek));
            return Ok(merged);
        }

        let primary_results = allow_strategy(&primary_adapter, clock, config.primary()).await?;
        let secondary_results = allow_strategy(&secondary_adapter, clock, config.secondary()).await?;

        let (primary_value, primary_ttl) = primary_adapter.into_parts();
        let (secondary_value, secondary_ttl) = secondary_adapter.into_parts();

        let new = CompositeState {
            primary: primary_value,
            secondary: secondary_value,
        }
        .encode();
        let ttl = primary_ttl.max(secondary_ttl);

        let applied = backend.check_and_set(&composite_key, &old, new, ttl).await?;
        if applied {
            trace!(attempt, "composite cas applied");
            let mut merged = prefixed(PRIMARY_PREFIX, primary_results);
            merged.extend(prefixed(SECONDARY_PREFIX, secondary_results));
            return Ok(merged);
        }

        let cycle = cycle_start.elapsed();
        attempt += 1;
        if attempt >= config.max_retries() {
            warn!(attempts = attempt, key = %composite_key, "composite cas retries exhausted");
            return Err(RateLimitError::ConcurrencyExhausted { attempts: attempt });
        }
        let delay = RetryPolicy::new(config.max_retries()).backoff_for(attempt, cycle);
        sleep_cancellable(delay, cancel).await?;
    }
}

/// Deletes the combined composite state key.
pub async fn reset<B: Backend>(backend: &B, key: &str, config: &CompositeConfig) -> Result<()> {
    backend.delete(&config.composite_key(key)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::clock::FakeClock;
    use crate::config::{FixedWindowConfig, TokenBucketConfig};
    use crate::quota::Quota;

    fn config() -> CompositeConfig {
        let primary = FixedWindowConfig::new(vec![Quota::new("u", 20, Duration::from_secs(30))])
            .unwrap()
            .into();
        let secondary = TokenBucketConfig::new(5, 1.25).unwrap().into();
        CompositeConfig::new("base", primary, secondary).unwrap()
    }

    #[tokio::test]
    async fn secondary_exhausts_before_primary() {
        let backend = MemoryBackend::new();
        let clock = FakeClock::new(0);
        let config = config();

        let mut last = None;
        for _ in 0..6 {
            last = Some(allow(&backend, &clock, None, "tenant", &config).await.unwrap());
        }
        let results = last.unwrap();
        let primary_remaining = results.iter().find(|(n, _)| n == "primary_u").unwrap().1.remaining;
        assert!(!all_allowed(&results));
        // primary only peeked on this call, count still 5 from the first 5 calls.
        assert_eq!(primary_remaining, 15);
    }

    #[tokio::test]
    async fn peek_is_read_only() {
        let backend = MemoryBackend::new();
        let clock = FakeClock::new(0);
        let config = config();

        peek(&backend, &clock, "tenant", &config).await.unwrap();
        let results = allow(&backend, &clock, None, "tenant", &config).await.unwrap();
        let primary_remaining = results.iter().find(|(n, _)| n == "primary_u").unwrap().1.remaining;
        assert_eq!(primary_remaining, 19);
    }

    #[tokio::test]
    async fn reset_clears_combined_key() {
        let backend = MemoryBackend::new();
        let clock = FakeClock::new(0);
        let config = config();

        allow(&backend, &clock, None, "tenant", &config).await.unwrap();
        reset(&backend, "tenant", &config).await.unwrap();
        assert_eq!(backend.get(&config.composite_key("tenant")).await.unwrap(), "");
    }
}
