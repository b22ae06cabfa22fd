//! Leaky Bucket (§4.C.3) — the dual of Token Bucket: arrivals add to `level`,
//! time drains it.

use super::{reset_at, LimitResult, LimitResults, DEFAULT_QUOTA_NAME};
use crate::backend::Backend;
use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::codec::LeakyBucketState;
use crate::config::LeakyBucketConfig;
use crate::error::Result;
use crate::retry::{run_cas_loop, CasAttempt, RetryPolicy};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct LeakyBucketEngine;

impl LeakyBucketEngine {
    pub async fn allow<B: Backend>(
        &self,
        backend: &B,
        clock: &dyn Clock,
        cancel: Option<&CancelToken>,
        key: &str,
        config: &LeakyBucketConfig,
    ) -> Result<LimitResults> {
        let policy = RetryPolicy::new(config.max_retries());
        run_cas_loop(backend, key, policy, cancel, |current| {
            let state = LeakyBucketState::decode(current)?;
            Ok(step(config, &state, clock.now_nanos(), true))
        })
        .await
    }

    pub async fn peek<B: Backend>(
        &self,
        backend: &B,
        clock: &dyn Clock,
        key: &str,
        config: &LeakyBucketConfig,
    ) -> Result<LimitResults> {
        let current = backend.get(key).await?;
        let state = LeakyBucketState::decode(&current)?;
        Ok(step(config, &state, clock.now_nanos(), false).outcome)
    }

    pub async fn reset<B: Backend>(&self, backend: &B, key: &str) -> Result<()> {
        backend.delete(key).await
    }
}

fn step(config: &LeakyBucketConfig, state: &LeakyBucketState, now: i64, consume: bool) -> CasAttempt<LimitResults> {
    let elapsed_secs = (now - state.last_leak_nanos).max(0) as f64 / 1e9;
    let leaked = (state.level - elapsed_secs * config.leak_rate()).max(0.0);

    let admit = leaked + 1.0 <= config.capacity() as f64;
    let level_after = if consume && admit { leaked + 1.0 } else { leaked };

    let reset = if admit {
        reset_at(now)
    } else {
        let overflow = (leaked + 1.0) - config.capacity() as f64;
        let wait_secs = (overflow.max(0.0)) / config.leak_rate();
        reset_at(now + (wait_secs * 1e9) as i64)
    };

    let result = LimitResult {
        allowed: admit,
        remaining: (config.capacity() as f64 - level_after.ceil()).max(0.0) as u64,
        reset,
    };

    CasAttempt {
        new_value: LeakyBucketState {
            level: level_after,
            last_leak_nanos: now,
        }
        .encode(),
        ttl: Duration::from_secs_f64((config.capacity() as f64 / config.leak_rate()).max(1.0)),
        outcome: vec![(DEFAULT_QUOTA_NAME.to_string(), result)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::clock::FakeClock;

    #[tokio::test]
    async fn fills_then_denies_then_drains() {
        let backend = MemoryBackend::new();
        let clock = FakeClock::new(0);
        let engine = LeakyBucketEngine;
        let config = LeakyBucketConfig::new(5, 1.0).unwrap();

        for _ in 0..5 {
            let results = engine.allow(&backend, &clock, None, "k", &config).await.unwrap();
            assert!(results[0].1.allowed);
        }
        let results = engine.allow(&backend, &clock, None, "k", &config).await.unwrap();
        assert!(!results[0].1.allowed);

        clock.advance(Duration::from_secs(2));
        let results = engine.allow(&backend, &clock, None, "k", &config).await.unwrap();
        assert!(results[0].1.allowed);
    }

    #[tokio::test]
    async fn reset_clears_state() {
        let backend = MemoryBackend::new();
        let clock = FakeClock::new(0);
        let engine = LeakyBucketEngine;
        let config = LeakyBucketConfig::new(2, 1.0).unwrap();

        engine.allow(&backend, &clock, None, "k", &config).await.unwrap();
        engine.allow(&backend, &clock, None, "k", &config).await.unwrap();
        engine.reset(&backend, "k").await.unwrap();
        let results = engine.allow(&backend, &clock, None, "k", &config).await.unwrap();
        assert!(results[0].1.allowed);
    }
}
