//! Token Bucket (§4.C.2).

use super::{reset_at, LimitResult, LimitResults, DEFAULT_QUOTA_NAME};
use crate::backend::Backend;
use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::codec::TokenBucketState;
use crate::config::TokenBucketConfig;
use crate::error::Result;
use crate::retry::{run_cas_loop, CasAttempt, RetryPolicy};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenBucketEngine;

impl TokenBucketEngine {
    pub async fn allow<B: Backend>(
        &self,
        backend: &B,
        clock: &dyn Clock,
        cancel: Option<&CancelToken>,
        key: &str,
        config: &TokenBucketConfig,
    ) -> Result<LimitResults> {
        let policy = RetryPolicy::new(config.max_retries());
        run_cas_loop(backend, key, policy, cancel, |current| {
            let state = if current.is_empty() {
                TokenBucketState {
                    tokens: config.burst() as f64,
                    last_refill_nanos: clock.now_nanos(),
                }
            } else {
                TokenBucketState::decode(current)?
            };
            Ok(step(config, &state, clock.now_nanos(), true))
        })
        .await
    }

    pub async fn peek<B: Backend>(
        &self,
        backend: &B,
        clock: &dyn Clock,
        key: &str,
        config: &TokenBucketConfig,
    ) -> Result<LimitResults> {
        let current = backend.get(key).await?;
        let state = if current.is_empty() {
            TokenBucketState {
                tokens: config.burst() as f64,
                last_refill_nanos: clock.now_nanos(),
            }
        } else {
            TokenBucketState::decode(&current)?
        };
        Ok(step(config, &state, clock.now_nanos(), false).outcome)
    }

    pub async fn reset<B: Backend>(&self, backend: &B, key: &str) -> Result<()> {
        backend.delete(key).await
    }
}

fn step(config: &TokenBucketConfig, state: &TokenBucketState, now: i64, consume: bool) -> CasAttempt<LimitResults> {
    let elapsed_secs = (now - state.last_refill_nanos).max(0) as f64 / 1e9;
    let refilled = (state.tokens + elapsed_secs * config.refill_rate()).min(config.burst() as f64);

    let admit = refilled.floor() >= 1.0;
    let tokens_after = if consume && admit { refilled - 1.0 } else { refilled };

    let reset = if admit {
        reset_at(now)
    } else {
        let wait_secs = (1.0 - tokens_after).max(0.0) / config.refill_rate();
        reset_at(now + (wait_secs * 1e9) as i64)
    };

    let result = LimitResult {
        allowed: admit,
        remaining: tokens_after.floor().max(0.0) as u64,
        reset,
    };

    CasAttempt {
        new_value: TokenBucketState {
            tokens: tokens_after,
            last_refill_nanos: now,
        }
        .encode(),
        ttl: Duration::from_secs_f64((config.burst() as f64 / config.refill_rate()).max(1.0)),
        outcome: vec![(DEFAULT_QUOTA_NAME.to_string(), result)],
    }
}
