//! GCRA — Generic Cell Rate Algorithm (§4.C.4). Tracks a single Theoretical
//! Arrival Time instead of a counter.

use super::{reset_at, LimitResult, LimitResults, DEFAULT_QUOTA_NAME};
use crate::backend::Backend;
use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::codec::GcraState;
use crate::config::GcraConfig;
use crate::error::Result;
use crate::retry::{run_cas_loop, CasAttempt, RetryPolicy};

#[derive(Debug, Clone, Copy, Default)]
pub struct GcraEngine;

impl GcraEngine {
    pub async fn allow<B: Backend>(
        &self,
        backend: &B,
        clock: &dyn Clock,
        cancel: Option<&CancelToken>,
        key: &str,
        config: &GcraConfig,
    ) -> Result<LimitResults> {
        let policy = RetryPolicy::new(config.max_retries());
        run_cas_loop(backend, key, policy, cancel, |current| {
            let now = clock.now_nanos();
            let effective_tat = if current.is_empty() {
                now
            } else {
                GcraState::decode(current)?.tat_nanos
            };
            Ok(step(config, effective_tat, now, true))
        })
        .await
    }

    pub async fn peek<B: Backend>(
        &self,
        backend: &B,
        clock: &dyn Clock,
        key: &str,
        config: &GcraConfig,
    ) -> Result<LimitResults> {
        let current = backend.get(key).await?;
        let now = clock.now_nanos();
        let effective_tat = if current.is_empty() {
            now
        } else {
            GcraState::decode(&current)?.tat_nanos
        };
        Ok(step(config, effective_tat, now, false).outcome)
    }

    pub async fn reset<B: Backend>(&self, backend: &B, key: &str) -> Result<()> {
        backend.delete(key).await
    }
}

fn step(config: &GcraConfig, effective_tat: i64, now: i64, consume: bool) -> CasAttempt<LimitResults> {
    let emission_interval_nanos = config.emission_interval().as_nanos() as i64;
    let limit_window_nanos = config.limit_window().as_nanos() as i64;

    let new_tat = effective_tat.max(now) + emission_interval_nanos;
    let admit = new_tat - now <= limit_window_nanos;
    let tat_after = if consume && admit { new_tat } else { effective_tat };

    let remaining = ((limit_window_nanos - (tat_after - now)).max(0) / emission_interval_nanos) as u64;
    let reset_nanos = if tat_after > now { tat_after } else { now };

    let result = LimitResult {
        allowed: admit,
        remaining,
        reset: reset_at(reset_nanos),
    };

    CasAttempt {
        new_value: GcraState { tat_nanos: tat_after }.encode(),
        ttl: config.limit_window() + config.emission_interval(),
        outcome: vec![(DEFAULT_QUOTA_NAME.to_string(), result)],
    }
}
