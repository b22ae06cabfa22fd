//! Adaptive CAS retry policy (§4.D) and the shared retry-loop driver used by
//! every single-strategy engine and the composite strategy.
//!
//! The loop is expressed as a plain state machine — `Fresh`, `Read`, `Eval`,
//! `CasLost`, `GiveUp` — per the design note in §9, rather than open-coded
//! recursion, so cancellation points stay explicit and easy to reason about.

use crate::cancel::CancelToken;
use crate::error::{RateLimitError, Result};
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Suspensions longer than this are cancellable; shorter ones sleep uninterruptibly
/// to avoid scheduling overhead for what amounts to a handful of microseconds.
const CANCELLABLE_THRESHOLD: Duration = Duration::from_millis(500);

const BASE_DELAY: Duration = Duration::from_millis(1);
const MAX_DELAY: Duration = Duration::from_millis(50);

/// How a failed CAS round is turned into the next backoff delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 100 }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Exponential growth from `attempt`, capped so the wait never swamps the
    /// cost of the cycle that just failed, plus a small jitter fraction.
    pub(crate) fn backoff_for(&self, attempt: u32, last_cycle: Duration) -> Duration {
        let exp = BASE_DELAY.saturating_mul(1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX));
        let cap = last_cycle.saturating_mul(8).max(BASE_DELAY).min(MAX_DELAY);
        let base = exp.min(cap);
        base + jittered(base)
    }
}

/// Up to 25% of `base`, added on top of it (never subtracted, so a retry
/// never backs off for less than its computed base delay).
fn jittered(base: Duration) -> Duration {
    base.mul_f64(rand::thread_rng().gen_range(0.0..0.25))
}

pub(crate) async fn sleep_cancellable(delay: Duration, cancel: Option<&CancelToken>) -> Result<()> {
    let Some(cancel) = cancel else {
        tokio::time::sleep(delay).await;
        return Ok(());
    };
    if delay <= CANCELLABLE_THRESHOLD {
        tokio::time::sleep(delay).await;
        if cancel.is_cancelled() {
            return Err(RateLimitError::Cancelled);
        }
        return Ok(());
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = cancel.cancelled() => Err(RateLimitError::Cancelled),
    }
}

/// What one transition attempt produces: the value to try to CAS in, its TTL,
/// and whatever the caller wants returned once the CAS succeeds.
pub struct CasAttempt<T> {
    pub new_value: String,
    pub ttl: Duration,
    pub outcome: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Fresh,
    Read,
    Eval,
    CasLost,
    GiveUp,
}

/// Drives `(Get → decode/evaluate → encode → CheckAndSet)`, retrying on CAS
/// loss with adaptive backoff until `transition` commits or `max_retries` is
/// exhausted. `transition` must be pure given its `&str` input — it is
/// re-invoked from scratch on every retry against the freshly observed value.
pub async fn run_cas_loop<B, T>(
    backend: &B,
    key: &str,
    policy: RetryPolicy,
    cancel: Option<&CancelToken>,
    mut transition: impl FnMut(&str) -> Result<CasAttempt<T>>,
) -> Result<T>
where
    B: crate::backend::Backend,
{
    let mut state = LoopState::Fresh;
    let mut attempt: u32 = 0;

    loop {
        match state {
            LoopState::Fresh => state = LoopState::Read,
            LoopState::Read => {
                if let Some(cancel) = cancel {
                    if cancel.is_cancelled() {
                        return Err(RateLimitError::Cancelled);
                    }
                }
                state = LoopState::Eval;
            }
            LoopState::Eval => {
                let cycle_start = Instant::now();
                let current = backend.get(key).await?;
                let CasAttempt { new_value, ttl, outcome } = transition(&current)?;
                let applied = backend.check_and_set(key, &current, new_value, ttl).await?;
                if applied {
                    trace!(attempt, "cas applied");
                    return Ok(outcome);
                }
                let cycle = cycle_start.elapsed();
                attempt += 1;
                if attempt >= policy.max_retries {
                    state = LoopState::GiveUp;
                } else {
                    state = LoopState::CasLost;
                    let delay = policy.backoff_for(attempt, cycle);
                    sleep_cancellable(delay, cancel).await?;
                }
            }
            LoopState::CasLost => state = LoopState::Read,
            LoopState::GiveUp => {
                warn!(attempts = attempt, key, "cas retries exhausted");
                return Err(RateLimitError::ConcurrencyExhausted { attempts: attempt });
            }
        }
    }
}
