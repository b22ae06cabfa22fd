//! Fixed Window, multi-quota (§4.C.1).

use super::{reset_at, LimitResult, LimitResults};
use crate::backend::Backend;
use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::codec::{FixedWindowEntry, FixedWindowState};
use crate::config::FixedWindowConfig;
use crate::error::Result;
use crate::retry::{run_cas_loop, CasAttempt, RetryPolicy};
use std::time::Duration;

/// TTL safety multiplier (§9 "TTL skew") so the combined key outlives the longest window.
const TTL_SAFETY_FACTOR: i64 = 2;
const MIN_TTL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default)]
pub struct FixedWindowEngine;

impl FixedWindowEngine {
    pub async fn allow<B: Backend>(
        &self,
        backend: &B,
        clock: &dyn Clock,
        cancel: Option<&CancelToken>,
        key: &str,
        config: &FixedWindowConfig,
    ) -> Result<LimitResults> {
        let policy = RetryPolicy::new(config.max_retries());
        run_cas_loop(backend, key, policy, cancel, |current| {
            let state = FixedWindowState::decode(current)?;
            let now = clock.now_nanos();
            Ok(step(config, &state, now, true))
        })
        .await
    }

    pub async fn peek<B: Backend>(
        &self,
        backend: &B,
        clock: &dyn Clock,
        key: &str,
        config: &FixedWindowConfig,
    ) -> Result<LimitResults> {
        let current = backend.get(key).await?;
        let state = FixedWindowState::decode(&current)?;
        let now = clock.now_nanos();
        Ok(step(config, &state, now, false).outcome)
    }

    pub async fn reset<B: Backend>(&self, backend: &B, key: &str) -> Result<()> {
        backend.delete(key).await
    }
}

/// Normalizes `state` against `now` (rolling over expired windows), decides
/// whether to admit, and — when `consume` and admitted — increments every
/// quota's count. The combined state is always re-encoded and written, even
/// on deny, so rollovers persist (§4.C "lazy window-rollover writes").
fn step(config: &FixedWindowConfig, state: &FixedWindowState, now: i64, consume: bool) -> CasAttempt<LimitResults> {
    let quotas = config.quotas();
    let mut entries: Vec<FixedWindowEntry> = quotas
        .iter()
        .map(|quota| {
            state
                .entries
                .iter()
                .find(|entry| entry.name == quota.name())
                .cloned()
                .unwrap_or_else(|| FixedWindowEntry {
                    name: quota.name().to_string(),
                    count: 0,
                    window_start_nanos: now,
                })
        })
        .collect();

    for (entry, quota) in entries.iter_mut().zip(quotas) {
        let window_nanos = quota.window().as_nanos() as i64;
        if now - entry.window_start_nanos >= window_nanos {
            entry.count = 0;
            entry.window_start_nanos = now;
        }
    }

    let admit = entries.iter().zip(quotas).all(|(entry, quota)| entry.count < quota.limit());

    if consume && admit {
        for entry in entries.iter_mut() {
            entry.count += 1;
        }
    }

    let mut max_reset_nanos = now;
    let mut results = LimitResults::new();
    for (entry, quota) in entries.iter().zip(quotas) {
        let window_nanos = quota.window().as_nanos() as i64;
        let reset_nanos = entry.window_start_nanos + window_nanos;
        max_reset_nanos = max_reset_nanos.max(reset_nanos);
        results.push((
            quota.name().to_string(),
            LimitResult {
                allowed: admit,
                remaining: quota.limit().saturating_sub(entry.count),
                reset: reset_at(reset_nanos),
            },
        ));
    }

    let ttl_nanos = (max_reset_nanos - now).max(0) * TTL_SAFETY_FACTOR;
    let ttl = Duration::from_nanos(ttl_nanos as u64).max(MIN_TTL);

    CasAttempt {
        new_value: FixedWindowState { entries }.encode(),
        ttl,
        outcome: results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::clock::FakeClock;
    use crate::quota::Quota;
    use std::time::Duration as StdDuration;

    fn config() -> FixedWindowConfig {
        FixedWindowConfig::new(vec![Quota::new("u", 5, StdDuration::from_secs(3))]).unwrap()
    }

    #[tokio::test]
    async fn five_allow_then_deny_then_resets_after_window() {
        let backend = MemoryBackend::new();
        let clock = FakeClock::new(0);
        let engine = FixedWindowEngine;
        let config = config();

        for _ in 0..5 {
            let results = engine.allow(&backend, &clock, None, "u", &config).await.unwrap();
            assert!(results[0].1.allowed);
        }
        let results = engine.allow(&backend, &clock, None, "u", &config).await.unwrap();
        assert!(!results[0].1.allowed);
        assert_eq!(results[0].1.remaining, 0);

        clock.advance(StdDuration::from_secs(3));
        let results = engine.allow(&backend, &clock, None, "u", &config).await.unwrap();
        assert!(results[0].1.allowed);
        assert_eq!(results[0].1.remaining, 4);
    }

    #[tokio::test]
    async fn peek_does_not_consume() {
        let backend = MemoryBackend::new();
        let clock = FakeClock::new(0);
        let engine = FixedWindowEngine;
        let config = config();

        let peeked = engine.peek(&backend, &clock, "u", &config).await.unwrap();
        assert!(peeked[0].1.allowed);
        assert_eq!(peeked[0].1.remaining, 5);

        let allowed = engine.allow(&backend, &clock, None, "u", &config).await.unwrap();
        assert_eq!(allowed[0].1.remaining, 4);
    }

    #[tokio::test]
    async fn reset_clears_state() {
        let backend = MemoryBackend::new();
        let clock = FakeClock::new(0);
        let engine = FixedWindowEngine;
        let config = config();

        engine.allow(&backend, &clock, None, "u", &config).await.unwrap();
        engine.reset(&backend, "u").await.unwrap();
        let results = engine.allow(&backend, &clock, None, "u", &config).await.unwrap();
        assert_eq!(results[0].1.remaining, 4);
    }

    #[tokio::test]
    async fn multi_quota_independent_counters() {
        let backend = MemoryBackend::new();
        let clock = FakeClock::new(0);
        let engine = FixedWindowEngine;
        let config = FixedWindowConfig::new(vec![
            Quota::per_minute("minute", 10),
            Quota::per_hour("hour", 100),
            Quota::per_day("day", 1000),
        ])
        .unwrap();

        for _ in 0..10 {
            let results = engine.allow(&backend, &clock, None, "u", &config).await.unwrap();
            assert!(results.iter().all(|(_, r)| r.allowed));
        }
        let results = engine.allow(&backend, &clock, None, "u", &config).await.unwrap();
        assert!(!results.iter().any(|(name, r)| name == "minute" && r.allowed));

        clock.advance(StdDuration::from_secs(60));
        let results = engine.allow(&backend, &clock, None, "u", &config).await.unwrap();
        let minute = results.iter().find(|(name, _)| name == "minute").unwrap();
        assert!(minute.1.allowed);
    }
}
