//! Composite failover backend (§4.G): `primary`-with-`secondary` storage
//! behind a three-state circuit breaker, plus a background health checker
//! that can close the breaker without waiting for live traffic.
//!
//! All breaker state lives in plain atomics (§9 "Interior mutability under
//! concurrency") — no mutex guards the hot path, mirroring how
//! [`super::memory::MemoryBackend`] keeps its GC trigger lock-free.

use super::Backend;
use crate::clock::{Clock, SystemClock};
use crate::error::{ConfigError, Result};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const HALF_OPEN: u8 = 2;

/// Tunables for the breaker and its background health checker (§4.G, §6).
#[derive(Debug, Clone)]
pub struct CompositeBackendConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub health_interval: Duration,
    pub health_timeout: Duration,
    pub test_key: String,
}

impl Default for CompositeBackendConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            health_interval: Duration::from_secs(10),
            health_timeout: Duration::from_secs(2),
            test_key: "__health__".to_string(),
        }
    }
}

impl CompositeBackendConfig {
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidQuota("failure_threshold must be > 0".into()).into());
        }
        if self.recovery_timeout.is_zero() {
            return Err(ConfigError::InvalidQuota("recovery_timeout must be > 0".into()).into());
        }
        if !self.health_interval.is_zero() && self.health_timeout >= self.health_interval {
            return Err(ConfigError::InvalidQuota("health_timeout must be < health_interval".into()).into());
        }
        Ok(())
    }
}

struct Breaker {
    state: AtomicU8,
    failure_count: AtomicU32,
    opened_at_nanos: AtomicI64,
    probing: AtomicBool,
}

impl Breaker {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(CLOSED),
            failure_count: AtomicU32::new(0),
            opened_at_nanos: AtomicI64::new(0),
            probing: AtomicBool::new(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Primary,
    Probe,
    Secondary,
}

/// See module documentation.
pub struct CompositeBackend<P, S> {
    primary: Arc<P>,
    secondary: Arc<S>,
    breaker: Arc<Breaker>,
    config: CompositeBackendConfig,
    clock: Arc<dyn Clock>,
    health_shutdown: Arc<Notify>,
    health_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<P: Backend, S: Backend> CompositeBackend<P, S> {
    pub fn new(primary: P, secondary: S, config: CompositeBackendConfig) -> Result<Self> {
        Self::with_clock(primary, secondary, config, Arc::new(SystemClock))
    }

    pub fn with_clock(primary: P, secondary: S, config: CompositeBackendConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            primary: Arc::new(primary),
            secondary: Arc::new(secondary),
            breaker: Arc::new(Breaker::new()),
            config,
            clock,
            health_shutdown: Arc::new(Notify::new()),
            health_handle: std::sync::Mutex::new(None),
        })
    }

    /// Current breaker state, for diagnostics and tests.
    pub fn is_open(&self) -> bool {
        self.breaker.state.load(Ordering::Acquire) == OPEN
    }

    pub fn is_half_open(&self) -> bool {
        self.breaker.state.load(Ordering::Acquire) == HALF_OPEN
    }

    pub fn is_closed(&self) -> bool {
        self.breaker.state.load(Ordering::Acquire) == CLOSED
    }

    /// Starts the periodic health-check task. A non-positive interval is a no-op.
    pub fn start_health_check(&self) {
        if self.config.health_interval.is_zero() {
            return;
        }
        let primary = self.primary.clone();
        let breaker = self.breaker.clone();
        let interval = self.config.health_interval;
        let timeout = self.config.health_timeout;
        let test_key = self.config.test_key.clone();
        let shutdown = self.health_shutdown.clone();
        let clock = self.clock.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let probe = tokio::time::timeout(timeout, primary.get(&test_key)).await;
                        match probe {
                            Ok(Ok(_)) => {
                                debug!("health check succeeded, closing breaker");
                                on_healthy(&breaker, clock.now_nanos());
                            }
                            Ok(Err(err)) => debug!(%err, "health check failed"),
                            Err(_) => debug!("health check timed out"),
                        }
                    }
                    _ = shutdown.notified() => break,
                }
            }
        });
        *self.health_handle.lock().unwrap() = Some(handle);
    }

    /// Stops the health-check task and waits for it to exit.
    pub async fn stop_health_check(&self) {
        self.health_shutdown.notify_waiters();
        let handle = self.health_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn route(&self) -> Route {
        match self.breaker.state.load(Ordering::Acquire) {
            OPEN => {
                let opened_at = self.breaker.opened_at_nanos.load(Ordering::Acquire);
                let elapsed = self.clock.now_nanos() - opened_at;
                if elapsed >= self.config.recovery_timeout.as_nanos() as i64
                    && self
                        .breaker
                        .state
                        .compare_exchange(OPEN, HALF_OPEN, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                {
                    self.breaker.probing.store(true, Ordering::Release);
                    Route::Probe
                } else {
                    Route::Secondary
                }
            }
            HALF_OPEN => {
                if self
                    .breaker
                    .probing
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    Route::Probe
                } else {
                    Route::Secondary
                }
            }
            _ => Route::Primary,
        }
    }

    /// Records a primary-path success. Returns nothing; `HALF_OPEN` closes immediately.
    fn on_success(&self, route: Route) {
        match route {
            Route::Probe => {
                self.breaker.state.store(CLOSED, Ordering::Release);
                self.breaker.failure_count.store(0, Ordering::Release);
                self.breaker.probing.store(false, Ordering::Release);
            }
            Route::Primary => {
                self.breaker.failure_count.store(0, Ordering::Release);
            }
            Route::Secondary => {}
        }
    }

    /// Records a primary-path failure. Returns whether this very call tripped
    /// the breaker open (§4.G "does not trigger fallback within the same call
    /// unless the counter increment causes the breaker to open").
    fn on_failure(&self, route: Route) -> bool {
        match route {
            Route::Probe => {
                self.breaker.state.store(OPEN, Ordering::Release);
                self.breaker.opened_at_nanos.store(self.clock.now_nanos(), Ordering::Release);
                self.breaker.probing.store(false, Ordering::Release);
                false
            }
            Route::Primary => {
                let count = self.breaker.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                if count >= self.config.failure_threshold
                    && self
                        .breaker
                        .state
                        .compare_exchange(CLOSED, OPEN, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                {
                    self.breaker.opened_at_nanos.store(self.clock.now_nanos(), Ordering::Release);
                    warn!(failures = count, "circuit breaker opened");
                    return true;
                }
                false
            }
            Route::Secondary => false,
        }
    }
}

fn on_healthy(breaker: &Breaker, now_nanos: i64) {
    breaker.state.store(CLOSED, Ordering::Release);
    breaker.failure_count.store(0, Ordering::Release);
    breaker.probing.store(false, Ordering::Release);
    breaker.opened_at_nanos.store(now_nanos, Ordering::Release);
}

impl<P, S> Drop for CompositeBackend<P, S> {
    fn drop(&mut self) {
        self.health_shutdown.notify_waiters();
    }
}

/// Runs `op` against `primary` under breaker routing, falling back to
/// `fallback` when the breaker says so or when this call just tripped it open.
macro_rules! routed_call {
    ($self:ident, $op:expr, $fallback:expr) => {{
        match $self.route() {
            Route::Secondary => $fallback.await,
            route => match $op.await {
                Ok(value) => {
                    $self.on_success(route);
                    Ok(value)
                }
                Err(err) => {
                    if $self.on_failure(route) {
                        $fallback.await
                    } else {
                        Err(err)
                    }
                }
            },
        }
    }};
}

impl<P: Backend, S: Backend> Backend for CompositeBackend<P, S> {
    async fn get(&self, key: &str) -> Result<String> {
        routed_call!(self, self.primary.get(key), self.secondary.get(key))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        routed_call!(
            self,
            self.primary.set(key, value.clone(), ttl),
            self.secondary.set(key, value.clone(), ttl)
        )
    }

    async fn check_and_set(&self, key: &str, expected: &str, new: String, ttl: Duration) -> Result<bool> {
        routed_call!(
            self,
            self.primary.check_and_set(key, expected, new.clone(), ttl),
            self.secondary.check_and_set(key, expected, new.clone(), ttl)
        )
    }

    async fn delete(&self, key: &str) -> Result<()> {
        routed_call!(self, self.primary.delete(key), self.secondary.delete(key))
    }

    async fn close(&self) -> Result<()> {
        self.stop_health_check().await;
        self.primary.close().await?;
        self.secondary.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::clock::FakeClock;
    use crate::error::{BackendError, RateLimitError};

    struct AlwaysFails;
    impl Backend for AlwaysFails {
        async fn get(&self, _key: &str) -> Result<String> {
            Err(RateLimitError::Backend(BackendError::ConnectionFailed("down".into())))
        }
        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
            Err(RateLimitError::Backend(BackendError::ConnectionFailed("down".into())))
        }
        async fn check_and_set(&self, _key: &str, _expected: &str, _new: String, _ttl: Duration) -> Result<bool> {
            Err(RateLimitError::Backend(BackendError::ConnectionFailed("down".into())))
        }
        async fn delete(&self, _key: &str) -> Result<()> {
            Err(RateLimitError::Backend(BackendError::ConnectionFailed("down".into())))
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn config() -> CompositeBackendConfig {
        CompositeBackendConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_secs(30),
            health_interval: Duration::ZERO,
            health_timeout: Duration::from_secs(1),
            test_key: "probe".into(),
        }
    }

    #[tokio::test]
    async fn opens_after_failure_threshold_then_falls_back() {
        let clock = FakeClock::new(0);
        let backend =
            CompositeBackend::with_clock(AlwaysFails, MemoryBackend::new(), config(), Arc::new(clock.clone()))
                .unwrap();

        assert!(backend.set("k", "v".into(), Duration::from_secs(1)).await.is_err());
        assert!(backend.is_closed());

        backend.set("k", "v".into(), Duration::from_secs(1)).await.unwrap();
        assert!(backend.is_open());
    }

    #[tokio::test]
    async fn half_open_probe_succeeds_and_closes() {
        let clock = FakeClock::new(0);
        let backend =
            CompositeBackend::with_clock(MemoryBackend::new(), MemoryBackend::new(), config(), Arc::new(clock.clone()))
                .unwrap();

        backend.breaker.state.store(OPEN, Ordering::Release);
        backend.breaker.opened_at_nanos.store(0, Ordering::Release);
        assert!(backend.is_open());

        clock.advance(Duration::from_secs(31));
        backend.get("k").await.unwrap();
        assert!(backend.is_closed());
    }

    #[test]
    fn validate_rejects_bad_health_timeout() {
        let config = CompositeBackendConfig {
            health_interval: Duration::from_secs(1),
            health_timeout: Duration::from_secs(1),
            ..CompositeBackendConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
