//! In-memory reference `Backend` with configurable garbage collection.
//!
//! Ported from the teacher's `MemoryStorage`, generalized from the old
//! `StorageEntry` struct to plain `String` values, and with `check_and_set`
//! rebuilt on DashMap's `Entry` API so the read-compare-write happens while
//! the map's shard lock is held — the teacher's `compare_and_swap` took the
//! lock twice (once for the read, once for the insert), leaving a window
//! where a concurrent writer could interleave between them.

use super::Backend;
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex as SyncMutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::trace;

/// Garbage collection trigger.
#[derive(Debug, Clone)]
pub enum GcInterval {
    /// Run GC every N requests.
    Requests(u64),
    /// Run GC at fixed time intervals via a background task.
    Duration(Duration),
    /// Only run when [`MemoryBackend::run_gc`] is called explicitly.
    Manual,
}

impl Default for GcInterval {
    fn default() -> Self {
        Self::Requests(10_000)
    }
}

/// Garbage collection configuration.
#[derive(Debug, Clone)]
pub struct GcConfig {
    pub interval: GcInterval,
    /// Entries with no write in this long are reclaimed even if not yet TTL-expired.
    pub max_age: Duration,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            interval: GcInterval::default(),
            max_age: Duration::from_secs(3600),
        }
    }
}

impl GcConfig {
    pub fn on_requests(count: u64) -> Self {
        Self {
            interval: GcInterval::Requests(count),
            ..Default::default()
        }
    }

    pub fn on_duration(interval: Duration) -> Self {
        Self {
            interval: GcInterval::Duration(interval),
            ..Default::default()
        }
    }

    pub fn manual() -> Self {
        Self {
            interval: GcInterval::Manual,
            ..Default::default()
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }
}

#[derive(Debug, Clone)]
struct InternalEntry {
    value: String,
    expires_at_nanos: i64,
    last_write_nanos: i64,
}

/// See module documentation.
pub struct MemoryBackend {
    data: DashMap<String, InternalEntry>,
    gc_config: GcConfig,
    clock: Arc<dyn Clock>,
    request_count: AtomicU64,
    gc_lock: SyncMutex<()>,
    shutdown: Arc<Notify>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entries", &self.data.len())
            .field("gc_config", &self.gc_config)
            .finish()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_gc(GcConfig::default())
    }

    pub fn with_gc(gc_config: GcConfig) -> Self {
        Self::with_gc_and_clock(gc_config, Arc::new(SystemClock))
    }

    pub fn with_gc_and_clock(gc_config: GcConfig, clock: Arc<dyn Clock>) -> Self {
        let backend = Self {
            data: DashMap::new(),
            gc_config: gc_config.clone(),
            clock,
            request_count: AtomicU64::new(0),
            gc_lock: SyncMutex::new(()),
            shutdown: Arc::new(Notify::new()),
        };

        if let GcInterval::Duration(interval) = gc_config.interval {
            backend.start_gc_task(interval);
        }

        backend
    }

    fn start_gc_task(&self, interval: Duration) {
        let data = self.data.clone();
        let max_age = self.gc_config.max_age;
        let clock = self.clock.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        run_gc_on_map(&data, max_age, clock.now_nanos());
                    }
                    _ = shutdown.notified() => break,
                }
            }
        });
    }

    pub async fn run_gc(&self) {
        run_gc_on_map(&self.data, self.gc_config.max_age, self.clock.now_nanos());
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&self) {
        self.data.clear();
    }

    fn maybe_run_gc(&self) {
        if let GcInterval::Requests(threshold) = self.gc_config.interval {
            if threshold == 0 {
                return;
            }
            let count = self.request_count.fetch_add(1, Ordering::Relaxed);
            if count % threshold == 0 && count > 0 {
                if let Some(_guard) = self.gc_lock.try_lock() {
                    run_gc_on_map(&self.data, self.gc_config.max_age, self.clock.now_nanos());
                }
            }
        }
    }
}

impl Drop for MemoryBackend {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}

fn run_gc_on_map(data: &DashMap<String, InternalEntry>, max_age: Duration, now_nanos: i64) {
    let cutoff = now_nanos.saturating_sub(max_age.as_nanos() as i64);
    let before = data.len();
    data.retain(|_, entry| entry.expires_at_nanos > now_nanos || entry.last_write_nanos > cutoff);
    trace!(removed = before.saturating_sub(data.len()), "memory backend gc sweep");
}

impl Backend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<String> {
        self.maybe_run_gc();
        let now = self.clock.now_nanos();
        if let Some(entry) = self.data.get(key) {
            if entry.expires_at_nanos > now {
                return Ok(entry.value.clone());
            }
            drop(entry);
            self.data.remove(key);
        }
        Ok(String::new())
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.maybe_run_gc();
        let now = self.clock.now_nanos();
        self.data.insert(
            key.to_string(),
            InternalEntry {
                value,
                expires_at_nanos: now + ttl.as_nanos() as i64,
                last_write_nanos: now,
            },
        );
        Ok(())
    }

    async fn check_and_set(&self, key: &str, expected: &str, new: String, ttl: Duration) -> Result<bool> {
        self.maybe_run_gc();
        let now = self.clock.now_nanos();
        let expires_at_nanos = now + ttl.as_nanos() as i64;

        let applied = match self.data.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current_live = occupied.get().expires_at_nanos > now;
                let current = if current_live { occupied.get().value.as_str() } else { "" };
                if current == expected {
                    occupied.insert(InternalEntry {
                        value: new,
                        expires_at_nanos,
                        last_write_nanos: now,
                    });
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                if expected.is_empty() {
                    vacant.insert(InternalEntry {
                        value: new,
                        expires_at_nanos,
                        last_write_nanos: now,
                    });
                    true
                } else {
                    false
                }
            }
        };
        Ok(applied)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.shutdown.notify_waiters();
        Ok(())
    }
}
