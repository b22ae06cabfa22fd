//! Backend contract (§4.B) and implementations.
//!
//! A Backend is a linearizable key/value store over plain `String` values —
//! the encoded states produced by [`crate::codec`] — with four operations:
//! `get`, `set`, `check_and_set`, `delete`, plus lifecycle `close`.
//! `check_and_set` is the only primitive every engine's CAS retry loop relies
//! on; `set` is for unconditional writes such as seeding a health-check probe.

#[cfg(feature = "memory")]
mod memory;
mod single_key;

pub mod composite;

#[cfg(feature = "memory")]
pub use memory::{GcConfig, GcInterval, MemoryBackend};
pub use composite::{CompositeBackend, CompositeBackendConfig};
pub use single_key::SingleKeyBackend;

use crate::error::Result;
use std::future::Future;
use std::time::Duration;

/// A linearizable key/value store of ASCII-encoded rate-limiter state.
pub trait Backend: Send + Sync + 'static {
    /// Returns the value at `key`, or the empty string if absent or expired.
    fn get(&self, key: &str) -> impl Future<Output = Result<String>> + Send;

    /// Unconditionally writes `value` at `key`, expiring after `ttl`.
    fn set(&self, key: &str, value: String, ttl: Duration) -> impl Future<Output = Result<()>> + Send;

    /// Atomically writes `new` at `key` iff the current value equals
    /// `expected` (empty string meaning "must not exist"). Returns whether
    /// the write applied; never partially applies.
    fn check_and_set(
        &self,
        key: &str,
        expected: &str,
        new: String,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Removes `key`. Succeeds even if `key` was already absent.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Releases any resources (connections, background tasks). Idempotent.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    async fn get(&self, key: &str) -> Result<String> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        (**self).set(key, value, ttl).await
    }

    async fn check_and_set(&self, key: &str, expected: &str, new: String, ttl: Duration) -> Result<bool> {
        (**self).check_and_set(key, expected, new, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}
