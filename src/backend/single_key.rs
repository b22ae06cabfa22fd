//! Single-key adapter (§4.F).
//!
//! An in-process `Backend` over exactly one value, used by the composite
//! strategy (§4.E) to run the unmodified single-strategy engines against an
//! in-memory "working copy" of one side of a combined composite state during
//! one outer CAS attempt. Each instance is owned by exactly one in-flight
//! attempt and is never shared across attempts, so contention on its lock
//! never actually happens — the lock exists only so this type still
//! satisfies the same `Backend: Send + Sync` bound every other backend does,
//! rather than carving out a separate non-generic code path for composites.

use super::Backend;
use crate::error::Result;
use parking_lot::Mutex;
use std::time::Duration;

struct State {
    value: String,
    ttl: Duration,
}

/// See module documentation.
pub struct SingleKeyBackend {
    state: Mutex<State>,
}

impl SingleKeyBackend {
    /// Creates an adapter seeded with `value` (the empty string means "no prior state").
    pub fn seeded(value: String) -> Self {
        Self {
            state: Mutex::new(State {
                value,
                ttl: Duration::ZERO,
            }),
        }
    }

    /// Consumes the adapter, returning the last written value and its TTL.
    pub fn into_parts(self) -> (String, Duration) {
        let state = self.state.into_inner();
        (state.value, state.ttl)
    }
}

impl Backend for SingleKeyBackend {
    async fn get(&self, _key: &str) -> Result<String> {
        Ok(self.state.lock().value.clone())
    }

    async fn set(&self, _key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut state = self.state.lock();
        state.value = value;
        state.ttl = ttl;
        Ok(())
    }

    async fn check_and_set(&self, _key: &str, expected: &str, new: String, ttl: Duration) -> Result<bool> {
        let mut state = self.state.lock();
        if state.value == expected {
            state.value = new;
            state.ttl = ttl;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.value.clear();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_seeded_value() {
        let adapter = SingleKeyBackend::seeded("12|1|2".to_string());
        assert_eq!(adapter.get("ignored").await.unwrap(), "12|1|2");
    }

    #[tokio::test]
    async fn check_and_set_compares_against_current() {
        let adapter = SingleKeyBackend::seeded("old".to_string());
        assert!(!adapter
            .check_and_set("k", "wrong", "new".to_string(), Duration::from_secs(1))
            .await
            .unwrap());
        assert!(adapter
            .check_and_set("k", "old", "new".to_string(), Duration::from_secs(1))
            .await
            .unwrap());
        assert_eq!(adapter.get("k").await.unwrap(), "new");
    }

    #[tokio::test]
    async fn delete_clears_value() {
        let adapter = SingleKeyBackend::seeded("something".to_string());
        adapter.delete("k").await.unwrap();
        assert_eq!(adapter.get("k").await.unwrap(), "");
    }

    #[tokio::test]
    async fn into_parts_reports_last_write() {
        let adapter = SingleKeyBackend::seeded(String::new());
        adapter
            .check_and_set("k", "", "12|1|2".to_string(), Duration::from_secs(5))
            .await
            .unwrap();
        let (value, ttl) = adapter.into_parts();
        assert_eq!(value, "12|1|2");
        assert_eq!(ttl, Duration::from_secs(5));
    }
}
