//! Single-strategy engines (§4.C): each exposes `allow` / `peek` / `reset`
//! over one backend and one algorithm config, driving the pure
//! state-transition formulas through [`crate::retry::run_cas_loop`].

pub mod fixed_window;
pub mod gcra;
pub mod leaky_bucket;
pub mod token_bucket;

pub use fixed_window::FixedWindowEngine;
pub use gcra::GcraEngine;
pub use leaky_bucket::LeakyBucketEngine;
pub use token_bucket::TokenBucketEngine;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The post-attempt snapshot for one named quota (§3 "Result").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitResult {
    pub allowed: bool,
    pub remaining: u64,
    pub reset: SystemTime,
}

/// A mapping from quota name to its [`LimitResult`], in config declaration
/// order. Single-quota algorithms report one entry named `"default"`.
pub type LimitResults = Vec<(String, LimitResult)>;

pub(crate) const DEFAULT_QUOTA_NAME: &str = "default";

pub(crate) fn reset_at(nanos_since_epoch: i64) -> SystemTime {
    if nanos_since_epoch <= 0 {
        return UNIX_EPOCH;
    }
    UNIX_EPOCH + Duration::from_nanos(nanos_since_epoch as u64)
}

/// "all sub-results allowed" (§4.I) — the facade's single boolean verdict.
pub fn all_allowed(results: &LimitResults) -> bool {
    results.iter().all(|(_, result)| result.allowed)
}
