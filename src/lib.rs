//! Linearizable rate-limiting core.
//!
//! Four algorithms — Fixed Window (multi-quota), Token Bucket, Leaky Bucket,
//! and GCRA — each expressed as compact serialized state plus a pure
//! state-transition function, driven through a compare-and-set retry loop
//! over a pluggable [`Backend`](backend::Backend). A composite dual-strategy
//! combines a hard primary quota with a smoothing secondary burst shaper
//! under one atomic write; a composite backend adds primary/fallback
//! storage behind a circuit breaker and background health checker.
//!
//! # Quick start
//!
//! ```
//! use ratecore::backend::MemoryBackend;
//! use ratecore::config::TokenBucketConfig;
//! use ratecore::facade::RateLimiter;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let limiter = RateLimiter::builder()
//!     .with_backend(MemoryBackend::new())
//!     .with_primary_strategy(TokenBucketConfig::new(10, 5.0).unwrap())
//!     .with_base_key("api")
//!     .build()
//!     .unwrap();
//!
//! let (allowed, _results) = limiter.allow("tenant-1", None).await.unwrap();
//! assert!(allowed);
//! # }
//! ```
//!
//! # Feature flags
//!
//! - `memory` (default): the in-memory reference [`backend::MemoryBackend`].

pub mod backend;
pub mod cancel;
pub mod capability;
pub mod clock;
pub mod codec;
pub mod composite_strategy;
pub mod config;
pub mod engine;
pub mod error;
pub mod facade;
pub mod quota;
pub mod registry;
pub mod retry;

pub use backend::Backend;
pub use clock::Clock;
pub use config::{CompositeConfig, StrategyConfig};
pub use engine::{LimitResult, LimitResults};
pub use error::{RateLimitError, Result};
pub use facade::{RateLimiter, RateLimiterBuilder};
pub use quota::Quota;

/// Convenient re-exports for the common path: build a limiter, call `allow`.
pub mod prelude {
    pub use crate::backend::Backend;
    pub use crate::cancel::CancelToken;
    pub use crate::clock::Clock;
    pub use crate::config::{CompositeConfig, StrategyConfig};
    pub use crate::engine::{LimitResult, LimitResults};
    pub use crate::error::{RateLimitError, Result};
    pub use crate::facade::{RateLimiter, RateLimiterBuilder};
    pub use crate::quota::Quota;

    #[cfg(feature = "memory")]
    pub use crate::backend::MemoryBackend;
}
