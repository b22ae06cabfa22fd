//! Per-algorithm configuration and the `StrategyConfig` tagged union (§9
//! "Polymorphism"): algorithms are capability-tagged records, not classes.
//! Dispatch by id is handled by [`crate::registry`]; this module only owns
//! validation and the shapes themselves.

use crate::capability::Capabilities;
use crate::error::{ConfigError, Result};
use crate::quota::{self, Quota};
use std::time::Duration;

const DEFAULT_MAX_RETRIES: u32 = 100;

/// Config for the Fixed-Window algorithm (§4.C.1): 1..8 named quotas sharing one state key.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedWindowConfig {
    quotas: Vec<Quota>,
    key: Option<String>,
    max_retries: u32,
}

impl FixedWindowConfig {
    pub fn new(quotas: Vec<Quota>) -> Result<Self> {
        quota::validate_quotas(&quotas)?;
        Ok(Self {
            quotas,
            key: None,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    pub fn validate(&self) -> Result<()> {
        quota::validate_quotas(&self.quotas)
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn quotas(&self) -> &[Quota] {
        &self.quotas
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn id(&self) -> &'static str {
        "fixed_window"
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::PRIMARY
    }
}

/// Config for Token Bucket (§4.C.2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucketConfig {
    burst: u64,
    refill_rate: f64,
    max_retries: u32,
}

impl TokenBucketConfig {
    pub fn new(burst: u64, refill_rate: f64) -> Result<Self> {
        let config = Self {
            burst,
            refill_rate,
            max_retries: DEFAULT_MAX_RETRIES,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.burst == 0 {
            return Err(ConfigError::InvalidQuota("token bucket burst must be > 0".into()).into());
        }
        if !(self.refill_rate > 0.0) {
            return Err(ConfigError::InvalidQuota("token bucket refill_rate must be > 0".into()).into());
        }
        Ok(())
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn burst(&self) -> u64 {
        self.burst
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn id(&self) -> &'static str {
        "token_bucket"
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::BOTH
    }
}

/// Config for Leaky Bucket (§4.C.3), the dual of Token Bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeakyBucketConfig {
    capacity: u64,
    leak_rate: f64,
    max_retries: u32,
}

impl LeakyBucketConfig {
    pub fn new(capacity: u64, leak_rate: f64) -> Result<Self> {
        let config = Self {
            capacity,
            leak_rate,
            max_retries: DEFAULT_MAX_RETRIES,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidQuota("leaky bucket capacity must be > 0".into()).into());
        }
        if !(self.leak_rate > 0.0) {
            return Err(ConfigError::InvalidQuota("leaky bucket leak_rate must be > 0".into()).into());
        }
        Ok(())
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn leak_rate(&self) -> f64 {
        self.leak_rate
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn id(&self) -> &'static str {
        "leaky_bucket"
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::BOTH
    }
}

/// Config for GCRA (§4.C.4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcraConfig {
    burst: u64,
    rate: f64,
    max_retries: u32,
}

impl GcraConfig {
    pub fn new(burst: u64, rate: f64) -> Result<Self> {
        let config = Self {
            burst,
            rate,
            max_retries: DEFAULT_MAX_RETRIES,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.burst == 0 {
            return Err(ConfigError::InvalidQuota("gcra burst must be > 0".into()).into());
        }
        if !(self.rate > 0.0) {
            return Err(ConfigError::InvalidQuota("gcra rate must be > 0".into()).into());
        }
        Ok(())
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn burst(&self) -> u64 {
        self.burst
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Spacing between theoretically admitted events.
    pub fn emission_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate)
    }

    /// `burst * emission_interval`: the widest tolerated `TAT - now` gap.
    pub fn limit_window(&self) -> Duration {
        self.emission_interval().mul_f64(self.burst as f64)
    }

    pub fn id(&self) -> &'static str {
        "gcra"
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::BOTH
    }
}

/// A tagged union over the four algorithm configs (§9 "Polymorphism").
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyConfig {
    FixedWindow(FixedWindowConfig),
    TokenBucket(TokenBucketConfig),
    LeakyBucket(LeakyBucketConfig),
    Gcra(GcraConfig),
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::FixedWindow(c) => c.validate(),
            Self::TokenBucket(c) => c.validate(),
            Self::LeakyBucket(c) => c.validate(),
            Self::Gcra(c) => c.validate(),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::FixedWindow(c) => c.id(),
            Self::TokenBucket(c) => c.id(),
            Self::LeakyBucket(c) => c.id(),
            Self::Gcra(c) => c.id(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Self::FixedWindow(c) => c.capabilities(),
            Self::TokenBucket(c) => c.capabilities(),
            Self::LeakyBucket(c) => c.capabilities(),
            Self::Gcra(c) => c.capabilities(),
        }
    }

    pub fn max_retries(&self) -> u32 {
        match self {
            Self::FixedWindow(c) => c.max_retries(),
            Self::TokenBucket(c) => c.max_retries(),
            Self::LeakyBucket(c) => c.max_retries(),
            Self::Gcra(c) => c.max_retries(),
        }
    }
}

impl From<FixedWindowConfig> for StrategyConfig {
    fn from(c: FixedWindowConfig) -> Self {
        Self::FixedWindow(c)
    }
}

impl From<TokenBucketConfig> for StrategyConfig {
    fn from(c: TokenBucketConfig) -> Self {
        Self::TokenBucket(c)
    }
}

impl From<LeakyBucketConfig> for StrategyConfig {
    fn from(c: LeakyBucketConfig) -> Self {
        Self::LeakyBucket(c)
    }
}

impl From<GcraConfig> for StrategyConfig {
    fn from(c: GcraConfig) -> Self {
        Self::Gcra(c)
    }
}

/// Config for the composite dual-strategy (§4.E): a hard `primary` quota paired
/// with a smoothing `secondary` burst shaper, committed under one combined key.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeConfig {
    base_key: String,
    primary: StrategyConfig,
    secondary: StrategyConfig,
    max_retries: u32,
}

impl CompositeConfig {
    /// Validates that `primary` advertises [`Capabilities::PRIMARY`] and `secondary`
    /// advertises [`Capabilities::SECONDARY`] (§9 "Secondary-strategy as primary").
    pub fn new(base_key: impl Into<String>, primary: StrategyConfig, secondary: StrategyConfig) -> Result<Self> {
        let base_key = base_key.into();
        if base_key.is_empty() {
            return Err(ConfigError::MissingRequired("composite base_key must not be empty".into()).into());
        }
        primary.validate()?;
        secondary.validate()?;
        if !primary.capabilities().contains(Capabilities::PRIMARY) {
            return Err(ConfigError::IncompatibleCapability(format!(
                "{:?} cannot act as a composite primary",
                primary.id()
            ))
            .into());
        }
        if !secondary.capabilities().contains(Capabilities::SECONDARY) {
            return Err(ConfigError::IncompatibleCapability(format!(
                "{:?} cannot act as a composite secondary",
                secondary.id()
            ))
            .into());
        }
        Ok(Self {
            base_key,
            primary,
            secondary,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn base_key(&self) -> &str {
        &self.base_key
    }

    pub fn primary(&self) -> &StrategyConfig {
        &self.primary
    }

    pub fn secondary(&self) -> &StrategyConfig {
        &self.secondary
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// The combined-state storage key (§3 invariant 6): `<base_key>:<runtime_key>:c`.
    pub fn composite_key(&self, runtime_key: &str) -> String {
        format!("{}:{}:c", self.base_key, runtime_key)
    }
}
