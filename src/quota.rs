//! The [`Quota`] entity (§3): one named `(limit, window)` pair inside a
//! Fixed-Window config. Unlike the single `Quota` the teacher used across
//! every algorithm, each algorithm here has its own config shape (see
//! [`crate::config`]) — `Quota` belongs to Fixed Window alone, since it's the
//! only algorithm that names and combines several simultaneous limits.

use crate::error::{ConfigError, Result};
use std::time::Duration;

/// One named `(limit, window)` rule inside a [`crate::config::FixedWindowConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct Quota {
    name: String,
    limit: u64,
    window: Duration,
}

impl Quota {
    /// # Panics
    /// Panics if `limit` is 0, `window` is zero, or `name` is empty.
    pub fn new(name: impl Into<String>, limit: u64, window: Duration) -> Self {
        Self::try_new(name, limit, window).expect("invalid quota")
    }

    pub fn try_new(name: impl Into<String>, limit: u64, window: Duration) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigError::InvalidQuota("quota name must not be empty".into()).into());
        }
        if limit == 0 {
            return Err(ConfigError::InvalidQuota(format!("quota {name:?}: limit must be > 0")).into());
        }
        if window.is_zero() {
            return Err(ConfigError::InvalidQuota(format!("quota {name:?}: window must be non-zero")).into());
        }
        Ok(Self { name, limit, window })
    }

    pub fn per_second(name: impl Into<String>, limit: u64) -> Self {
        Self::new(name, limit, Duration::from_secs(1))
    }

    pub fn per_minute(name: impl Into<String>, limit: u64) -> Self {
        Self::new(name, limit, Duration::from_secs(60))
    }

    pub fn per_hour(name: impl Into<String>, limit: u64) -> Self {
        Self::new(name, limit, Duration::from_secs(3600))
    }

    pub fn per_day(name: impl Into<String>, limit: u64) -> Self {
        Self::new(name, limit, Duration::from_secs(86400))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Requests-per-second rate, used to detect duplicate quotas (§3).
    pub fn rate(&self) -> f64 {
        self.limit as f64 / self.window.as_secs_f64()
    }
}

/// `1 ≤ N ≤ 8` quotas, each with a unique requests-per-second rate within `1e-9` tolerance.
pub(crate) fn validate_quotas(quotas: &[Quota]) -> Result<()> {
    const RATE_TOLERANCE: f64 = 1e-9;

    if quotas.is_empty() {
        return Err(ConfigError::InvalidQuota("fixed-window config needs at least one quota".into()).into());
    }
    if quotas.len() > 8 {
        return Err(ConfigError::InvalidQuota(format!(
            "fixed-window config allows at most 8 quotas, got {}",
            quotas.len()
        ))
        .into());
    }
    for (i, a) in quotas.iter().enumerate() {
        for b in &quotas[i + 1..] {
            if (a.rate() - b.rate()).abs() < RATE_TOLERANCE {
                return Err(ConfigError::DuplicateRate(format!(
                    "{:?} and {:?} both have rate {}",
                    a.name(),
                    b.name(),
                    a.rate()
                ))
                .into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        let q = Quota::per_minute("minute", 10);
        assert_eq!(q.limit(), 10);
        assert_eq!(q.window(), Duration::from_secs(60));
        assert_eq!(q.rate(), 10.0 / 60.0);
    }

    #[test]
    fn try_new_rejects_zero_limit() {
        assert!(Quota::try_new("q", 0, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn try_new_rejects_zero_window() {
        assert!(Quota::try_new("q", 1, Duration::ZERO).is_err());
    }

    #[test]
    fn try_new_rejects_empty_name() {
        assert!(Quota::try_new("", 1, Duration::from_secs(1)).is_err());
    }

    #[test]
    #[should_panic(expected = "invalid quota")]
    fn new_panics_on_invalid() {
        Quota::new("q", 0, Duration::from_secs(1));
    }

    #[test]
    fn validate_accepts_distinct_rates() {
        let quotas = vec![
            Quota::per_minute("minute", 10),
            Quota::per_hour("hour", 100),
            Quota::per_day("day", 1000),
        ];
        validate_quotas(&quotas).unwrap();
    }

    #[test]
    fn validate_rejects_duplicate_rate() {
        let quotas = vec![Quota::per_second("a", 10), Quota::per_minute("b", 600)];
        assert!(validate_quotas(&quotas).is_err());
    }

    #[test]
    fn validate_rejects_too_many_quotas() {
        let quotas: Vec<Quota> = (0..9).map(|i| Quota::per_second(format!("q{i}"), i + 1)).collect();
        assert!(validate_quotas(&quotas).is_err());
    }

    #[test]
    fn validate_rejects_empty() {
        assert!(validate_quotas(&[]).is_err());
    }
}
