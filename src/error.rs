//! Error types for rate limiting operations.
//!
//! Five kinds are surfaced to callers: configuration, backend I/O, parse,
//! concurrency-exhausted, and cancellation. CAS loss itself is not an error
//! kind — it is retried internally by the engines and only becomes
//! `ConcurrencyExhausted` once the retry budget runs out.

use thiserror::Error;

/// Result type for rate limiting operations.
pub type Result<T> = std::result::Result<T, RateLimitError>;

/// Top-level error type returned by engines, the composite strategy, and the facade.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Invalid configuration, detected at construction time.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend I/O failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Stored state could not be decoded.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// CAS contention was not resolved within the retry budget.
    #[error("concurrent access exhausted after {attempts} attempt(s)")]
    ConcurrencyExhausted {
        /// Number of CAS attempts made before giving up.
        attempts: u32,
    },

    /// The caller's cancellation signal fired during an attempt or backoff sleep.
    #[error("operation cancelled")]
    Cancelled,
}

/// Configuration-related errors, all detected eagerly at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A quota or algorithm parameter was invalid (e.g. zero burst, empty name).
    #[error("invalid quota: {0}")]
    InvalidQuota(String),

    /// Two quotas inside one Fixed-Window config share the same requests-per-second rate.
    #[error("duplicate rate ratio in multi-quota config: {0}")]
    DuplicateRate(String),

    /// A composite or registry lookup referenced an algorithm id that is not registered.
    #[error("unknown algorithm id: {0}")]
    UnknownAlgorithm(String),

    /// A composite's primary/secondary configs don't advertise the required capability.
    #[error("incompatible capability: {0}")]
    IncompatibleCapability(String),

    /// A required option (backend, primary strategy, base key) was missing.
    #[error("missing required configuration: {0}")]
    MissingRequired(String),
}

/// Errors returned by a [`crate::backend::Backend`] implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A generic operation failure, with a hint about whether retrying might help.
    #[error("{message}")]
    OperationFailed {
        /// Human-readable description.
        message: String,
        /// Whether a caller might reasonably retry this specific failure.
        retryable: bool,
    },

    /// The backend's connection pool was exhausted.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// The backend could not be reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

impl BackendError {
    pub fn operation_failed(message: impl Into<String>, retryable: bool) -> Self {
        Self::OperationFailed {
            message: message.into(),
            retryable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::OperationFailed { retryable, .. } => *retryable,
            Self::PoolExhausted => true,
            Self::ConnectionFailed(_) => false,
        }
    }
}

/// Errors from decoding a stored state string (§4.A).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The header tag did not match any known state encoding.
    #[error("unknown state tag: {0:?}")]
    UnknownTag(String),

    /// The header tag matched but the remaining fields were malformed.
    #[error("malformed state for tag {tag:?}: {detail}")]
    Malformed {
        /// The tag that was matched before the field layout failed to parse.
        tag: String,
        /// What went wrong.
        detail: String,
    },
}
