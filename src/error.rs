//! Error types for the engine, its configuration, and the service boundary.
//!
//! Store failures never escape [`TokenBucketEngine`](crate::TokenBucketEngine): they are
//! folded into a conservative outcome. The types here exist so that failures can be
//! logged with their cause and so the outer layers can report what went wrong.

use std::error::Error;
use std::time::Duration;

/// Why a single store round-trip did not produce an answer.
#[derive(Debug, thiserror::Error)]
pub enum StoreFailure {
    /// The store returned an error (network, protocol, unparsable value, ...).
    #[error("store operation failed: {0}")]
    Backend(#[source] Box<dyn Error + Send + Sync>),
    /// The store did not answer within the configured deadline.
    ///
    /// For writes this does not mean the write was lost; it may still have been applied.
    #[error("store operation timed out after {0:?}")]
    TimedOut(Duration),
}

impl StoreFailure {
    /// Wrap a store-specific error.
    pub fn backend<E>(err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        StoreFailure::Backend(Box::new(err))
    }

    /// Check if this failure is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreFailure::TimedOut(_))
    }
}

/// Errors produced while building an [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `max_attempts` must allow at least one read-modify-write cycle.
    #[error("max_attempts must be > 0")]
    ZeroAttempts,
    /// The check-path default capacity cannot be negative.
    #[error("check capacity must be >= 0 (got {0})")]
    NegativeCheckCapacity(i64),
    /// A zero store timeout would fail every call.
    #[error("store timeout must be non-zero")]
    ZeroTimeout,
    /// Keys must be namespaced.
    #[error("key prefix cannot be empty")]
    EmptyKeyPrefix,
}

/// Errors returned by [`RateLimiterService`](crate::RateLimiterService) before the engine
/// is consulted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Bucket keys must be non-empty.
    #[error("bucket key cannot be empty")]
    EmptyKey,
}

/// Errors surfaced by [`AdmissionService`](crate::AdmissionService).
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdmissionError<E> {
    /// The bucket did not hold enough tokens for this request.
    #[error("admission denied for '{key}' ({remaining} tokens remaining)")]
    Denied { key: String, remaining: i64 },
    /// The bucket store could not be consulted; the request is refused.
    #[error("admission unavailable for '{key}': bucket store failure")]
    Unavailable { key: String },
    /// The wrapped service failed.
    #[error("{0}")]
    Inner(#[source] E),
}

impl<E> AdmissionError<E> {
    /// Check if this error is an ordinary rate-limit denial.
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }

    /// Check if this error was caused by the bucket store.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Get the inner error if this is an `Inner` variant.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}
