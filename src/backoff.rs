//! Backoff between compare-and-set attempts.
//!
//! Attempt `0` is the first read-modify-write cycle and never waits. Conflict retries start
//! at `attempt = 1`. Delays saturate at [`MAX_BACKOFF`].
//!
//! ```rust
//! use std::time::Duration;
//! use bucketgate::Backoff;
//!
//! let backoff = Backoff::exponential(Duration::from_millis(1))
//!     .with_max(Duration::from_millis(8))
//!     .unwrap();
//! assert_eq!(backoff.delay(0), Duration::ZERO);
//! assert_eq!(backoff.delay(1), Duration::from_millis(1));
//! assert_eq!(backoff.delay(3), Duration::from_millis(4));
//! assert_eq!(backoff.delay(10), Duration::from_millis(8));
//! ```

use std::fmt;
use std::time::Duration;

/// Upper bound for any computed delay. Contention waits are meant to be short.
pub const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Errors returned by backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffError {
    ConstantDoesNotSupportMax,
    MaxLessThanBase { base: Duration, max: Duration },
}

impl fmt::Display for BackoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffError::ConstantDoesNotSupportMax => {
                write!(f, "with_max is only valid for exponential backoff")
            }
            BackoffError::MaxLessThanBase { base, max } => {
                write!(f, "max ({:?}) must be >= base ({:?})", max, base)
            }
        }
    }
}

impl std::error::Error for BackoffError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackoffKind {
    Constant { delay: Duration },
    Exponential { base: Duration, max: Option<Duration> },
}

/// Delay schedule for conflict retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    kind: BackoffKind,
}

impl Backoff {
    /// Wait the same amount before every retry.
    pub fn constant(delay: Duration) -> Self {
        Self { kind: BackoffKind::Constant { delay } }
    }

    /// Retry immediately. Only sensible with stores that interleave callers on their own.
    pub fn none() -> Self {
        Self::constant(Duration::ZERO)
    }

    /// Double the wait on every retry, starting at `base`.
    pub fn exponential(base: Duration) -> Self {
        Self { kind: BackoffKind::Exponential { base, max: None } }
    }

    /// Cap an exponential schedule.
    pub fn with_max(self, max: Duration) -> Result<Self, BackoffError> {
        match self.kind {
            BackoffKind::Constant { .. } => Err(BackoffError::ConstantDoesNotSupportMax),
            BackoffKind::Exponential { base, .. } if max < base => {
                Err(BackoffError::MaxLessThanBase { base, max })
            }
            BackoffKind::Exponential { base, .. } => {
                Ok(Self { kind: BackoffKind::Exponential { base, max: Some(max) } })
            }
        }
    }

    /// Delay to apply before `attempt`.
    pub fn delay(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let raw = match self.kind {
            BackoffKind::Constant { delay } => delay,
            BackoffKind::Exponential { base, max } => {
                let exponent = attempt.saturating_sub(1).min(u32::MAX as usize) as u32;
                let multiplier = 2u128.saturating_pow(exponent);
                let nanos = base.as_nanos().saturating_mul(multiplier).min(MAX_BACKOFF.as_nanos());
                let delay = Duration::from_nanos(nanos as u64);
                max.map(|m| delay.min(m)).unwrap_or(delay)
            }
        };
        raw.min(MAX_BACKOFF)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            kind: BackoffKind::Exponential {
                base: Duration::from_millis(1),
                max: Some(Duration::from_millis(50)),
            },
        }
    }
}
