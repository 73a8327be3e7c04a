//! Results of engine operations.
//!
//! The wire contract only carries `(allowed, remaining)` and `current_tokens`, so a denial
//! and a store outage look the same to a remote caller (fail closed). In-process callers
//! get the distinction through these enums.

use std::fmt;

/// Result of [`TokenBucketEngine::check_and_consume`](crate::TokenBucketEngine::check_and_consume).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The request may proceed; `remaining` tokens are left after the deduction.
    Allowed { remaining: i64 },
    /// Not enough tokens; nothing was deducted.
    Denied { remaining: i64 },
    /// The store failed or stayed contended. Nothing is known to have been deducted.
    BackendError { remaining: i64 },
}

impl CheckOutcome {
    /// Helper to check if allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, CheckOutcome::Allowed { .. })
    }

    pub fn is_backend_error(&self) -> bool {
        matches!(self, CheckOutcome::BackendError { .. })
    }

    /// Tokens reported to the caller.
    pub fn remaining(&self) -> i64 {
        match *self {
            CheckOutcome::Allowed { remaining }
            | CheckOutcome::Denied { remaining }
            | CheckOutcome::BackendError { remaining } => remaining,
        }
    }

    /// `(allowed, remaining)` as carried over the wire.
    pub fn into_wire(self) -> (bool, i64) {
        (self.is_allowed(), self.remaining())
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckOutcome::Allowed { remaining } => write!(f, "allowed ({} remaining)", remaining),
            CheckOutcome::Denied { remaining } => write!(f, "denied ({} remaining)", remaining),
            CheckOutcome::BackendError { remaining } => {
                write!(f, "backend error ({} reported)", remaining)
            }
        }
    }
}

/// Result of [`TokenBucketEngine::refill`](crate::TokenBucketEngine::refill).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefillOutcome {
    /// An existing bucket was topped up to `tokens`.
    Refilled { tokens: i64 },
    /// The bucket did not exist and was created with `tokens`.
    Initialized { tokens: i64 },
    /// Non-positive leak rate or capacity: nothing was written.
    Unchanged { tokens: i64 },
    /// The store failed or stayed contended; `tokens` is the last value known to be stored.
    BackendError { tokens: i64 },
}

impl RefillOutcome {
    /// Tokens reported to the caller.
    pub fn tokens(&self) -> i64 {
        match *self {
            RefillOutcome::Refilled { tokens }
            | RefillOutcome::Initialized { tokens }
            | RefillOutcome::Unchanged { tokens }
            | RefillOutcome::BackendError { tokens } => tokens,
        }
    }

    pub fn is_backend_error(&self) -> bool {
        matches!(self, RefillOutcome::BackendError { .. })
    }
}

impl fmt::Display for RefillOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefillOutcome::Refilled { tokens } => write!(f, "refilled to {}", tokens),
            RefillOutcome::Initialized { tokens } => write!(f, "initialized with {}", tokens),
            RefillOutcome::Unchanged { tokens } => write!(f, "unchanged at {}", tokens),
            RefillOutcome::BackendError { tokens } => {
                write!(f, "backend error ({} reported)", tokens)
            }
        }
    }
}
