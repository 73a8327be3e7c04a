use crate::outcome::{CheckOutcome, RefillOutcome};
use std::fmt;
use std::time::Duration;

/// One answered call at the service boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionEvent {
    /// A `CheckLimit` call completed.
    Checked {
        /// Logical bucket key (without the store prefix)
        key: String,
        /// Requested token cost
        cost: i64,
        /// Engine decision
        outcome: CheckOutcome,
        /// Time spent answering
        duration: Duration,
    },
    /// A `RefillBucket` call completed.
    Refilled {
        /// Logical bucket key (without the store prefix)
        key: String,
        /// Tokens requested per refill
        leak_rate: i64,
        /// Cap applied by this refill
        capacity: i64,
        /// Engine result
        outcome: RefillOutcome,
        /// Time spent answering
        duration: Duration,
    },
}

impl AdmissionEvent {
    pub fn key(&self) -> &str {
        match self {
            AdmissionEvent::Checked { key, .. } | AdmissionEvent::Refilled { key, .. } => key,
        }
    }

    /// Whether the call was answered from a store failure rather than bucket state.
    pub fn is_backend_error(&self) -> bool {
        match self {
            AdmissionEvent::Checked { outcome, .. } => outcome.is_backend_error(),
            AdmissionEvent::Refilled { outcome, .. } => outcome.is_backend_error(),
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            AdmissionEvent::Checked { duration, .. } | AdmissionEvent::Refilled { duration, .. } => {
                *duration
            }
        }
    }
}

impl fmt::Display for AdmissionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionEvent::Checked { key, cost, outcome, duration } => {
                write!(f, "Check(key={}, cost={}, {}, took={:?})", key, cost, outcome, duration)
            }
            AdmissionEvent::Refilled { key, leak_rate, capacity, outcome, duration } => write!(
                f,
                "Refill(key={}, leak_rate={}, capacity={}, {}, took={:?})",
                key, leak_rate, capacity, outcome, duration
            ),
        }
    }
}
