//! Conflict handling for optimistic read-modify-write cycles.
//!
//! A [`ContentionPolicy`] bounds how many times the engine re-reads and re-decides after a
//! compare-and-set loses a race, and how long it waits in between. Waiting goes through a
//! [`Sleeper`] so tests can run contention scenarios without real delays.

use crate::{Backoff, Jitter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Abstraction for sleeping between attempts.
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Sleeper that returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantSleeper;

impl Sleeper for InstantSleeper {
    fn sleep(&self, _duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async {})
    }
}

/// Sleeper that records every requested wait and returns immediately.
#[derive(Debug, Clone, Default)]
pub struct TrackingSleeper {
    calls: Arc<Mutex<Vec<Duration>>>,
}

impl TrackingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requested waits, in order.
    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Sleeper for TrackingSleeper {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).push(duration);
        Box::pin(async {})
    }
}

/// Bounded retry schedule for compare-and-set conflicts.
#[derive(Clone, Debug)]
pub struct ContentionPolicy {
    max_attempts: usize,
    backoff: Backoff,
    jitter: Jitter,
    sleeper: Arc<dyn Sleeper>,
}

impl ContentionPolicy {
    /// Default number of read-modify-write cycles per logical operation.
    pub const DEFAULT_MAX_ATTEMPTS: usize = 32;

    /// Start from the defaults: 32 attempts, exponential 1ms..50ms backoff, full jitter.
    pub fn builder() -> ContentionPolicyBuilder {
        ContentionPolicyBuilder::default()
    }

    /// Total read-modify-write cycles allowed (first attempt included).
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Wait before `attempt` (0-indexed). The first attempt never waits.
    pub(crate) async fn pause(&self, attempt: usize) {
        if attempt == 0 {
            return;
        }
        let delay = self.jitter.apply(self.backoff.delay(attempt));
        self.sleeper.sleep(delay).await;
    }
}

impl Default for ContentionPolicy {
    fn default() -> Self {
        ContentionPolicyBuilder::default().build_unchecked()
    }
}

/// Builder for [`ContentionPolicy`].
#[derive(Debug)]
pub struct ContentionPolicyBuilder {
    max_attempts: usize,
    backoff: Backoff,
    jitter: Jitter,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for ContentionPolicyBuilder {
    fn default() -> Self {
        Self {
            max_attempts: ContentionPolicy::DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
            jitter: Jitter::Full,
            sleeper: Arc::new(TokioSleeper),
        }
    }
}

impl ContentionPolicyBuilder {
    /// Total attempts (initial + retries). Must be > 0.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Inject the sleeper used between attempts.
    pub fn sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Build the policy, validating `max_attempts`.
    pub fn build(self) -> Result<ContentionPolicy, crate::ConfigError> {
        if self.max_attempts == 0 {
            return Err(crate::ConfigError::ZeroAttempts);
        }
        Ok(self.build_unchecked())
    }

    fn build_unchecked(self) -> ContentionPolicy {
        ContentionPolicy {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            jitter: self.jitter,
            sleeper: self.sleeper,
        }
    }
}
