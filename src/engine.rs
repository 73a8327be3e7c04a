//! Token-bucket engine.
//!
//! Semantics:
//! - Every operation is an optimistic read-modify-write cycle: read the stored count,
//!   decide, then write with [`compare_and_set`](crate::BucketStore::compare_and_set)
//!   against the value the decision was based on (`None` when the bucket was absent).
//! - A lost race restarts the cycle from the read, up to `ContentionPolicy::max_attempts`.
//! - Creating and consuming from a new bucket is one conditional write, so no other caller
//!   can observe an "initialized but not yet consumed" bucket.
//! - Store failures are absorbed into `BackendError` outcomes. Nothing is retried after a
//!   write whose result is unknown.
//!
//! Invariants:
//! - A consuming write is only issued when the observed count covers the cost, so the engine
//!   never writes a negative count.
//! - A refill of an existing bucket never writes more than the call's capacity.
//! - The engine holds no per-bucket state between calls.

use crate::config::EngineConfig;
use crate::error::StoreFailure;
use crate::outcome::{CheckOutcome, RefillOutcome};
use crate::store::BucketStore;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a check decided after reading the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckPlan {
    /// Answer without writing.
    Done(CheckOutcome),
    /// Conditionally write `tokens`, then answer with `outcome`.
    Write { tokens: i64, outcome: CheckOutcome },
}

fn plan_check(stored: Option<i64>, cost: i64, check_capacity: i64) -> CheckPlan {
    match stored {
        // Probes never deduct; an existing bucket is reported as-is.
        Some(tokens) if cost <= 0 => CheckPlan::Done(CheckOutcome::Allowed { remaining: tokens }),
        Some(tokens) if tokens >= cost => CheckPlan::Write {
            tokens: tokens - cost,
            outcome: CheckOutcome::Allowed { remaining: tokens - cost },
        },
        Some(tokens) => CheckPlan::Done(CheckOutcome::Denied { remaining: tokens }),
        // Absent buckets are materialized at the default and the decision is made on that.
        None if cost <= 0 => CheckPlan::Write {
            tokens: check_capacity,
            outcome: CheckOutcome::Allowed { remaining: check_capacity },
        },
        None if check_capacity >= cost => CheckPlan::Write {
            tokens: check_capacity - cost,
            outcome: CheckOutcome::Allowed { remaining: check_capacity - cost },
        },
        None => CheckPlan::Write {
            tokens: check_capacity,
            outcome: CheckOutcome::Denied { remaining: check_capacity },
        },
    }
}

fn plan_refill(
    stored: Option<i64>,
    leak_rate: i64,
    capacity: i64,
    config: &EngineConfig,
) -> (i64, RefillOutcome) {
    match stored {
        Some(current) => {
            let tokens = current.saturating_add(leak_rate).min(capacity);
            (tokens, RefillOutcome::Refilled { tokens })
        }
        None => {
            let tokens = config.defaults().refill_seed.initial_tokens(leak_rate, capacity);
            (tokens, RefillOutcome::Initialized { tokens })
        }
    }
}

/// Check-and-consume / refill over a shared [`BucketStore`].
pub struct TokenBucketEngine<S> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S> Clone for TokenBucketEngine<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), config: self.config.clone() }
    }
}

impl<S> std::fmt::Debug for TokenBucketEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucketEngine")
            .field("store", &"<bucket store>")
            .field("config", &self.config)
            .finish()
    }
}

impl<S> TokenBucketEngine<S>
where
    S: BucketStore + 'static,
{
    /// Create an engine with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Create an engine with an explicit configuration.
    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self { store: Arc::new(store), config }
    }

    /// Configuration this engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Borrow the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Try to deduct `cost` tokens from the bucket for `key`.
    ///
    /// `cost <= 0` is a probe: nothing is deducted, but an absent bucket is still created
    /// at the default capacity.
    pub async fn check_and_consume(&self, key: &str, cost: i64) -> CheckOutcome {
        let bucket = self.config.bucket_key(key);
        let policy = self.config.contention();
        let check_capacity = self.config.defaults().check_capacity;
        let mut last_seen = 0;

        for attempt in 0..policy.max_attempts() {
            policy.pause(attempt).await;

            let stored = match self.read(&bucket).await {
                Ok(stored) => stored,
                Err(error) => {
                    warn!(key = %bucket, cost, %error, "check: failed to read bucket");
                    return CheckOutcome::BackendError { remaining: 0 };
                }
            };
            last_seen = stored.unwrap_or(0);

            let (tokens, outcome) = match plan_check(stored, cost, check_capacity) {
                CheckPlan::Done(outcome) => {
                    debug!(key = %bucket, cost, ?stored, %outcome, "check: decided without write");
                    return outcome;
                }
                CheckPlan::Write { tokens, outcome } => (tokens, outcome),
            };

            match self.swap(&bucket, stored, tokens).await {
                Ok(true) => {
                    debug!(key = %bucket, cost, ?stored, %outcome, "check: committed");
                    return outcome;
                }
                Ok(false) => {
                    debug!(key = %bucket, cost, attempt, "check: bucket changed concurrently, retrying");
                }
                Err(error) => {
                    // The bucket was not drained by this call, as far as the engine knows.
                    let remaining = stored.unwrap_or(0);
                    warn!(key = %bucket, cost, remaining, %error, "check: failed to write bucket");
                    return CheckOutcome::BackendError { remaining };
                }
            }
        }

        warn!(
            key = %bucket,
            cost,
            attempts = policy.max_attempts(),
            "check: gave up after repeated conflicting writes"
        );
        CheckOutcome::BackendError { remaining: last_seen }
    }

    /// Add `leak_rate` tokens to the bucket for `key`, capped at `capacity`.
    ///
    /// Non-positive `leak_rate` or `capacity` makes this a read-only call that never
    /// creates the bucket.
    pub async fn refill(&self, key: &str, leak_rate: i64, capacity: i64) -> RefillOutcome {
        let bucket = self.config.bucket_key(key);

        if leak_rate <= 0 || capacity <= 0 {
            debug!(key = %bucket, leak_rate, capacity, "refill: invalid parameters, treating as no-op");
            return match self.read(&bucket).await {
                Ok(stored) => RefillOutcome::Unchanged { tokens: stored.unwrap_or(0) },
                Err(error) => {
                    warn!(key = %bucket, %error, "refill: failed to read bucket");
                    RefillOutcome::BackendError { tokens: 0 }
                }
            };
        }

        let policy = self.config.contention();
        let mut last_seen = 0;

        for attempt in 0..policy.max_attempts() {
            policy.pause(attempt).await;

            let stored = match self.read(&bucket).await {
                Ok(stored) => stored,
                Err(error) => {
                    warn!(key = %bucket, %error, "refill: failed to read bucket");
                    return RefillOutcome::BackendError { tokens: 0 };
                }
            };
            last_seen = stored.unwrap_or(0);

            let (tokens, outcome) = plan_refill(stored, leak_rate, capacity, &self.config);
            match self.swap(&bucket, stored, tokens).await {
                Ok(true) => {
                    debug!(key = %bucket, leak_rate, capacity, ?stored, %outcome, "refill: committed");
                    return outcome;
                }
                Ok(false) => {
                    debug!(key = %bucket, attempt, "refill: bucket changed concurrently, retrying");
                }
                Err(error) => {
                    let tokens = stored.unwrap_or(0);
                    warn!(key = %bucket, tokens, %error, "refill: failed to write bucket");
                    return RefillOutcome::BackendError { tokens };
                }
            }
        }

        warn!(
            key = %bucket,
            attempts = policy.max_attempts(),
            "refill: gave up after repeated conflicting writes"
        );
        RefillOutcome::BackendError { tokens: last_seen }
    }

    async fn read(&self, bucket: &str) -> Result<Option<i64>, StoreFailure> {
        self.bounded(self.store.get(bucket)).await
    }

    async fn swap(
        &self,
        bucket: &str,
        expected: Option<i64>,
        tokens: i64,
    ) -> Result<bool, StoreFailure> {
        self.bounded(self.store.compare_and_set(bucket, expected, tokens)).await
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T, StoreFailure>
    where
        F: Future<Output = Result<T, S::Error>>,
    {
        match self.config.store_timeout() {
            Some(limit) => match tokio::time::timeout(limit, operation).await {
                Ok(result) => result.map_err(StoreFailure::backend),
                Err(_) => Err(StoreFailure::TimedOut(limit)),
            },
            None => operation.await.map_err(StoreFailure::backend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BucketDefaults, RefillSeed};

    #[test]
    fn plan_probe_on_existing_bucket_does_not_write() {
        assert_eq!(
            plan_check(Some(4), 0, 10),
            CheckPlan::Done(CheckOutcome::Allowed { remaining: 4 })
        );
        assert_eq!(
            plan_check(Some(4), -3, 10),
            CheckPlan::Done(CheckOutcome::Allowed { remaining: 4 })
        );
    }

    #[test]
    fn plan_probe_on_absent_bucket_initializes() {
        assert_eq!(
            plan_check(None, 0, 10),
            CheckPlan::Write { tokens: 10, outcome: CheckOutcome::Allowed { remaining: 10 } }
        );
    }

    #[test]
    fn plan_consumes_exact_balance() {
        assert_eq!(
            plan_check(Some(3), 3, 10),
            CheckPlan::Write { tokens: 0, outcome: CheckOutcome::Allowed { remaining: 0 } }
        );
        assert_eq!(plan_check(Some(2), 3, 10), CheckPlan::Done(CheckOutcome::Denied { remaining: 2 }));
    }

    #[test]
    fn plan_new_bucket_decides_on_default() {
        assert_eq!(
            plan_check(None, 4, 10),
            CheckPlan::Write { tokens: 6, outcome: CheckOutcome::Allowed { remaining: 6 } }
        );
        assert_eq!(
            plan_check(None, 15, 10),
            CheckPlan::Write { tokens: 10, outcome: CheckOutcome::Denied { remaining: 10 } }
        );
    }

    #[test]
    fn plan_refill_caps_and_seeds() {
        let config = EngineConfig::default();
        assert_eq!(plan_refill(Some(8), 5, 10, &config), (10, RefillOutcome::Refilled { tokens: 10 }));
        assert_eq!(plan_refill(Some(2), 5, 10, &config), (7, RefillOutcome::Refilled { tokens: 7 }));
        assert_eq!(plan_refill(None, 15, 10, &config), (15, RefillOutcome::Initialized { tokens: 15 }));
        assert_eq!(
            plan_refill(Some(i64::MAX), 1, 10, &config),
            (10, RefillOutcome::Refilled { tokens: 10 })
        );

        let capped = EngineConfig::builder()
            .defaults(BucketDefaults { refill_seed: RefillSeed::CappedLeakRate, ..Default::default() })
            .build()
            .unwrap();
        assert_eq!(plan_refill(None, 15, 10, &capped), (10, RefillOutcome::Initialized { tokens: 10 }));
    }

    #[tokio::test]
    async fn engine_is_cheap_to_clone_and_shares_store() {
        let engine = TokenBucketEngine::new(crate::InMemoryBucketStore::new());
        let other = engine.clone();
        assert!(engine.check_and_consume("k", 10).await.is_allowed());
        assert_eq!(other.check_and_consume("k", 1).await, CheckOutcome::Denied { remaining: 0 });
    }
}
