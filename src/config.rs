//! Engine configuration.
//!
//! Capacity and leak rate are deliberately absent: they are policy supplied with every
//! call and never stored with a bucket. What is configured here is how buckets are
//! addressed, how they come into existence, and how long the engine waits on the store.
//!
//! ```rust
//! use bucketgate::{BucketDefaults, EngineConfig, RefillSeed};
//! use std::time::Duration;
//!
//! let config = EngineConfig::builder()
//!     .key_prefix("ratelimit:")
//!     .defaults(BucketDefaults { check_capacity: 20, refill_seed: RefillSeed::CappedLeakRate })
//!     .store_timeout(Duration::from_millis(200))
//!     .build()
//!     .unwrap();
//! assert_eq!(config.bucket_key("user:1"), "ratelimit:user:1");
//! ```

use crate::store::bucket_key;
use crate::{ConfigError, ContentionPolicy};
use std::time::Duration;

/// Store key prefix for bucket state.
pub const DEFAULT_KEY_PREFIX: &str = "bucket:";

/// Tokens a bucket holds when a check observes it before anything else has.
pub const DEFAULT_CHECK_CAPACITY: i64 = 10;

/// Per-operation deadline for store round-trips.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(1);

/// How a bucket is seeded when `refill` is the first operation to touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefillSeed {
    /// Start with `leak_rate` tokens, not capped by the call's capacity.
    #[default]
    LeakRate,
    /// Start with `min(leak_rate, capacity)` tokens.
    CappedLeakRate,
}

impl RefillSeed {
    pub fn initial_tokens(self, leak_rate: i64, capacity: i64) -> i64 {
        match self {
            RefillSeed::LeakRate => leak_rate,
            RefillSeed::CappedLeakRate => leak_rate.min(capacity),
        }
    }
}

/// Creation policy for buckets that do not exist yet.
///
/// The check path and the refill path create buckets differently. Both behaviours are
/// named here so that the choice is visible instead of depending on which call comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketDefaults {
    /// Starting tokens when `check_and_consume` creates the bucket.
    pub check_capacity: i64,
    /// Starting tokens when `refill` creates the bucket.
    pub refill_seed: RefillSeed,
}

impl Default for BucketDefaults {
    fn default() -> Self {
        Self { check_capacity: DEFAULT_CHECK_CAPACITY, refill_seed: RefillSeed::LeakRate }
    }
}

/// Configuration for [`TokenBucketEngine`](crate::TokenBucketEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    key_prefix: String,
    defaults: BucketDefaults,
    store_timeout: Option<Duration>,
    contention: ContentionPolicy,
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Full store key for a logical bucket key.
    pub fn bucket_key(&self, key: &str) -> String {
        bucket_key(&self.key_prefix, key)
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn defaults(&self) -> BucketDefaults {
        self.defaults
    }

    /// Deadline applied to each store round-trip, if any.
    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout
    }

    pub fn contention(&self) -> &ContentionPolicy {
        &self.contention
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            defaults: BucketDefaults::default(),
            store_timeout: Some(DEFAULT_STORE_TIMEOUT),
            contention: ContentionPolicy::default(),
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    pub fn defaults(mut self, defaults: BucketDefaults) -> Self {
        self.config.defaults = defaults;
        self
    }

    /// Bound every store round-trip by `timeout`.
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.config.store_timeout = Some(timeout);
        self
    }

    /// Wait on the store indefinitely; callers bound the whole call themselves.
    pub fn no_store_timeout(mut self) -> Self {
        self.config.store_timeout = None;
        self
    }

    pub fn contention(mut self, policy: ContentionPolicy) -> Self {
        self.config.contention = policy;
        self
    }

    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let config = self.config;
        if config.key_prefix.is_empty() {
            return Err(ConfigError::EmptyKeyPrefix);
        }
        if config.defaults.check_capacity < 0 {
            return Err(ConfigError::NegativeCheckCapacity(config.defaults.check_capacity));
        }
        if config.store_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(config)
    }
}
