#![allow(dead_code)]

pub mod test_stores;

use bucketgate::{Backoff, ContentionPolicy, EngineConfig, InstantSleeper, Jitter};

/// Engine config for tests: no real sleeping between conflict retries.
pub fn fast_config(max_attempts: usize) -> EngineConfig {
    let contention = ContentionPolicy::builder()
        .max_attempts(max_attempts)
        .backoff(Backoff::none())
        .jitter(Jitter::None)
        .sleeper(InstantSleeper)
        .build()
        .expect("valid contention policy");
    EngineConfig::builder().contention(contention).build().expect("valid engine config")
}
