use super::BucketStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};

/// Simple in-memory bucket store.
///
/// Clones share the same map, so a clone handed to several engines behaves like one
/// shared store. Useful for tests and single-process deployments.
#[derive(Default, Clone, Debug)]
pub struct InMemoryBucketStore {
    data: Arc<Mutex<HashMap<String, i64>>>,
}

impl InMemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buckets currently stored.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no bucket has been created yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        // The map holds plain integers; a panic mid-update cannot leave it half-written.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BucketStore for InMemoryBucketStore {
    type Error = Infallible;

    async fn get(&self, key: &str) -> Result<Option<i64>, Self::Error> {
        Ok(self.lock().get(key).copied())
    }

    async fn set(&self, key: &str, tokens: i64) -> Result<(), Self::Error> {
        self.lock().insert(key.to_string(), tokens);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<i64>,
        tokens: i64,
    ) -> Result<bool, Self::Error> {
        let mut guard = self.lock();
        if guard.get(key).copied() != expected {
            return Ok(false); // Race detected
        }
        guard.insert(key.to_string(), tokens);
        Ok(true)
    }
}
