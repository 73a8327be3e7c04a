//! Bucket storage abstraction.
//!
//! A [`BucketStore`] is a key-value store holding one integer per bucket. It is shared by
//! every process that admits traffic for the same keys, so each call is assumed to be a
//! network round-trip that may fail or stall.
//!
//! The engine never relies on native atomic arithmetic. It only needs
//! [`compare_and_set`](BucketStore::compare_and_set): a conditional write that succeeds
//! when the stored value still equals the value the caller decided on. The store is the
//! place where that comparison is made atomic (a lock in [`InMemoryBucketStore`], a
//! server-side script in the Redis adapter).

use async_trait::async_trait;

pub mod memory;
pub use memory::InMemoryBucketStore;

/// Abstract storage interface for bucket token counts.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the stored token count. `Ok(None)` means the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<i64>, Self::Error>;

    /// Unconditionally overwrite the stored token count.
    async fn set(&self, key: &str, tokens: i64) -> Result<(), Self::Error>;

    /// Write `tokens` only if the stored value still equals `expected`.
    ///
    /// `expected = None` means "the key must not exist". Returns `Ok(true)` if the write
    /// was applied and `Ok(false)` if the stored value changed in the meantime.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<i64>,
        tokens: i64,
    ) -> Result<bool, Self::Error>;
}

#[async_trait]
impl<S> BucketStore for std::sync::Arc<S>
where
    S: BucketStore + ?Sized,
{
    type Error = S::Error;

    async fn get(&self, key: &str) -> Result<Option<i64>, Self::Error> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, tokens: i64) -> Result<(), Self::Error> {
        (**self).set(key, tokens).await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<i64>,
        tokens: i64,
    ) -> Result<bool, Self::Error> {
        (**self).compare_and_set(key, expected, tokens).await
    }
}

/// Build the store key for a logical bucket key.
pub fn bucket_key(prefix: &str, key: &str) -> String {
    let mut full = String::with_capacity(prefix.len() + key.len());
    full.push_str(prefix);
    full.push_str(key);
    full
}
