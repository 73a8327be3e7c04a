use async_trait::async_trait;
use bucketgate::{BucketStore, InMemoryBucketStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
#[error("injected store failure: {0}")]
pub struct InjectedFailure(pub &'static str);

/// In-memory store whose reads and writes can be made to fail or stall on demand.
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    pub inner: InMemoryBucketStore,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    write_delay_ms: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn delay_writes(&self, delay: Duration) {
        self.write_delay_ms.store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn before_write(&self) -> Result<(), InjectedFailure> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(InjectedFailure("write refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl BucketStore for FlakyStore {
    type Error = InjectedFailure;

    async fn get(&self, key: &str) -> Result<Option<i64>, Self::Error> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(InjectedFailure("connection reset"));
        }
        Ok(self.inner.get(key).await.unwrap_or_else(|never| match never {}))
    }

    async fn set(&self, key: &str, tokens: i64) -> Result<(), Self::Error> {
        self.before_write().await?;
        self.inner.set(key, tokens).await.unwrap_or_else(|never| match never {});
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<i64>,
        tokens: i64,
    ) -> Result<bool, Self::Error> {
        self.before_write().await?;
        let applied = self
            .inner
            .compare_and_set(key, expected, tokens)
            .await
            .unwrap_or_else(|never| match never {});
        if applied {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(applied)
    }
}

/// In-memory store that yields to the scheduler around every operation, so concurrent
/// read-modify-write cycles interleave even on a single-threaded runtime.
#[derive(Debug, Clone, Default)]
pub struct InterleavingStore {
    pub inner: InMemoryBucketStore,
    conflicts: Arc<AtomicUsize>,
}

impl InterleavingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conditional writes rejected because the value had changed.
    pub fn conflicts(&self) -> usize {
        self.conflicts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BucketStore for InterleavingStore {
    type Error = std::convert::Infallible;

    async fn get(&self, key: &str) -> Result<Option<i64>, Self::Error> {
        tokio::task::yield_now().await;
        let value = self.inner.get(key).await;
        tokio::task::yield_now().await;
        value
    }

    async fn set(&self, key: &str, tokens: i64) -> Result<(), Self::Error> {
        tokio::task::yield_now().await;
        self.inner.set(key, tokens).await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<i64>,
        tokens: i64,
    ) -> Result<bool, Self::Error> {
        tokio::task::yield_now().await;
        let applied = self.inner.compare_and_set(key, expected, tokens).await?;
        if !applied {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
        }
        Ok(applied)
    }
}

/// Deliberately broken store: its conditional write ignores `expected`. Used to show that
/// the concurrency tests detect lost updates.
#[derive(Debug, Clone, Default)]
pub struct BlindWriteStore {
    pub inner: InterleavingStore,
}

#[async_trait]
impl BucketStore for BlindWriteStore {
    type Error = std::convert::Infallible;

    async fn get(&self, key: &str) -> Result<Option<i64>, Self::Error> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, tokens: i64) -> Result<(), Self::Error> {
        self.inner.set(key, tokens).await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        _expected: Option<i64>,
        tokens: i64,
    ) -> Result<bool, Self::Error> {
        self.inner.set(key, tokens).await?;
        Ok(true)
    }
}
