//! Retrying source decorator
//!
//! Transient failures (lock contention, I/O hiccups) are retried here, at
//! the source boundary, with a bounded doubling backoff. The navigator
//! itself never retries; it only ever sees the final outcome.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use rn_core::query::{Filter, PageRequest};
use rn_core::row::Row;
use rn_core::source::DataSource;

use crate::DataError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(50),
        }
    }
}

pub struct RetryingSource {
    inner: Arc<dyn DataSource>,
    policy: RetryPolicy,
}

impl RetryingSource {
    pub fn new(inner: Arc<dyn DataSource>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn run<T, F, Fut>(&self, op: &str, mut call: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
        T: Send,
    {
        let mut backoff = self.policy.initial_backoff;
        let mut attempt = 1u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let transient = error
                        .downcast_ref::<DataError>()
                        .map(DataError::is_transient)
                        .unwrap_or(false);
                    if !transient || attempt >= self.policy.max_attempts {
                        return Err(error);
                    }
                    warn!(
                        source = self.inner.source_name(),
                        op, attempt, error = %error, "transient source failure; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl DataSource for RetryingSource {
    async fn count(&self, filter: &Filter) -> anyhow::Result<usize> {
        self.run("count", || self.inner.count(filter)).await
    }

    async fn fetch(&self, request: &PageRequest) -> anyhow::Result<Vec<Row>> {
        self.run("fetch", || self.inner.fetch(request)).await
    }

    fn source_name(&self) -> &str {
        self.inner.source_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then succeeds
    struct FlakySource {
        failures: usize,
        error: fn() -> DataError,
        calls: AtomicUsize,
    }

    impl FlakySource {
        fn new(failures: usize, error: fn() -> DataError) -> Arc<Self> {
            Arc::new(Self {
                failures,
                error,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl DataSource for FlakySource {
        async fn count(&self, _filter: &Filter) -> anyhow::Result<usize> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err((self.error)().into());
            }
            Ok(7)
        }

        async fn fetch(&self, _request: &PageRequest) -> anyhow::Result<Vec<Row>> {
            Ok(Vec::new())
        }

        fn source_name(&self) -> &str {
            "flaky"
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let inner = FlakySource::new(2, || DataError::Sqlite("database is locked".into()));
        let source = RetryingSource::new(inner.clone(), fast_policy());
        assert_eq!(source.count(&Filter::default()).await.unwrap(), 7);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let inner = FlakySource::new(usize::MAX, || DataError::Other("no such table".into()));
        let source = RetryingSource::new(inner.clone(), fast_policy());
        assert!(source.count(&Filter::default()).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let inner = FlakySource::new(usize::MAX, || DataError::Sqlite("database is locked".into()));
        let source = RetryingSource::new(
            inner.clone(),
            RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
            },
        );
        assert!(source.count(&Filter::default()).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }
}
