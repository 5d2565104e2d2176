//! Value-producing capability wrapped by `LazyFlowLoader`.

use async_trait::async_trait;
use std::error::Error;
use std::future::Future;
use std::sync::Arc;

/// Error type a `ValueLoader` may fail with.
pub type LoadFailure = Box<dyn Error + Send + Sync + 'static>;

/// Asynchronous on-demand producer of `T`.
///
/// Implementations may perform network or database I/O. Returned errors and
/// panics are caught by the owning `LazyFlowLoader`.
#[async_trait]
pub trait ValueLoader<T>: Send + Sync + 'static {
    async fn load(&self) -> Result<T, LoadFailure>;
}

#[async_trait]
impl<T, F, Fut> ValueLoader<T> for F
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, LoadFailure>> + Send + 'static,
{
    async fn load(&self) -> Result<T, LoadFailure> {
        (self)().await
    }
}

/// Runs a synchronous computation on the blocking thread pool.
///
/// Used for SQLite-backed queries, which must not block runtime workers.
pub struct BlockingLoader<F> {
    compute: Arc<F>,
}

impl<F> BlockingLoader<F> {
    pub fn new(compute: F) -> Self {
        Self {
            compute: Arc::new(compute),
        }
    }
}

#[async_trait]
impl<T, F> ValueLoader<T> for BlockingLoader<F>
where
    T: Send + 'static,
    F: Fn() -> Result<T, LoadFailure> + Send + Sync + 'static,
{
    async fn load(&self) -> Result<T, LoadFailure> {
        let compute = Arc::clone(&self.compute);
        match tokio::task::spawn_blocking(move || (*compute)()).await {
            Ok(result) => result,
            // Re-raise so the owning loader reports it as a panic.
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BlockingLoader, LoadFailure, ValueLoader};

    #[tokio::test]
    async fn closure_loader_returns_value() {
        let loader = || async { Ok::<_, LoadFailure>(7_u32) };
        assert_eq!(loader.load().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn blocking_loader_propagates_errors() {
        let loader = BlockingLoader::new(|| -> Result<u32, LoadFailure> { Err("offline".into()) });
        let err = loader.load().await.unwrap_err();
        assert_eq!(err.to_string(), "offline");
    }
}
