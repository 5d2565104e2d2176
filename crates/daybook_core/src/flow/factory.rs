//! Construction policy for `LazyFlowLoader` instances.
//!
//! # Responsibility
//! - Bind loaders to one runtime, one cancellation scope and one TTL policy.
//! - Keep call sites down to supplying the per-query `ValueLoader`.
//!
//! # Invariants
//! - The factory holds configuration only; loaders never share caches.
//! - Cancelling the scope stops every loader created by this factory.

use crate::flow::lazy_loader::LazyFlowLoader;
use crate::flow::value_loader::{BlockingLoader, LoadFailure, ValueLoader};
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Default time-to-live of a successfully loaded value.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(1);
/// Default per-loader broadcast buffer; slower subscribers skip older states.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

const ANONYMOUS_LOADER_NAME: &str = "anonymous";

/// Cache and fan-out settings applied to every created loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    pub ttl: Duration,
    pub channel_capacity: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl LoaderConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the broadcast buffer size; values below 1 are raised to 1.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

/// Builds loaders that share runtime, scope and config.
#[derive(Clone)]
pub struct LazyFlowLoaderFactory {
    runtime: Handle,
    scope: CancellationToken,
    config: LoaderConfig,
}

impl LazyFlowLoaderFactory {
    /// Creates a factory with a fresh cancellation scope.
    pub fn new(runtime: Handle, config: LoaderConfig) -> Self {
        Self::with_scope(runtime, CancellationToken::new(), config)
    }

    /// Creates a factory bound to a caller-owned scope.
    pub fn with_scope(runtime: Handle, scope: CancellationToken, config: LoaderConfig) -> Self {
        Self {
            runtime,
            scope,
            config,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn scope(&self) -> &CancellationToken {
        &self.scope
    }

    /// Wraps `loader` in a new cached loader.
    pub fn create<T, L>(&self, loader: L) -> LazyFlowLoader<T>
    where
        T: Clone + Send + Sync + 'static,
        L: ValueLoader<T>,
    {
        self.create_named(ANONYMOUS_LOADER_NAME, loader)
    }

    /// Same as `create`, with a name used in log events.
    pub fn create_named<T, L>(&self, name: impl Into<String>, loader: L) -> LazyFlowLoader<T>
    where
        T: Clone + Send + Sync + 'static,
        L: ValueLoader<T>,
    {
        LazyFlowLoader::new(
            name,
            Arc::new(loader),
            &self.config,
            self.runtime.clone(),
            self.scope.clone(),
        )
    }

    /// Wraps a synchronous computation that runs on the blocking pool.
    pub fn create_blocking<T, F>(&self, name: impl Into<String>, compute: F) -> LazyFlowLoader<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Result<T, LoadFailure> + Send + Sync + 'static,
    {
        self.create_named(name, BlockingLoader::new(compute))
    }

    /// Cancels the scope: in-flight loads are abandoned and no loader from
    /// this factory emits again.
    pub fn shutdown(&self) {
        if !self.scope.is_cancelled() {
            info!("event=loader_scope_shutdown module=flow status=ok");
        }
        self.scope.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.scope.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::{LoaderConfig, DEFAULT_CACHE_TTL, DEFAULT_CHANNEL_CAPACITY};
    use std::time::Duration;

    #[test]
    fn default_config_uses_one_second_ttl() {
        let config = LoaderConfig::default();
        assert_eq!(config.ttl, DEFAULT_CACHE_TTL);
        assert_eq!(config.ttl, Duration::from_secs(1));
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn channel_capacity_is_at_least_one() {
        let config = LoaderConfig::default().with_channel_capacity(0);
        assert_eq!(config.channel_capacity, 1);
    }
}
