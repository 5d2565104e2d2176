//! Shared, cached, push-based loader over a `ValueLoader`.
//!
//! # Responsibility
//! - Collapse concurrent observers onto a single computation.
//! - Serve the cached value within its TTL without recomputing.
//! - Support direct overwrite (`update`) and manual invalidation (`refresh`).
//!
//! # Invariants
//! - State transitions and broadcast sends happen under one lock, so every
//!   stream sees its initial snapshot followed by all later emissions, with
//!   no gap and no duplicate.
//! - At most one computation is in flight. `refresh()` during a computation
//!   marks it for one follow-up run; its own result is dropped and the
//!   follow-up result is published instead.
//! - A computation whose generation is no longer current never publishes.
//! - Failures do not populate the cache.
//! - After scope cancellation nothing is emitted.

use crate::flow::factory::LoaderConfig;
use crate::flow::result::{LoaderError, LoaderErrorKind, ResultContainer};
use crate::flow::value_loader::{LoadFailure, ValueLoader};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use log::{debug, info, warn};
use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

/// Stream of states emitted by a `LazyFlowLoader`.
pub type ResultStream<T> = BoxStream<'static, ResultContainer<T>>;

const MAX_ERROR_MESSAGE_CHARS: usize = 240;

#[derive(Debug, Clone, Copy)]
enum Phase {
    /// Nothing usable cached: never loaded, failed, or invalidated.
    Stale,
    Loading,
    Cached { expires_at: Instant },
}

struct LoaderState<T> {
    phase: Phase,
    generation: u64,
    /// Set by `refresh()` while loading; the running computation may have
    /// read data older than the refresh.
    rerun_requested: bool,
    latest: ResultContainer<T>,
}

struct Inner<T> {
    name: String,
    state: Mutex<LoaderState<T>>,
    sender: broadcast::Sender<ResultContainer<T>>,
    loader: Arc<dyn ValueLoader<T>>,
    ttl: Duration,
    runtime: Handle,
    scope: CancellationToken,
}

/// Cached observable view over one logical query.
///
/// Cloning yields another handle to the same cache and stream.
pub struct LazyFlowLoader<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for LazyFlowLoader<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> LazyFlowLoader<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        name: impl Into<String>,
        loader: Arc<dyn ValueLoader<T>>,
        config: &LoaderConfig,
        runtime: Handle,
        scope: CancellationToken,
    ) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                state: Mutex::new(LoaderState {
                    phase: Phase::Stale,
                    generation: 0,
                    rerun_requested: false,
                    latest: ResultContainer::Loading,
                }),
                sender,
                loader,
                ttl: config.ttl,
                runtime,
                scope,
            }),
        }
    }

    /// Loader name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Subscribes to this loader.
    ///
    /// The stream yields the current state first. When nothing fresh is
    /// cached this starts a computation, so the first item is `Loading`
    /// followed by the terminal state. The stream ends when the owning scope
    /// is cancelled or every loader handle is dropped.
    pub fn observe(&self) -> ResultStream<T> {
        let inner = &self.inner;
        let mut state = inner.lock_state();

        if inner.scope.is_cancelled() {
            let last = state.latest.clone();
            return stream::once(future::ready(last)).boxed();
        }

        let needs_load = match state.phase {
            Phase::Stale => true,
            Phase::Loading => false,
            Phase::Cached { expires_at } => Instant::now() >= expires_at,
        };
        if needs_load {
            inner.start_load(&mut state, "observe");
        }

        // Subscribe after start_load so its Loading emission is only
        // delivered once, through the snapshot.
        let initial = state.latest.clone();
        let receiver = inner.sender.subscribe();
        drop(state);

        let scope = inner.scope.clone();
        stream::once(future::ready(initial))
            .chain(BroadcastStream::new(receiver).filter_map(|item| future::ready(item.ok())))
            .take_until(async move { scope.cancelled().await })
            .boxed()
    }

    /// Overwrites the cached value and emits `Done(value)` without loading.
    pub fn update(&self, value: T) {
        let inner = &self.inner;
        let mut state = inner.lock_state();
        if inner.scope.is_cancelled() {
            debug!(
                "event=loader_update module=flow status=skipped name={} reason=scope_cancelled",
                inner.name
            );
            return;
        }

        if matches!(state.phase, Phase::Loading) {
            debug!(
                "event=loader_update module=flow status=ok name={} superseded_generation={}",
                inner.name, state.generation
            );
        }
        state.generation += 1;
        state.rerun_requested = false;
        state.phase = Phase::Cached {
            expires_at: Instant::now() + inner.ttl,
        };
        inner.publish(&mut state, ResultContainer::Done(value));
    }

    /// Invalidates the cache.
    ///
    /// With live subscribers a computation starts immediately; otherwise the
    /// next `observe()` recomputes. If a computation is already in flight it
    /// is run once more after it finishes, and only that second result is
    /// published. Any number of refreshes during one computation collapse
    /// into a single rerun.
    pub fn refresh(&self) {
        let inner = &self.inner;
        let mut state = inner.lock_state();
        if inner.scope.is_cancelled() {
            debug!(
                "event=loader_refresh module=flow status=skipped name={} reason=scope_cancelled",
                inner.name
            );
            return;
        }

        let phase = state.phase;
        match phase {
            Phase::Loading => {
                state.rerun_requested = true;
                debug!(
                    "event=loader_refresh module=flow status=rerun_queued name={} generation={}",
                    inner.name, state.generation
                );
            }
            _ if inner.sender.receiver_count() > 0 => inner.start_load(&mut state, "refresh"),
            _ => {
                state.phase = Phase::Stale;
                debug!(
                    "event=loader_refresh module=flow status=invalidated name={}",
                    inner.name
                );
            }
        }
    }

    /// Returns the most recently emitted state.
    pub fn current(&self) -> ResultContainer<T> {
        self.inner.lock_state().latest.clone()
    }

    /// Observes until the first terminal state and returns it.
    ///
    /// Once the scope is shut down no terminal state can arrive; the last
    /// snapshot is returned instead, which may be `Loading`.
    pub async fn get(&self) -> ResultContainer<T> {
        let mut states = self.observe();
        while let Some(item) = states.next().await {
            if item.is_terminal() {
                return item;
            }
        }
        self.current()
    }

    /// Number of live streams returned by `observe()`.
    pub fn subscriber_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }
}

impl<T> Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn lock_state(&self) -> MutexGuard<'_, LoaderState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &mut LoaderState<T>, value: ResultContainer<T>) {
        state.latest = value.clone();
        // No receivers is not an error; the snapshot serves late subscribers.
        let _ = self.sender.send(value);
    }

    fn start_load(self: &Arc<Self>, state: &mut LoaderState<T>, trigger: &'static str) {
        state.phase = Phase::Loading;
        self.publish(state, ResultContainer::Loading);
        self.spawn_load(state, trigger);
    }

    /// Spawns a computation for a fresh generation. The caller has already
    /// put the state in `Loading`.
    fn spawn_load(self: &Arc<Self>, state: &mut LoaderState<T>, trigger: &'static str) {
        state.generation += 1;
        state.rerun_requested = false;
        let generation = state.generation;

        debug!(
            "event=loader_load module=flow status=start name={} generation={} trigger={}",
            self.name, generation, trigger
        );
        let inner = Arc::clone(self);
        self.runtime.spawn(inner.run_load(generation));
    }

    async fn run_load(self: Arc<Self>, generation: u64) {
        if self.scope.is_cancelled() {
            return;
        }
        let started_at = Instant::now();
        let loader = Arc::clone(&self.loader);
        let mut computation = self.runtime.spawn(async move { loader.load().await });

        let joined = tokio::select! {
            _ = self.scope.cancelled() => {
                computation.abort();
                info!(
                    "event=loader_load module=flow status=cancelled name={} generation={}",
                    self.name, generation
                );
                return;
            }
            joined = &mut computation => joined,
        };

        let outcome = load_outcome(joined);

        let duration_ms = started_at.elapsed().as_millis();
        match &outcome {
            Ok(_) => debug!(
                "event=loader_load module=flow status=ok name={} generation={} duration_ms={}",
                self.name, generation, duration_ms
            ),
            Err(err) => warn!(
                "event=loader_load module=flow status=error name={} generation={} duration_ms={} error_kind={}",
                self.name,
                generation,
                duration_ms,
                err.kind.as_str()
            ),
        }

        self.complete(generation, outcome);
    }

    fn complete(self: &Arc<Self>, generation: u64, outcome: Result<T, LoaderError>) {
        let mut state = self.lock_state();
        if self.scope.is_cancelled() {
            return;
        }
        if state.generation != generation {
            debug!(
                "event=loader_load module=flow status=discarded name={} generation={} current_generation={}",
                self.name, generation, state.generation
            );
            return;
        }
        if state.rerun_requested {
            debug!(
                "event=loader_load module=flow status=superseded name={} generation={}",
                self.name, generation
            );
            self.spawn_load(&mut state, "rerun");
            return;
        }

        let next = match outcome {
            Ok(value) => {
                state.phase = Phase::Cached {
                    expires_at: Instant::now() + self.ttl,
                };
                ResultContainer::Done(value)
            }
            Err(err) => {
                state.phase = Phase::Stale;
                ResultContainer::Error(err)
            }
        };
        debug!(
            "event=loader_emit module=flow status=ok name={} state={}",
            self.name,
            next.label()
        );
        self.publish(&mut state, next);
    }
}

fn load_outcome<T>(joined: Result<Result<T, LoadFailure>, JoinError>) -> Result<T, LoaderError> {
    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(LoaderError::new(
            LoaderErrorKind::Failure,
            truncate(&err.to_string()),
        )),
        Err(err) if err.is_panic() => Err(LoaderError::new(
            LoaderErrorKind::Panicked,
            panic_message(err.into_panic()),
        )),
        Err(err) => Err(LoaderError::new(
            LoaderErrorKind::Failure,
            truncate(&err.to_string()),
        )),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };
    truncate(&message)
}

fn truncate(value: &str) -> String {
    let mut truncated = value
        .chars()
        .take(MAX_ERROR_MESSAGE_CHARS)
        .collect::<String>();
    if value.chars().count() > MAX_ERROR_MESSAGE_CHARS {
        truncated.push_str("...");
    }
    truncated
}

#[cfg(test)]
mod tests {
    use super::{load_outcome, panic_message, truncate, MAX_ERROR_MESSAGE_CHARS};
    use crate::flow::result::LoaderErrorKind;
    use crate::flow::value_loader::LoadFailure;

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7_u8)), "non-string panic payload");
    }

    #[test]
    fn truncate_caps_long_messages() {
        let long = "x".repeat(MAX_ERROR_MESSAGE_CHARS + 10);
        let truncated = truncate(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), MAX_ERROR_MESSAGE_CHARS + 3);
    }

    #[test]
    fn load_outcome_truncates_loader_errors() {
        let long: LoadFailure = "y".repeat(MAX_ERROR_MESSAGE_CHARS * 2).into();
        let err = load_outcome::<u8>(Ok(Err(long))).unwrap_err();
        assert_eq!(err.kind, LoaderErrorKind::Failure);
        assert_eq!(err.message.chars().count(), MAX_ERROR_MESSAGE_CHARS + 3);
    }

    #[tokio::test]
    async fn load_outcome_maps_cancelled_task_to_failure() {
        let task = tokio::spawn(std::future::pending::<Result<u8, LoadFailure>>());
        task.abort();
        let joined = task.await;
        assert!(joined.as_ref().is_err_and(|err| err.is_cancelled()));

        let err = load_outcome(joined).unwrap_err();
        assert_eq!(err.kind, LoaderErrorKind::Failure);
        assert!(err.message.contains("cancelled"));
        assert!(err.message.chars().count() <= MAX_ERROR_MESSAGE_CHARS + 3);
    }
}
