use daybook_core::{
    LazyFlowLoader, LazyFlowLoaderFactory, LoadFailure, LoaderConfig, LoaderErrorKind,
    ResultContainer, ResultStream, ValueLoader,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

fn factory(ttl_ms: u64) -> LazyFlowLoaderFactory {
    LazyFlowLoaderFactory::new(
        Handle::current(),
        LoaderConfig::default().with_ttl(Duration::from_millis(ttl_ms)),
    )
}

/// Returns `values[n]` on the n-th call, repeating the last value.
fn scripted(values: Vec<&'static str>, calls: Arc<AtomicUsize>) -> impl ValueLoader<String> {
    move || {
        let call = calls.fetch_add(1, Ordering::SeqCst);
        let value = values[call.min(values.len() - 1)].to_string();
        async move { Ok::<_, LoadFailure>(value) }
    }
}

/// Like `scripted`, but each computation takes `delay_ms`.
fn slow(values: Vec<&'static str>, calls: Arc<AtomicUsize>, delay_ms: u64) -> impl ValueLoader<String> {
    move || {
        let call = calls.fetch_add(1, Ordering::SeqCst);
        let value = values[call.min(values.len() - 1)].to_string();
        async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok::<_, LoadFailure>(value)
        }
    }
}

fn done(value: &str) -> Option<ResultContainer<String>> {
    Some(ResultContainer::Done(value.to_string()))
}

async fn assert_silent(stream: &mut ResultStream<String>) {
    let next = tokio::time::timeout(Duration::from_secs(5), stream.next()).await;
    assert!(next.is_err(), "unexpected emission: {next:?}");
}

#[tokio::test(start_paused = true)]
async fn cached_value_is_served_within_ttl_and_refresh_reloads() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = factory(1_000).create(scripted(vec!["A", "B"], calls.clone()));

    let mut first = loader.observe();
    assert_eq!(first.next().await, Some(ResultContainer::Loading));
    assert_eq!(first.next().await, done("A"));
    drop(first);

    tokio::time::advance(Duration::from_millis(500)).await;
    let mut second = loader.observe();
    assert_eq!(second.next().await, done("A"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    drop(second);

    tokio::time::advance(Duration::from_millis(100)).await;
    loader.refresh();
    let mut third = loader.observe();
    assert_eq!(third.next().await, Some(ResultContainer::Loading));
    assert_eq!(third.next().await, done("B"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn expired_cache_triggers_new_computation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = factory(1_000).create(scripted(vec!["A", "B"], calls.clone()));

    assert_eq!(loader.get().await, ResultContainer::Done("A".to_string()));

    tokio::time::advance(Duration::from_millis(1_001)).await;
    let mut stream = loader.observe();
    assert_eq!(stream.next().await, Some(ResultContainer::Loading));
    assert_eq!(stream.next().await, done("B"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_observers_share_one_computation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = factory(1_000).create(slow(vec!["A"], calls.clone(), 100));

    let mut first = loader.observe();
    let mut second = loader.observe();
    assert_eq!(loader.subscriber_count(), 2);

    assert_eq!(first.next().await, Some(ResultContainer::Loading));
    assert_eq!(second.next().await, Some(ResultContainer::Loading));
    assert_eq!(first.next().await, done("A"));
    assert_eq!(second.next().await, done("A"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn update_emits_done_without_invoking_loader() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = factory(1_000).create(scripted(vec!["A"], calls.clone()));

    let mut stream = loader.observe();
    assert_eq!(stream.next().await, Some(ResultContainer::Loading));
    assert_eq!(stream.next().await, done("A"));

    loader.update("local".to_string());
    assert_eq!(stream.next().await, done("local"));
    assert_eq!(loader.current(), ResultContainer::Done("local".to_string()));

    let mut late = loader.observe();
    assert_eq!(late.next().await, done("local"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn update_before_first_observe_seeds_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = factory(1_000).create(scripted(vec!["A"], calls.clone()));

    loader.update("seed".to_string());
    let mut stream = loader.observe();
    assert_eq!(stream.next().await, done("seed"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn refresh_pushes_loading_and_fresh_value_to_live_subscribers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = factory(60_000).create(scripted(vec!["A", "B"], calls.clone()));

    let mut stream = loader.observe();
    assert_eq!(stream.next().await, Some(ResultContainer::Loading));
    assert_eq!(stream.next().await, done("A"));

    loader.refresh();
    assert_eq!(stream.next().await, Some(ResultContainer::Loading));
    assert_eq!(stream.next().await, done("B"));
    assert_silent(&mut stream).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn refreshes_during_computation_collapse_into_one_rerun() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = factory(1_000).create(slow(vec!["A", "B", "C"], calls.clone(), 100));

    let mut stream = loader.observe();
    assert_eq!(stream.next().await, Some(ResultContainer::Loading));

    loader.refresh();
    loader.refresh();
    loader.refresh();
    assert_eq!(stream.next().await, done("B"));
    assert_silent(&mut stream).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn refresh_after_write_during_computation_publishes_written_value() {
    let source = Arc::new(AtomicUsize::new(1));
    let reader = source.clone();
    let loader: LazyFlowLoader<usize> = factory(60_000).create(move || {
        let value = reader.load(Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, LoadFailure>(value)
        }
    });

    let mut stream = loader.observe();
    assert_eq!(stream.next().await, Some(ResultContainer::Loading));
    // Let the computation read the old value first.
    tokio::time::sleep(Duration::from_millis(10)).await;

    source.store(2, Ordering::SeqCst);
    loader.refresh();

    assert_eq!(stream.next().await, Some(ResultContainer::Done(2)));
    assert_eq!(loader.current(), ResultContainer::Done(2));
    let late: Vec<_> = loader.observe().take(1).collect().await;
    assert_eq!(late, vec![ResultContainer::Done(2)]);
}

#[tokio::test(start_paused = true)]
async fn lagging_subscriber_skips_to_latest_and_stays_open() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = LoaderConfig::default()
        .with_ttl(Duration::from_secs(60))
        .with_channel_capacity(1);
    let loader = LazyFlowLoaderFactory::new(Handle::current(), config)
        .create(scripted(vec!["A"], calls.clone()));

    let mut stream = loader.observe();
    assert_eq!(stream.next().await, Some(ResultContainer::Loading));
    assert_eq!(stream.next().await, done("A"));

    for value in ["u1", "u2", "u3"] {
        loader.update(value.to_string());
    }
    assert_eq!(stream.next().await, done("u3"));

    loader.update("u4".to_string());
    assert_eq!(stream.next().await, done("u4"));
    assert_eq!(loader.subscriber_count(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn update_during_computation_discards_stale_result() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = factory(60_000).create(slow(vec!["A"], calls.clone(), 100));

    let mut stream = loader.observe();
    assert_eq!(stream.next().await, Some(ResultContainer::Loading));

    loader.update("local".to_string());
    assert_eq!(stream.next().await, done("local"));
    assert_silent(&mut stream).await;
    assert_eq!(loader.current(), ResultContainer::Done("local".to_string()));
}

#[tokio::test(start_paused = true)]
async fn loader_error_is_reported_and_next_observe_retries() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let loader: LazyFlowLoader<String> = factory(1_000).create(move || {
        let call = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if call == 0 {
                return Err::<String, LoadFailure>("network down".into());
            }
            Ok("recovered".to_string())
        }
    });

    let mut failing = loader.observe();
    assert_eq!(failing.next().await, Some(ResultContainer::Loading));
    let err = failing.next().await.unwrap();
    let err = err.error().unwrap();
    assert_eq!(err.kind, LoaderErrorKind::Failure);
    assert_eq!(err.message, "network down");
    drop(failing);

    let mut retry = loader.observe();
    assert_eq!(retry.next().await, Some(ResultContainer::Loading));
    assert_eq!(retry.next().await, done("recovered"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn loader_panic_becomes_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let loader: LazyFlowLoader<String> = factory(1_000).create(move || {
        let call = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if call == 0 {
                panic!("loader exploded");
            }
            Ok::<_, LoadFailure>("fine".to_string())
        }
    });

    let result = loader.get().await;
    let err = result.error().unwrap();
    assert_eq!(err.kind, LoaderErrorKind::Panicked);
    assert!(err.message.contains("loader exploded"));

    assert_eq!(loader.get().await, ResultContainer::Done("fine".to_string()));
}

#[tokio::test(start_paused = true)]
async fn shutdown_abandons_in_flight_computation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = factory(1_000);
    let loader = factory.create(slow(vec!["A"], calls.clone(), 100));

    let mut stream = loader.observe();
    assert_eq!(stream.next().await, Some(ResultContainer::Loading));
    // Let the computation start before tearing the scope down.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    factory.shutdown();
    assert!(factory.is_shut_down());
    assert_eq!(stream.next().await, None);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(loader.current(), ResultContainer::Loading);
    assert_eq!(loader.get().await, ResultContainer::Loading);

    loader.update("ignored".to_string());
    loader.refresh();
    let after: Vec<_> = loader.observe().collect().await;
    assert_eq!(after, vec![ResultContainer::Loading]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn blocking_loader_runs_sync_computation() {
    let factory = LazyFlowLoaderFactory::new(Handle::current(), LoaderConfig::default());
    let loader = factory.create_blocking("sum", || Ok::<_, LoadFailure>((1..=4).sum::<u32>()));

    assert_eq!(loader.name(), "sum");
    assert_eq!(loader.get().await, ResultContainer::Done(10));
}

#[tokio::test]
async fn mapped_stream_preserves_states() {
    let factory = LazyFlowLoaderFactory::new(Handle::current(), LoaderConfig::default());
    let loader = factory.create(|| async { Ok::<_, LoadFailure>(vec![1, 2, 3]) });

    let lengths: Vec<_> = loader
        .observe()
        .map(|state| state.map(|items| items.len()))
        .take(2)
        .collect()
        .await;
    assert_eq!(
        lengths,
        vec![ResultContainer::Loading, ResultContainer::Done(3)]
    );
}
