use async_trait::async_trait;
use benchlens_core::context::ReconcileContext;
use benchlens_core::errors::SourceError;
use benchlens_core::events::PushEvent;
use benchlens_core::model::{
    Benchmark, BenchmarkSummary, PersistedStatus, PromptResult, Run, SyncStatus,
};
use benchlens_core::retry::RetryPolicy;
use benchlens_core::source::memory::MemorySource;
use benchlens_core::source::BenchmarkSource;
use benchlens_core::watch::{watch_benchmark, WatchState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::timeout;

const SLOW: Duration = Duration::from_secs(3600);

fn bench(id: i64, done: bool) -> Benchmark {
    Benchmark {
        id,
        status: PersistedStatus::Running,
        runs: vec![Run {
            model_name: "gpt-x".into(),
            provider: "openai".into(),
            prompts: vec![
                PromptResult {
                    id: Some(1),
                    prompt: "P1".into(),
                    response: Some("ok".into()),
                    ..Default::default()
                },
                PromptResult {
                    id: Some(2),
                    prompt: "P2".into(),
                    response: done.then(|| "ok".to_string()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn ctx(source: Arc<MemorySource>) -> ReconcileContext {
    ReconcileContext::new(source, 8, RetryPolicy::no_retry())
}

async fn wait_until<F>(rx: &mut watch::Receiver<WatchState>, pred: F) -> WatchState
where
    F: FnMut(&WatchState) -> bool,
{
    timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for watch state")
        .expect("watch task stopped early")
        .clone()
}

#[tokio::test]
async fn test_push_completion_stops_watch() {
    let source = Arc::new(MemorySource::with_benchmark(bench(1, false)));
    let (events, rx_events) = broadcast::channel(16);
    let handle = watch_benchmark(ctx(source.clone()), 1, SLOW, Some(rx_events));
    let mut rx = handle.subscribe();

    let first = wait_until(&mut rx, |s| matches!(s, WatchState::Ready(_))).await;
    assert!(!first.is_complete());

    source.put(bench(1, true));
    events.send(PushEvent::Completion { benchmark_id: 1 }).unwrap();

    let last = wait_until(&mut rx, WatchState::is_complete).await;
    assert_eq!(last.view().unwrap().prompts_complete, 2);
    timeout(Duration::from_secs(5), handle.finished())
        .await
        .expect("watch task did not stop after completion");
}

#[tokio::test]
async fn test_events_for_other_benchmarks_are_ignored() {
    let source = Arc::new(MemorySource::with_benchmark(bench(1, false)));
    let (events, rx_events) = broadcast::channel(16);
    let handle = watch_benchmark(ctx(source.clone()), 1, SLOW, Some(rx_events));
    let mut rx = handle.subscribe();
    wait_until(&mut rx, |s| matches!(s, WatchState::Ready(_))).await;
    let fetched = source.fetch_count();

    events
        .send(PushEvent::Progress {
            benchmark_id: 99,
            model_name: Some("gpt-x".into()),
            status: "completed".into(),
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.fetch_count(), fetched);

    handle.refresh();
    timeout(Duration::from_secs(5), async {
        while source.fetch_count() == fetched {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("manual refresh did not fetch");
}

#[tokio::test]
async fn test_connection_failure_then_recovery() {
    let source = Arc::new(MemorySource::with_benchmark(bench(1, false)));
    source.fail_next(1);
    let handle = watch_benchmark(ctx(source.clone()), 1, SLOW, None);
    let mut rx = handle.subscribe();

    wait_until(&mut rx, |s| matches!(s, WatchState::ConnectionFailed(_))).await;

    handle.refresh();
    wait_until(&mut rx, |s| matches!(s, WatchState::Ready(_))).await;

    source.fail_next(1);
    handle.refresh();
    let stale = wait_until(&mut rx, |s| matches!(s, WatchState::Stale { .. })).await;
    assert_eq!(stale.view().unwrap().benchmark_id, 1);
}

#[tokio::test]
async fn test_dropping_handle_stops_task() {
    let source = Arc::new(MemorySource::with_benchmark(bench(1, false)));
    let handle = watch_benchmark(ctx(source.clone()), 1, SLOW, None);
    let mut rx = handle.subscribe();
    wait_until(&mut rx, |s| matches!(s, WatchState::Ready(_))).await;

    drop(handle);
    timeout(Duration::from_secs(5), async {
        while rx.changed().await.is_ok() {}
    })
    .await
    .expect("watch task outlived its handle");
}

/// A backend that accepts requests and never answers them.
struct StalledSource;

#[async_trait]
impl BenchmarkSource for StalledSource {
    async fn get_benchmark_details(&self, _benchmark_id: i64) -> Result<Benchmark, SourceError> {
        std::future::pending().await
    }

    async fn list_benchmarks(&self, _use_cache: bool) -> Result<Vec<BenchmarkSummary>, SourceError> {
        std::future::pending().await
    }

    async fn get_sync_status(&self, _benchmark_id: i64) -> Result<SyncStatus, SourceError> {
        std::future::pending().await
    }

    async fn sync_benchmark(&self, _benchmark_id: i64) -> Result<(), SourceError> {
        std::future::pending().await
    }

    async fn rerun_single_prompt(&self, _prompt_id: i64) -> Result<(), SourceError> {
        std::future::pending().await
    }

    fn source_name(&self) -> &'static str {
        "stalled"
    }
}

#[tokio::test]
async fn test_cancel_interrupts_in_flight_fetch() {
    let ctx = ReconcileContext::new(Arc::new(StalledSource), 8, RetryPolicy::no_retry());
    let handle = watch_benchmark(ctx, 1, SLOW, None);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.current(), WatchState::Loading);

    handle.cancel();
    timeout(Duration::from_secs(2), handle.finished())
        .await
        .expect("watch task kept waiting on a stalled fetch after cancel");
}

#[tokio::test]
async fn test_drop_interrupts_in_flight_fetch() {
    let ctx = ReconcileContext::new(Arc::new(StalledSource), 8, RetryPolicy::no_retry());
    let handle = watch_benchmark(ctx, 1, SLOW, None);
    let mut rx = handle.subscribe();
    tokio::time::sleep(Duration::from_millis(50)).await;

    drop(handle);
    timeout(Duration::from_secs(2), async {
        while rx.changed().await.is_ok() {}
    })
    .await
    .expect("watch task outlived its handle while a fetch was in flight");
}
