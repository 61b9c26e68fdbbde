//! Live view of one benchmark.
//!
//! A background task re-runs reconciliation on a timer, on push events for
//! the watched benchmark, and on explicit refresh requests. It stops when the
//! handle is cancelled or dropped, and once the benchmark is complete.

use crate::context::{ReconcileContext, Refreshed};
use crate::events::PushEvent;
use crate::reconcile::ReconciledBenchmarkView;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub enum WatchState {
    Loading,
    Ready(Arc<ReconciledBenchmarkView>),
    /// The latest refresh failed; `view` is the last good one.
    Stale {
        view: Arc<ReconciledBenchmarkView>,
        error: String,
    },
    /// Nothing could be fetched and nothing is cached.
    ConnectionFailed(String),
}

impl WatchState {
    pub fn view(&self) -> Option<&Arc<ReconciledBenchmarkView>> {
        match self {
            WatchState::Ready(v) | WatchState::Stale { view: v, .. } => Some(v),
            WatchState::Loading | WatchState::ConnectionFailed(_) => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, WatchState::Ready(v) if v.is_complete())
    }

    /// Identity used to suppress republishing an unchanged state.
    fn key(&self) -> String {
        match self {
            WatchState::Loading => "loading".into(),
            WatchState::Ready(v) => format!("ready:{}", v.fingerprint()),
            WatchState::Stale { view, .. } => format!("stale:{}", view.fingerprint()),
            WatchState::ConnectionFailed(e) => format!("failed:{}", e),
        }
    }
}

/// Handle bound to the lifetime of "viewing this benchmark". Dropping it
/// stops the background task.
pub struct WatchHandle {
    benchmark_id: i64,
    cancel: CancellationToken,
    refresh: Arc<Notify>,
    state: watch::Receiver<WatchState>,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub fn benchmark_id(&self) -> i64 {
        self.benchmark_id
    }

    pub fn subscribe(&self) -> watch::Receiver<WatchState> {
        self.state.clone()
    }

    pub fn current(&self) -> WatchState {
        self.state.borrow().clone()
    }

    /// Requests an immediate recomputation.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Waits for the background task to stop.
    pub async fn finished(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(event = "benchlens.watch.task_failed", error = %e);
            }
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Wake {
    Cancelled,
    Tick,
    Refresh,
    Event(PushEvent),
    Lagged(u64),
    EventsClosed,
}

/// Starts watching `benchmark_id`. The first recomputation happens right
/// away; later ones every `interval`, on matching push events, and on
/// [`WatchHandle::refresh`].
pub fn watch_benchmark(
    ctx: ReconcileContext,
    benchmark_id: i64,
    interval: Duration,
    events: Option<broadcast::Receiver<PushEvent>>,
) -> WatchHandle {
    let cancel = CancellationToken::new();
    let refresh = Arc::new(Notify::new());
    let (tx, rx) = watch::channel(WatchState::Loading);

    let task = tokio::spawn(run(
        ctx,
        benchmark_id,
        interval,
        events,
        cancel.clone(),
        refresh.clone(),
        tx,
    ));

    WatchHandle {
        benchmark_id,
        cancel,
        refresh,
        state: rx,
        task: Some(task),
    }
}

async fn run(
    ctx: ReconcileContext,
    benchmark_id: i64,
    interval: Duration,
    mut events: Option<broadcast::Receiver<PushEvent>>,
    cancel: CancellationToken,
    refresh: Arc<Notify>,
    tx: watch::Sender<WatchState>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut published = WatchState::Loading.key();

    tracing::debug!(event = "benchlens.watch.start", benchmark_id);

    loop {
        let wake = tokio::select! {
            _ = cancel.cancelled() => Wake::Cancelled,
            _ = ticker.tick() => Wake::Tick,
            _ = refresh.notified() => Wake::Refresh,
            ev = next_event(&mut events) => match ev {
                Ok(ev) => Wake::Event(ev),
                Err(broadcast::error::RecvError::Lagged(n)) => Wake::Lagged(n),
                Err(broadcast::error::RecvError::Closed) => Wake::EventsClosed,
            },
        };

        match wake {
            Wake::Cancelled => break,
            Wake::Event(ev) if ev.benchmark_id() != benchmark_id => continue,
            Wake::EventsClosed => {
                tracing::debug!(event = "benchlens.watch.events_closed", benchmark_id);
                events = None;
                continue;
            }
            Wake::Lagged(n) => {
                tracing::debug!(event = "benchlens.watch.events_lagged", benchmark_id, skipped = n);
            }
            Wake::Tick | Wake::Refresh | Wake::Event(_) => {}
        }

        // An in-flight fetch (including retry backoff) is abandoned on cancel.
        let refreshed = tokio::select! {
            _ = cancel.cancelled() => break,
            r = ctx.refresh(benchmark_id) => r,
        };
        let next = match refreshed {
            Ok(Refreshed::Fresh(view)) => WatchState::Ready(view),
            Ok(Refreshed::Cached { view, error }) => WatchState::Stale {
                view,
                error: error.to_string(),
            },
            Err(e) => WatchState::ConnectionFailed(e.to_string()),
        };

        let complete = next.is_complete();
        let key = next.key();
        if key != published {
            published = key;
            tx.send_replace(next);
        }

        if complete {
            tracing::info!(
                event = "benchlens.watch.complete",
                benchmark_id,
                "benchmark {} is complete, stopping watch",
                benchmark_id
            );
            break;
        }
        if tx.is_closed() {
            break;
        }
    }

    tracing::debug!(event = "benchlens.watch.stop", benchmark_id);
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<PushEvent>>,
) -> Result<PushEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
