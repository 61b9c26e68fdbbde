use crate::cache::ViewCache;
use crate::config::BenchlensConfig;
use crate::errors::SourceError;
use crate::model::SyncStatus;
use crate::reconcile::sync::{select_rerun, select_sync, RerunRequest, SyncPlan};
use crate::reconcile::{reconcile, ReconciledBenchmarkView};
use crate::retry::{with_retry, RetryPolicy};
use crate::source::BenchmarkSource;
use serde::Serialize;
use std::sync::Arc;

/// Everything a reconciliation pass needs, passed explicitly. Cloning is
/// cheap and clones share the same source and cache.
#[derive(Clone)]
pub struct ReconcileContext {
    pub source: Arc<dyn BenchmarkSource>,
    pub cache: ViewCache,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
pub enum Refreshed {
    Fresh(Arc<ReconciledBenchmarkView>),
    /// The fetch failed; this is the last good view.
    Cached {
        view: Arc<ReconciledBenchmarkView>,
        error: SourceError,
    },
}

impl Refreshed {
    pub fn view(&self) -> &Arc<ReconciledBenchmarkView> {
        match self {
            Refreshed::Fresh(v) | Refreshed::Cached { view: v, .. } => v,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Refreshed::Cached { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub plan: SyncPlan,
    pub issued: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusReport {
    pub backend: SyncStatus,
    pub local: SyncStatus,
    pub agrees: bool,
}

impl ReconcileContext {
    pub fn new(source: Arc<dyn BenchmarkSource>, cache_entries: u64, retry: RetryPolicy) -> Self {
        Self {
            source,
            cache: ViewCache::new(cache_entries),
            retry,
        }
    }

    pub fn from_config(source: Arc<dyn BenchmarkSource>, cfg: &BenchlensConfig) -> Self {
        Self::new(source, cfg.cache_entries, cfg.retry.policy())
    }

    /// Fetches, reconciles and caches a benchmark. When the fetch fails the
    /// last cached view is returned instead; the error only surfaces when
    /// nothing is cached.
    pub async fn refresh(&self, benchmark_id: i64) -> Result<Refreshed, SourceError> {
        let fetched = with_retry(&self.retry, "get_benchmark_details", || {
            self.source.get_benchmark_details(benchmark_id)
        })
        .await;

        match fetched {
            Ok(benchmark) => {
                let view = Arc::new(reconcile(&benchmark));
                self.cache.insert(view.clone());
                tracing::debug!(
                    event = "benchlens.context.refreshed",
                    benchmark_id,
                    source = self.source.source_name(),
                    state = view.state.as_str(),
                );
                Ok(Refreshed::Fresh(view))
            }
            Err(error) => match self.cache.get(benchmark_id) {
                Some(view) => {
                    tracing::warn!(
                        event = "benchlens.context.stale_fallback",
                        benchmark_id,
                        error = %error,
                        "serving cached view of benchmark {}",
                        benchmark_id
                    );
                    Ok(Refreshed::Cached { view, error })
                }
                None => Err(error),
            },
        }
    }

    pub fn cached(&self, benchmark_id: i64) -> Option<Arc<ReconciledBenchmarkView>> {
        self.cache.get(benchmark_id)
    }

    pub async fn sync_plan(&self, benchmark_id: i64) -> Result<SyncPlan, SourceError> {
        let refreshed = self.refresh(benchmark_id).await?;
        Ok(select_sync(refreshed.view()))
    }

    /// Asks the backend to resync a benchmark. Nothing is sent when the plan
    /// is empty unless `force` is set.
    pub async fn sync(&self, benchmark_id: i64, force: bool) -> Result<SyncOutcome, SourceError> {
        let plan = self.sync_plan(benchmark_id).await?;
        if plan.is_empty() && !force {
            tracing::info!(
                event = "benchlens.sync.skipped",
                benchmark_id,
                "benchmark {} has nothing to sync",
                benchmark_id
            );
            return Ok(SyncOutcome {
                plan,
                issued: false,
            });
        }

        with_retry(&self.retry, "sync_benchmark", || {
            self.source.sync_benchmark(benchmark_id)
        })
        .await?;
        self.cache.invalidate(benchmark_id);
        tracing::info!(
            event = "benchlens.sync.issued",
            benchmark_id,
            pairs = plan.items.len(),
            models = plan.models.len(),
        );
        Ok(SyncOutcome { plan, issued: true })
    }

    /// Forces re-execution of one prompt, whatever its current outcome.
    pub async fn rerun(&self, prompt_id: i64) -> Result<RerunRequest, SourceError> {
        let owner = self.cache.find(|v| {
            v.models
                .iter()
                .any(|m| m.prompts.iter().any(|p| p.prompt_id == Some(prompt_id)))
        });
        let request = select_rerun(owner.as_deref(), prompt_id);

        with_retry(&self.retry, "rerun_single_prompt", || {
            self.source.rerun_single_prompt(prompt_id)
        })
        .await?;
        if let Some(view) = owner {
            self.cache.invalidate(view.benchmark_id);
        }
        tracing::info!(
            event = "benchlens.rerun.issued",
            prompt_id,
            previous = request.previous.map(|o| o.as_str()).unwrap_or("unknown"),
        );
        Ok(request)
    }

    /// Backend sync status next to the locally derived one. A mismatch is
    /// logged; it usually means the backend counters lag the records.
    pub async fn sync_status(&self, benchmark_id: i64) -> Result<SyncStatusReport, SourceError> {
        let backend = with_retry(&self.retry, "get_sync_status", || {
            self.source.get_sync_status(benchmark_id)
        })
        .await?;
        let local = self.sync_plan(benchmark_id).await?;
        let agrees = local.agrees_with(&backend);
        if !agrees {
            tracing::warn!(
                event = "benchlens.sync.status_mismatch",
                benchmark_id,
                backend_pairs = backend.total_prompts_to_sync,
                local_pairs = local.items.len(),
            );
        }
        Ok(SyncStatusReport {
            backend,
            local: local.to_status(),
            agrees,
        })
    }
}
