use super::BenchmarkSource;
use crate::errors::SourceError;
use crate::model::{Benchmark, BenchmarkSummary, SyncStatus};
use crate::reconcile::{reconcile, sync::select_sync};
use crate::storage::Store;
use async_trait::async_trait;

/// Serves benchmarks from a local snapshot database. Sync and rerun
/// requests are queued for an executor instead of being run here.
pub struct StoreSource {
    pub store: Store,
}

impl StoreSource {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BenchmarkSource for StoreSource {
    async fn get_benchmark_details(&self, benchmark_id: i64) -> Result<Benchmark, SourceError> {
        self.store
            .load_benchmark(benchmark_id)?
            .ok_or_else(|| SourceError::NotFound(format!("benchmark {}", benchmark_id)))
    }

    async fn list_benchmarks(&self, _use_cache: bool) -> Result<Vec<BenchmarkSummary>, SourceError> {
        Ok(self.store.list_benchmarks()?)
    }

    async fn get_sync_status(&self, benchmark_id: i64) -> Result<SyncStatus, SourceError> {
        let benchmark = self.get_benchmark_details(benchmark_id).await?;
        Ok(select_sync(&reconcile(&benchmark)).to_status())
    }

    async fn sync_benchmark(&self, benchmark_id: i64) -> Result<(), SourceError> {
        if self.store.load_benchmark(benchmark_id)?.is_none() {
            return Err(SourceError::NotFound(format!("benchmark {}", benchmark_id)));
        }
        if !self.store.enqueue_sync(benchmark_id)? {
            tracing::debug!(
                event = "benchlens.store.sync_already_pending",
                benchmark_id,
            );
        }
        Ok(())
    }

    async fn rerun_single_prompt(&self, prompt_id: i64) -> Result<(), SourceError> {
        if !self.store.prompt_exists(prompt_id)? {
            return Err(SourceError::NotFound(format!("prompt {}", prompt_id)));
        }
        if !self.store.enqueue_rerun(prompt_id)? {
            tracing::debug!(event = "benchlens.store.rerun_already_pending", prompt_id);
        }
        Ok(())
    }

    fn source_name(&self) -> &'static str {
        "sqlite"
    }
}
