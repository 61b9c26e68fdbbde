use crate::config::SourceConfig;
use crate::errors::SourceError;
use crate::model::{Benchmark, BenchmarkSummary, SyncStatus};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub mod http;
pub mod memory;
pub mod store;

/// The backend boundary: where raw benchmark records come from and where
/// sync/rerun requests go.
#[async_trait]
pub trait BenchmarkSource: Send + Sync {
    async fn get_benchmark_details(&self, benchmark_id: i64) -> Result<Benchmark, SourceError>;

    async fn list_benchmarks(&self, use_cache: bool) -> Result<Vec<BenchmarkSummary>, SourceError>;

    async fn get_sync_status(&self, benchmark_id: i64) -> Result<SyncStatus, SourceError>;

    /// Asks the backend to re-execute every non-terminal prompt.
    async fn sync_benchmark(&self, benchmark_id: i64) -> Result<(), SourceError>;

    /// Asks the backend to re-execute one prompt whatever its current state.
    async fn rerun_single_prompt(&self, prompt_id: i64) -> Result<(), SourceError>;

    fn source_name(&self) -> &'static str;
}

pub fn build_source(cfg: &SourceConfig) -> anyhow::Result<Arc<dyn BenchmarkSource>> {
    match cfg {
        SourceConfig::Sqlite { path } => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let store = crate::storage::Store::open(path)?;
            store.init_schema()?;
            Ok(Arc::new(store::StoreSource::new(store)))
        }
        SourceConfig::Http {
            base_url,
            api_key,
            timeout_ms,
        } => Ok(Arc::new(http::HttpSource::new(
            base_url.clone(),
            api_key.clone(),
            Duration::from_millis(*timeout_ms),
        )?)),
    }
}
