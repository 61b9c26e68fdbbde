use super::BenchmarkSource;
use crate::errors::SourceError;
use crate::model::{Benchmark, BenchmarkSummary, SyncStatus};
use crate::reconcile::{reconcile, sync::select_sync};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// A source holding benchmark snapshots in memory. Backs `--snapshot` mode
/// and lets tests script backend behavior, including transient failures.
#[derive(Default)]
pub struct MemorySource {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    benchmarks: BTreeMap<i64, Benchmark>,
    failures_left: u32,
    fetches: u32,
    sync_requests: Vec<i64>,
    rerun_requests: Vec<i64>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_benchmark(benchmark: Benchmark) -> Self {
        let s = Self::new();
        s.put(benchmark);
        s
    }

    /// Inserts or replaces a snapshot.
    pub fn put(&self, benchmark: Benchmark) {
        self.lock().benchmarks.insert(benchmark.id, benchmark);
    }

    /// Makes the next `n` detail fetches fail with a transport error.
    pub fn fail_next(&self, n: u32) {
        self.lock().failures_left = n;
    }

    pub fn fetch_count(&self) -> u32 {
        self.lock().fetches
    }

    pub fn sync_requests(&self) -> Vec<i64> {
        self.lock().sync_requests.clone()
    }

    pub fn rerun_requests(&self) -> Vec<i64> {
        self.lock().rerun_requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn snapshot(&self, benchmark_id: i64) -> Result<Benchmark, SourceError> {
        self.lock()
            .benchmarks
            .get(&benchmark_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("benchmark {}", benchmark_id)))
    }
}

#[async_trait]
impl BenchmarkSource for MemorySource {
    async fn get_benchmark_details(&self, benchmark_id: i64) -> Result<Benchmark, SourceError> {
        {
            let mut st = self.lock();
            st.fetches += 1;
            if st.failures_left > 0 {
                st.failures_left -= 1;
                return Err(SourceError::Transport("scripted failure".into()));
            }
        }
        self.snapshot(benchmark_id)
    }

    async fn list_benchmarks(&self, _use_cache: bool) -> Result<Vec<BenchmarkSummary>, SourceError> {
        Ok(self
            .lock()
            .benchmarks
            .values()
            .map(|b| BenchmarkSummary {
                id: b.id,
                label: b.label.clone(),
                description: b.description.clone(),
                created_at: b.created_at.clone(),
                status: b.status.clone(),
                completed_prompts: b.completed_prompts.unwrap_or(0),
                total_prompts: b.total_prompts.unwrap_or(0),
            })
            .collect())
    }

    async fn get_sync_status(&self, benchmark_id: i64) -> Result<SyncStatus, SourceError> {
        let b = self.snapshot(benchmark_id)?;
        Ok(select_sync(&reconcile(&b)).to_status())
    }

    async fn sync_benchmark(&self, benchmark_id: i64) -> Result<(), SourceError> {
        self.snapshot(benchmark_id)?;
        self.lock().sync_requests.push(benchmark_id);
        Ok(())
    }

    async fn rerun_single_prompt(&self, prompt_id: i64) -> Result<(), SourceError> {
        self.lock().rerun_requests.push(prompt_id);
        Ok(())
    }

    fn source_name(&self) -> &'static str {
        "memory"
    }
}
