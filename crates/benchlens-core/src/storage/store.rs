use crate::model::{
    Benchmark, BenchmarkSummary, PersistedStatus, PromptOutcome, PromptResult, Run,
};
use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub benchmarks: Option<u64>,
    pub runs: Option<u64>,
    pub prompt_results: Option<u64>,
    pub pending_requests: Option<u64>,
    pub last_imported_at: Option<String>,
}

/// A sync or rerun request waiting for the executor to pick it up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedRequest {
    pub id: i64,
    pub kind: String,
    pub benchmark_id: Option<i64>,
    pub prompt_id: Option<i64>,
    pub created_at: String,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite db {}", path.display()))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("sqlite connection mutex poisoned"))
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(crate::storage::schema::DDL)?;
        Ok(())
    }

    /// Replaces the stored copy of `benchmark` with the given snapshot. Row
    /// ids carried by the snapshot are kept so prompt ids stay valid for
    /// rerun requests.
    pub fn import_benchmark(&self, benchmark: &Benchmark) -> anyhow::Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM benchmarks WHERE id = ?1", params![benchmark.id])?;
        tx.execute(
            "INSERT INTO benchmarks
               (id, label, description, created_at, status, completed_prompts, total_prompts, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                benchmark.id,
                benchmark.label,
                benchmark.description,
                benchmark.created_at,
                benchmark.status.as_str(),
                benchmark.completed_prompts.map(to_sql_count),
                benchmark.total_prompts.map(to_sql_count),
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;

        for run in &benchmark.runs {
            tx.execute(
                "INSERT INTO runs
                   (id, benchmark_id, model_name, provider, total_cost,
                    standard_input_tokens, cached_input_tokens, output_tokens, latency, run_status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    run.id,
                    benchmark.id,
                    run.model_name,
                    run.provider,
                    run.total_cost,
                    to_sql_count(run.standard_input_tokens),
                    to_sql_count(run.cached_input_tokens),
                    to_sql_count(run.output_tokens),
                    run.latency,
                    run.run_status,
                ],
            )
            .with_context(|| format!("failed to insert run for model {}", run.model_name))?;
            let run_id = tx.last_insert_rowid();

            for p in &run.prompts {
                tx.execute(
                    "INSERT INTO prompt_results
                       (id, run_id, prompt, response, cost, standard_input_tokens,
                        cached_input_tokens, output_tokens, latency, outcome, error, web_search_used)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    params![
                        p.id,
                        run_id,
                        p.prompt,
                        p.response,
                        p.cost,
                        to_sql_count(p.standard_input_tokens),
                        to_sql_count(p.cached_input_tokens),
                        to_sql_count(p.output_tokens),
                        p.latency,
                        p.outcome.map(|o| o.as_str()),
                        p.error,
                        p.web_search_used,
                    ],
                )
                .with_context(|| format!("failed to insert prompt result {:?}", p.id))?;
            }
        }

        tx.commit()?;
        tracing::info!(
            event = "benchlens.store.import",
            benchmark_id = benchmark.id,
            runs = benchmark.runs.len(),
        );
        Ok(())
    }

    pub fn load_benchmark(&self, benchmark_id: i64) -> anyhow::Result<Option<Benchmark>> {
        let conn = self.lock()?;

        let head = conn
            .query_row(
                "SELECT id, label, description, created_at, status, completed_prompts, total_prompts
                 FROM benchmarks WHERE id = ?1",
                params![benchmark_id],
                |r| {
                    Ok(Benchmark {
                        id: r.get(0)?,
                        label: r.get(1)?,
                        description: r.get(2)?,
                        created_at: r.get(3)?,
                        status: PersistedStatus::parse(&r.get::<_, String>(4)?),
                        completed_prompts: r.get::<_, Option<i64>>(5)?.map(|n| n.max(0) as u64),
                        total_prompts: r.get::<_, Option<i64>>(6)?.map(|n| n.max(0) as u64),
                        runs: Vec::new(),
                    })
                },
            )
            .optional()?;
        let Some(mut benchmark) = head else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT id, model_name, provider, total_cost, standard_input_tokens,
                    cached_input_tokens, output_tokens, latency, run_status
             FROM runs WHERE benchmark_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![benchmark_id], |r| {
            Ok(Run {
                id: Some(r.get(0)?),
                model_name: r.get(1)?,
                provider: r.get(2)?,
                total_cost: r.get(3)?,
                standard_input_tokens: r.get::<_, i64>(4)?.max(0) as u64,
                cached_input_tokens: r.get::<_, i64>(5)?.max(0) as u64,
                output_tokens: r.get::<_, i64>(6)?.max(0) as u64,
                latency: r.get(7)?,
                run_status: r.get(8)?,
                prompts: Vec::new(),
            })
        })?;
        for r in rows {
            benchmark.runs.push(r?);
        }

        let mut stmt = conn.prepare(
            "SELECT id, prompt, response, cost, standard_input_tokens, cached_input_tokens,
                    output_tokens, latency, outcome, error, web_search_used
             FROM prompt_results WHERE run_id = ?1 ORDER BY id ASC",
        )?;
        for run in &mut benchmark.runs {
            let rows = stmt.query_map(params![run.id], |r| {
                Ok(PromptResult {
                    id: Some(r.get(0)?),
                    prompt: r.get(1)?,
                    response: r.get(2)?,
                    cost: r.get(3)?,
                    standard_input_tokens: r.get::<_, i64>(4)?.max(0) as u64,
                    cached_input_tokens: r.get::<_, i64>(5)?.max(0) as u64,
                    output_tokens: r.get::<_, i64>(6)?.max(0) as u64,
                    latency: r.get(7)?,
                    outcome: r.get::<_, Option<String>>(8)?.as_deref().and_then(parse_outcome),
                    error: r.get(9)?,
                    web_search_used: r.get(10)?,
                })
            })?;
            for p in rows {
                run.prompts.push(p?);
            }
        }

        Ok(Some(benchmark))
    }

    pub fn list_benchmarks(&self) -> anyhow::Result<Vec<BenchmarkSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, label, description, created_at, status,
                    COALESCE(completed_prompts, 0), COALESCE(total_prompts, 0)
             FROM benchmarks ORDER BY id DESC",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok(BenchmarkSummary {
                id: r.get(0)?,
                label: r.get(1)?,
                description: r.get(2)?,
                created_at: r.get(3)?,
                status: PersistedStatus::parse(&r.get::<_, String>(4)?),
                completed_prompts: r.get::<_, i64>(5)?.max(0) as u64,
                total_prompts: r.get::<_, i64>(6)?.max(0) as u64,
            })
        })?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn prompt_exists(&self, prompt_id: i64) -> anyhow::Result<bool> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM prompt_results WHERE id = ?1",
                params![prompt_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Queues a whole-benchmark sync. Returns false when an identical
    /// request is already pending.
    pub fn enqueue_sync(&self, benchmark_id: i64) -> anyhow::Result<bool> {
        self.enqueue("sync", Some(benchmark_id), None, &format!("sync:{}", benchmark_id))
    }

    pub fn enqueue_rerun(&self, prompt_id: i64) -> anyhow::Result<bool> {
        self.enqueue("rerun", None, Some(prompt_id), &format!("rerun:{}", prompt_id))
    }

    fn enqueue(
        &self,
        kind: &str,
        benchmark_id: Option<i64>,
        prompt_id: Option<i64>,
        dedup_key: &str,
    ) -> anyhow::Result<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO sync_requests (kind, benchmark_id, prompt_id, dedup_key, state, created_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
            params![
                kind,
                benchmark_id,
                prompt_id,
                dedup_key,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn pending_requests(&self) -> anyhow::Result<Vec<QueuedRequest>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, kind, benchmark_id, prompt_id, created_at
             FROM sync_requests WHERE state = 'pending' ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok(QueuedRequest {
                id: r.get(0)?,
                kind: r.get(1)?,
                benchmark_id: r.get(2)?,
                prompt_id: r.get(3)?,
                created_at: r.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn stats_best_effort(&self) -> anyhow::Result<StoreStats> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Option<u64> {
            conn.query_row(sql, [], |r| r.get::<_, i64>(0).map(|x| x as u64))
                .ok()
        };

        Ok(StoreStats {
            benchmarks: count("SELECT COUNT(*) FROM benchmarks"),
            runs: count("SELECT COUNT(*) FROM runs"),
            prompt_results: count("SELECT COUNT(*) FROM prompt_results"),
            pending_requests: count("SELECT COUNT(*) FROM sync_requests WHERE state = 'pending'"),
            last_imported_at: conn
                .query_row("SELECT MAX(imported_at) FROM benchmarks", [], |r| r.get(0))
                .ok()
                .flatten(),
        })
    }
}

/// SQLite integers are signed; counts past `i64::MAX` are clamped, not wrapped.
fn to_sql_count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn parse_outcome(s: &str) -> Option<PromptOutcome> {
    match s {
        "success" => Some(PromptOutcome::Success),
        "error" => Some(PromptOutcome::Error),
        "pending" => Some(PromptOutcome::Pending),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Benchmark {
        Benchmark {
            id: 7,
            label: "nightly".into(),
            status: PersistedStatus::Running,
            runs: vec![Run {
                model_name: "gpt-x".into(),
                provider: "openai".into(),
                total_cost: 0.2,
                prompts: vec![
                    PromptResult {
                        id: Some(70),
                        prompt: "P1".into(),
                        response: Some("hi".into()),
                        outcome: Some(PromptOutcome::Success),
                        latency: 1.5,
                        ..Default::default()
                    },
                    PromptResult {
                        id: Some(71),
                        prompt: "P2".into(),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_import_and_load() {
        let store = Store::memory().unwrap();
        store.init_schema().unwrap();
        store.import_benchmark(&sample()).unwrap();

        let b = store.load_benchmark(7).unwrap().unwrap();
        assert_eq!(b.label, "nightly");
        assert_eq!(b.status, PersistedStatus::Running);
        assert_eq!(b.runs.len(), 1);
        assert_eq!(b.runs[0].prompts.len(), 2);
        assert_eq!(b.runs[0].prompts[0].id, Some(70));
        assert_eq!(b.runs[0].prompts[0].outcome, Some(PromptOutcome::Success));
        assert!(b.runs[0].prompts[1].response.is_none());
        assert!(store.load_benchmark(8).unwrap().is_none());
    }

    #[test]
    fn test_reimport_replaces_rows() {
        let store = Store::memory().unwrap();
        store.init_schema().unwrap();
        store.import_benchmark(&sample()).unwrap();

        let mut updated = sample();
        updated.runs[0].prompts[1].response = Some("done".into());
        store.import_benchmark(&updated).unwrap();

        let b = store.load_benchmark(7).unwrap().unwrap();
        assert_eq!(b.runs.len(), 1);
        assert_eq!(b.runs[0].prompts[1].response.as_deref(), Some("done"));
        let stats = store.stats_best_effort().unwrap();
        assert_eq!(stats.prompt_results, Some(2));
    }

    #[test]
    fn test_pending_requests_are_deduplicated() {
        let store = Store::memory().unwrap();
        store.init_schema().unwrap();
        assert!(store.enqueue_sync(7).unwrap());
        assert!(!store.enqueue_sync(7).unwrap());
        assert!(store.enqueue_rerun(70).unwrap());

        let pending = store.pending_requests().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].kind, "sync");
        assert_eq!(pending[1].prompt_id, Some(70));
    }

    #[test]
    fn test_oversized_counts_are_clamped_not_wrapped() {
        let store = Store::memory().unwrap();
        store.init_schema().unwrap();
        let mut b = sample();
        b.total_prompts = Some(u64::MAX);
        b.runs[0].output_tokens = u64::MAX;
        b.runs[0].prompts[0].cached_input_tokens = u64::MAX;
        store.import_benchmark(&b).unwrap();

        let loaded = store.load_benchmark(7).unwrap().unwrap();
        let clamped = i64::MAX as u64;
        assert_eq!(loaded.total_prompts, Some(clamped));
        assert_eq!(loaded.runs[0].output_tokens, clamped);
        assert_eq!(loaded.runs[0].prompts[0].cached_input_tokens, clamped);
    }
}
