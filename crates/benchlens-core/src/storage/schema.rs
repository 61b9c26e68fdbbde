pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS benchmarks (
  id INTEGER PRIMARY KEY,
  label TEXT NOT NULL DEFAULT '',
  description TEXT NOT NULL DEFAULT '',
  created_at TEXT,
  status TEXT NOT NULL DEFAULT 'unknown',
  completed_prompts INTEGER,
  total_prompts INTEGER,
  imported_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS runs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  benchmark_id INTEGER NOT NULL REFERENCES benchmarks(id) ON DELETE CASCADE,
  model_name TEXT NOT NULL,
  provider TEXT NOT NULL DEFAULT '',
  total_cost REAL NOT NULL DEFAULT 0,
  standard_input_tokens INTEGER NOT NULL DEFAULT 0,
  cached_input_tokens INTEGER NOT NULL DEFAULT 0,
  output_tokens INTEGER NOT NULL DEFAULT 0,
  latency REAL NOT NULL DEFAULT 0,
  run_status TEXT
);

CREATE TABLE IF NOT EXISTS prompt_results (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
  prompt TEXT NOT NULL,
  response TEXT,
  cost REAL NOT NULL DEFAULT 0,
  standard_input_tokens INTEGER NOT NULL DEFAULT 0,
  cached_input_tokens INTEGER NOT NULL DEFAULT 0,
  output_tokens INTEGER NOT NULL DEFAULT 0,
  latency REAL NOT NULL DEFAULT 0,
  outcome TEXT,
  error TEXT,
  web_search_used INTEGER
);

CREATE TABLE IF NOT EXISTS sync_requests (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  kind TEXT NOT NULL,
  benchmark_id INTEGER,
  prompt_id INTEGER,
  dedup_key TEXT NOT NULL,
  state TEXT NOT NULL DEFAULT 'pending',
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_benchmark ON runs(benchmark_id);
CREATE INDEX IF NOT EXISTS idx_prompt_results_run ON prompt_results(run_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_sync_requests_pending
  ON sync_requests(dedup_key) WHERE state = 'pending';
"#;
