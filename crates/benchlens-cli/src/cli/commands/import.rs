use super::exit_codes;
use crate::cli::args::ImportArgs;
use anyhow::{Context, Result};
use benchlens_core::config::{BenchlensConfig, SourceConfig};
use benchlens_core::model::Benchmark;
use benchlens_core::storage::Store;
use serde::Deserialize;
use std::fs;

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Many(Vec<Benchmark>),
    One(Box<Benchmark>),
}

pub fn cmd_import(args: ImportArgs, cfg: &BenchlensConfig) -> Result<i32> {
    let SourceConfig::Sqlite { path } = &cfg.source else {
        eprintln!("❌ import needs a sqlite source; the configured source is http");
        return Ok(exit_codes::CONFIG_ERROR);
    };

    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read input: {}", args.input.display()))?;
    let benchmarks = match serde_json::from_str::<SnapshotFile>(&text)
        .with_context(|| format!("failed to parse snapshot: {}", args.input.display()))?
    {
        SnapshotFile::Many(v) => v,
        SnapshotFile::One(b) => vec![*b],
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store = Store::open(path)?;
    store.init_schema()?;

    for b in &benchmarks {
        store
            .import_benchmark(b)
            .with_context(|| format!("failed to import benchmark {}", b.id))?;
        let prompts: usize = b.runs.iter().map(|r| r.prompts.len()).sum();
        println!(
            "✅ Imported benchmark #{} {} ({} runs, {} prompt results)",
            b.id,
            b.label,
            b.runs.len(),
            prompts
        );
    }

    let stats = store.stats_best_effort()?;
    println!(
        "Database {}: {} benchmark(s), {} pending request(s)",
        path.display(),
        stats.benchmarks.unwrap_or(0),
        stats.pending_requests.unwrap_or(0)
    );
    Ok(exit_codes::OK)
}
