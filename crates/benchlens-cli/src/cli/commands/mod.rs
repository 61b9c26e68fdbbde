pub mod import;
pub mod init;
pub mod list;
pub mod show;
pub mod sync;
pub mod watch;

use crate::cli::args::{Cli, Command};
use anyhow::{Context, Result};
use benchlens_core::config::BenchlensConfig;
use benchlens_core::context::ReconcileContext;
use benchlens_core::errors::SourceError;
use benchlens_core::model::Benchmark;
use benchlens_core::source::build_source;
use benchlens_core::source::memory::MemorySource;
use std::path::Path;
use std::sync::Arc;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const INCOMPLETE: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    pub const CONNECTION_FAILURE: i32 = 3;
}

pub async fn dispatch(cli: Cli, cfg: BenchlensConfig) -> Result<i32> {
    match cli.cmd {
        Command::Init(args) => init::cmd_init(args, &cli.config),
        Command::Import(args) => import::cmd_import(args, &cfg),
        Command::List(args) => list::cmd_list(args, &cfg).await,
        Command::Show(args) => show::cmd_show(args, &cfg).await,
        Command::SyncPlan(args) => sync::cmd_sync_plan(args, &cfg).await,
        Command::Sync(args) => sync::cmd_sync(args, &cfg).await,
        Command::Rerun(args) => sync::cmd_rerun(args, &cfg).await,
        Command::Watch(args) => watch::cmd_watch(args, &cfg).await,
        Command::Version => {
            println!("benchlens {}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

/// Builds the context for a command. With a snapshot file the context is
/// backed by that file alone and its benchmark id is returned.
pub(crate) fn open_context(
    cfg: &BenchlensConfig,
    snapshot: Option<&Path>,
) -> Result<(ReconcileContext, Option<i64>)> {
    match snapshot {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read snapshot: {}", path.display()))?;
            let benchmark: Benchmark = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse snapshot: {}", path.display()))?;
            let id = benchmark.id;
            let source = Arc::new(MemorySource::with_benchmark(benchmark));
            Ok((ReconcileContext::from_config(source, cfg), Some(id)))
        }
        None => {
            let source = build_source(&cfg.source)?;
            Ok((ReconcileContext::from_config(source, cfg), None))
        }
    }
}

pub(crate) fn resolve_id(arg: Option<i64>, snapshot_id: Option<i64>) -> Result<i64> {
    match (arg, snapshot_id) {
        (Some(a), Some(s)) if a != s => {
            anyhow::bail!("benchmark id {} does not match snapshot id {}", a, s)
        }
        (Some(a), _) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => anyhow::bail!("a benchmark id is required without --snapshot"),
    }
}

/// Prints a source failure and picks the exit code for it.
pub(crate) fn source_failure(e: &SourceError) -> i32 {
    if e.is_connection_failure() {
        eprintln!("❌ Connection failure: {}", e);
        exit_codes::CONNECTION_FAILURE
    } else {
        eprintln!("❌ {}", e);
        exit_codes::CONFIG_ERROR
    }
}

pub(crate) fn check_format(format: &str) -> Result<()> {
    match format {
        "text" | "json" => Ok(()),
        other => anyhow::bail!("unknown format: {} (expected text or json)", other),
    }
}
