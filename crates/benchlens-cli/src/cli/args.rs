use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "benchlens",
    version,
    about = "Reconciled progress, cost and latency views for multi-model prompt benchmarks"
)]
pub struct Cli {
    /// Config file; defaults apply when it does not exist
    #[arg(long, global = true, default_value = "benchlens.yaml", env = "BENCHLENS_CONFIG")]
    pub config: PathBuf,

    /// Reject unknown config keys instead of warning
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a sample config file
    Init(InitArgs),
    /// Load benchmark snapshots (JSON) into the local database
    Import(ImportArgs),
    /// List known benchmarks with their stored status
    List(ListArgs),
    /// Show the reconciled view of one benchmark
    Show(ShowArgs),
    /// Print the (model, prompt) pairs that still need work
    SyncPlan(SyncPlanArgs),
    /// Ask the backend to resync non-terminal prompts
    Sync(SyncArgs),
    /// Force re-execution of a single prompt
    Rerun(RerunArgs),
    /// Follow a benchmark until it completes
    Watch(WatchArgs),
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ImportArgs {
    /// JSON file holding one benchmark or an array of benchmarks
    pub input: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ListArgs {
    /// Ask the backend to bypass its own list cache
    #[arg(long)]
    pub no_cache: bool,

    #[arg(long, default_value = "text")]
    pub format: String, // text|json
}

#[derive(clap::Args, Debug, Clone)]
pub struct ShowArgs {
    /// Benchmark id; optional with --snapshot
    pub id: Option<i64>,

    #[arg(long, default_value = "text")]
    pub format: String, // text|json

    /// Reconcile a JSON snapshot file instead of querying the configured source
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Only show this model (name or "name (provider)")
    #[arg(long)]
    pub model: Option<String>,

    /// Exit with 1 when the benchmark is not complete
    #[arg(long)]
    pub require_complete: bool,

    /// List every prompt with its outcome
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SyncPlanArgs {
    pub id: Option<i64>,

    #[arg(long, default_value = "text")]
    pub format: String, // text|json

    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Compare the plan with the backend's own sync status
    #[arg(long)]
    pub check_backend: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SyncArgs {
    pub id: i64,

    /// Send the sync request even when nothing is pending
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RerunArgs {
    pub prompt_id: i64,

    /// Benchmark the prompt belongs to, used to report its previous outcome
    #[arg(long)]
    pub benchmark: Option<i64>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct WatchArgs {
    pub id: i64,

    /// Poll interval; defaults to poll_interval_ms from the config
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// JSON-lines push events to react to ("-" for stdin)
    #[arg(long)]
    pub events: Option<PathBuf>,

    #[arg(long, default_value = "text")]
    pub format: String, // text|json
}
