use super::{check_format, exit_codes, source_failure};
use crate::cli::args::ListArgs;
use anyhow::Result;
use benchlens_core::config::BenchlensConfig;
use benchlens_core::report::console::render_list;
use benchlens_core::retry::with_retry;
use benchlens_core::source::build_source;

pub async fn cmd_list(args: ListArgs, cfg: &BenchlensConfig) -> Result<i32> {
    check_format(&args.format)?;
    let source = build_source(&cfg.source)?;
    let use_cache = !args.no_cache;

    let items = match with_retry(&cfg.retry.policy(), "list_benchmarks", || {
        source.list_benchmarks(use_cache)
    })
    .await
    {
        Ok(items) => items,
        Err(e) => return Ok(source_failure(&e)),
    };

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        print!("{}", render_list(&items));
    }
    Ok(exit_codes::OK)
}
