use super::{check_format, exit_codes, open_context, resolve_id, source_failure};
use crate::cli::args::{RerunArgs, SyncArgs, SyncPlanArgs};
use anyhow::Result;
use benchlens_core::config::BenchlensConfig;
use benchlens_core::report::console::render_sync_plan;

pub async fn cmd_sync_plan(args: SyncPlanArgs, cfg: &BenchlensConfig) -> Result<i32> {
    check_format(&args.format)?;
    let (ctx, snapshot_id) = open_context(cfg, args.snapshot.as_deref())?;
    let id = resolve_id(args.id, snapshot_id)?;

    let plan = match ctx.sync_plan(id).await {
        Ok(p) => p,
        Err(e) => return Ok(source_failure(&e)),
    };
    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", render_sync_plan(&plan));
    }

    if args.check_backend {
        let report = match ctx.sync_status(id).await {
            Ok(r) => r,
            Err(e) => return Ok(source_failure(&e)),
        };
        if report.agrees {
            eprintln!("Backend sync status agrees with the plan.");
        } else {
            eprintln!(
                "⚠️  Backend reports {} prompt(s) to sync across {:?}; the plan has {}.",
                report.backend.total_prompts_to_sync,
                report.backend.models_needing_sync,
                report.local.total_prompts_to_sync
            );
        }
    }
    Ok(exit_codes::OK)
}

pub async fn cmd_sync(args: SyncArgs, cfg: &BenchlensConfig) -> Result<i32> {
    let (ctx, _) = open_context(cfg, None)?;
    let outcome = match ctx.sync(args.id, args.force).await {
        Ok(o) => o,
        Err(e) => return Ok(source_failure(&e)),
    };

    if outcome.issued {
        println!(
            "✅ Sync requested for benchmark #{} ({} pair(s), {} model(s))",
            args.id,
            outcome.plan.items.len(),
            outcome.plan.models.len()
        );
    } else {
        println!("Benchmark #{} has nothing to sync.", args.id);
    }
    Ok(exit_codes::OK)
}

pub async fn cmd_rerun(args: RerunArgs, cfg: &BenchlensConfig) -> Result<i32> {
    let (ctx, _) = open_context(cfg, None)?;
    if let Some(benchmark_id) = args.benchmark {
        if let Err(e) = ctx.refresh(benchmark_id).await {
            return Ok(source_failure(&e));
        }
    }

    let request = match ctx.rerun(args.prompt_id).await {
        Ok(r) => r,
        Err(e) => return Ok(source_failure(&e)),
    };

    let target = match (&request.model, &request.prompt) {
        (Some(model), Some(prompt)) => format!(" ({} on \"{}\")", model, prompt),
        _ => String::new(),
    };
    let previous = request
        .previous
        .map(|o| format!(", was {}", o.as_str()))
        .unwrap_or_default();
    println!(
        "✅ Rerun requested for prompt #{}{}{}",
        request.prompt_id, target, previous
    );
    Ok(exit_codes::OK)
}
