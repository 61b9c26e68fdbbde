use super::{check_format, exit_codes, open_context, resolve_id, source_failure};
use crate::cli::args::ShowArgs;
use anyhow::Result;
use benchlens_core::config::BenchlensConfig;
use benchlens_core::context::Refreshed;
use benchlens_core::reconcile::ReconciledBenchmarkView;
use benchlens_core::report::{console::render_view, render_json};

pub async fn cmd_show(args: ShowArgs, cfg: &BenchlensConfig) -> Result<i32> {
    check_format(&args.format)?;
    let (ctx, snapshot_id) = open_context(cfg, args.snapshot.as_deref())?;
    let id = resolve_id(args.id, snapshot_id)?;

    let refreshed = match ctx.refresh(id).await {
        Ok(r) => r,
        Err(e) => return Ok(source_failure(&e)),
    };
    if let Refreshed::Cached { error, .. } = &refreshed {
        eprintln!("⚠️  Showing cached view, refresh failed: {}", error);
    }
    let view = refreshed.view();

    if let Some(name) = &args.model {
        let model = match view.model(name) {
            Ok(m) => m.clone(),
            Err(e) => {
                eprintln!("❌ {}", e);
                return Ok(exit_codes::CONFIG_ERROR);
            }
        };
        if args.format == "json" {
            println!("{}", serde_json::to_string_pretty(&model)?);
        } else {
            let single = ReconciledBenchmarkView {
                models: vec![model],
                ..(**view).clone()
            };
            print!("{}", render_view(&single, args.verbose));
        }
    } else if args.format == "json" {
        println!("{}", render_json(view)?);
    } else {
        print!("{}", render_view(view, args.verbose));
    }

    if args.require_complete && !view.is_complete() {
        return Ok(exit_codes::INCOMPLETE);
    }
    Ok(exit_codes::OK)
}
