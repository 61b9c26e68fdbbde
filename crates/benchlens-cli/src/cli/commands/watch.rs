use super::{check_format, exit_codes, open_context};
use crate::cli::args::WatchArgs;
use anyhow::{Context, Result};
use benchlens_core::config::BenchlensConfig;
use benchlens_core::events::PushEvent;
use benchlens_core::report::{console::render_view, render_json};
use benchlens_core::watch::{watch_benchmark, WatchState};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::broadcast;

pub async fn cmd_watch(args: WatchArgs, cfg: &BenchlensConfig) -> Result<i32> {
    check_format(&args.format)?;
    let (ctx, _) = open_context(cfg, None)?;
    let interval = args
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| cfg.poll_interval());
    if interval.is_zero() {
        anyhow::bail!("--interval-ms must be greater than 0");
    }

    let events = match &args.events {
        Some(path) => Some(spawn_event_reader(path.clone()).await?),
        None => None,
    };

    let handle = watch_benchmark(ctx, args.id, interval, events);
    let mut rx = handle.subscribe();
    let mut last = WatchState::Loading;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Stopped watching benchmark #{}.", args.id);
                break;
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                print_state(&state, &args.format)?;
                last = state;
            }
        }
    }

    handle.cancel();
    handle.finished().await;

    Ok(match last {
        WatchState::ConnectionFailed(_) => exit_codes::CONNECTION_FAILURE,
        _ => exit_codes::OK,
    })
}

fn print_state(state: &WatchState, format: &str) -> Result<()> {
    match state {
        WatchState::Loading => {}
        WatchState::Ready(view) => {
            if format == "json" {
                println!("{}", serde_json::to_string(&**view)?);
            } else {
                print!("{}", render_view(view, false));
            }
        }
        WatchState::Stale { view, error } => {
            eprintln!("⚠️  Refresh failed, showing last good view: {}", error);
            if format == "json" {
                println!("{}", render_json(view)?);
            } else {
                print!("{}", render_view(view, false));
            }
        }
        WatchState::ConnectionFailed(error) => {
            eprintln!("❌ Connection failure: {}", error);
        }
    }
    Ok(())
}

/// Feeds JSON-lines push events from a file or stdin into a broadcast
/// channel. Malformed lines are logged and skipped.
async fn spawn_event_reader(path: PathBuf) -> Result<broadcast::Receiver<PushEvent>> {
    let input: Box<dyn AsyncRead + Unpin + Send> = if path.as_os_str() == "-" {
        Box::new(tokio::io::stdin())
    } else {
        Box::new(
            tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("failed to open events: {}", path.display()))?,
        )
    };

    let (tx, rx) = broadcast::channel(64);
    tokio::spawn(async move {
        let mut lines = BufReader::new(input).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match PushEvent::parse_line(&line) {
                    Ok(ev) => {
                        if tx.send(ev).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(event = "benchlens.events.invalid", error = %e),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(event = "benchlens.events.read_failed", error = %e);
                    break;
                }
            }
        }
    });
    Ok(rx)
}
