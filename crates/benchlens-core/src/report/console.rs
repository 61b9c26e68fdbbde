use crate::model::{BenchmarkSummary, PromptOutcome};
use crate::reconcile::status::ProgressState;
use crate::reconcile::sync::{SyncPlan, SyncReason};
use crate::reconcile::ReconciledBenchmarkView;
use std::fmt::Write;

fn icon(state: ProgressState) -> &'static str {
    match state {
        ProgressState::Complete => "✅",
        ProgressState::InProgress => "⏳",
        ProgressState::NotStarted => "⏸️ ",
    }
}

fn tokens_label(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

pub fn render_view(view: &ReconciledBenchmarkView, verbose: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} Benchmark #{} {}  [{}]",
        icon(view.state),
        view.benchmark_id,
        view.label,
        view.state.as_str()
    );
    let _ = writeln!(
        out,
        "   prompts {}/{}   models {}/{}   cost ${:.4}   tokens {}   latency {:.1}s",
        view.prompts_complete,
        view.prompts_total,
        view.models_complete,
        view.models_total,
        view.totals.cost,
        tokens_label(view.totals.tokens.total()),
        view.totals.latency_ms / 1000.0
    );
    if view.status_overridden {
        let _ = writeln!(
            out,
            "   (stored status '{}' is stale; completion derived from results)",
            view.persisted_status.as_str()
        );
    }
    if view.persisted_ahead {
        let _ = writeln!(
            out,
            "   (stored status says completed; results are not all in yet)"
        );
    }

    for m in &view.models {
        let _ = writeln!(
            out,
            "{} {:<32} {:>4}/{:<4} ${:<9.4} {:>8} tok {:>8.1}s",
            icon(m.state),
            m.key.to_string(),
            m.completed,
            m.expected(),
            m.metrics.totals.cost,
            tokens_label(m.metrics.totals.tokens.total()),
            m.metrics.totals.latency_ms / 1000.0
        );
        if m.errored > 0 {
            let _ = writeln!(out, "    {} prompt(s) ended in error", m.errored);
        }
        if m.fragments > 1 {
            let _ = writeln!(out, "    merged from {} run fragments", m.fragments);
        }
        if verbose {
            for p in &m.prompts {
                let mark = match p.outcome {
                    PromptOutcome::Success => "ok ",
                    PromptOutcome::Error => "ERR",
                    PromptOutcome::Pending => "...",
                };
                let id = p.prompt_id.map(|i| format!("#{}", i)).unwrap_or_default();
                let _ = writeln!(out, "      [{}] {:<6} {}", mark, id, truncate(&p.prompt, 60));
            }
            for missing in &m.missing_prompts {
                let _ = writeln!(out, "      [---]        {}", truncate(missing, 60));
            }
        }
    }
    out
}

pub fn render_sync_plan(plan: &SyncPlan) -> String {
    let mut out = String::new();
    if plan.is_empty() {
        let _ = writeln!(out, "Benchmark #{}: nothing to sync", plan.benchmark_id);
        return out;
    }
    let _ = writeln!(
        out,
        "Benchmark #{}: {} pair(s) across {} model(s) need work",
        plan.benchmark_id,
        plan.items.len(),
        plan.models.len()
    );
    for item in &plan.items {
        let reason = match item.reason {
            SyncReason::Pending => "pending",
            SyncReason::Missing => "missing",
        };
        let _ = writeln!(
            out,
            "  {:<8} {:<32} {}",
            reason,
            item.model.to_string(),
            truncate(&item.prompt, 60)
        );
    }
    out
}

pub fn render_list(items: &[BenchmarkSummary]) -> String {
    let mut out = String::new();
    if items.is_empty() {
        let _ = writeln!(out, "No benchmarks found.");
        return out;
    }
    for b in items {
        let _ = writeln!(
            out,
            "#{:<6} {:<32} {:<10} {}/{}",
            b.id,
            truncate(&b.label, 32),
            b.status.as_str(),
            b.completed_prompts,
            b.total_prompts
        );
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    let line = s.lines().next().unwrap_or("");
    if line.chars().count() > max {
        format!("{}...", line.chars().take(max).collect::<String>())
    } else {
        line.to_string()
    }
}
