//! Read-side reconciliation of benchmark execution records.
//!
//! Raw runs flow through latency normalization, fragment deduplication and
//! prompt merging, then status reconciliation and metric aggregation. The
//! result is a fresh, immutable view that is a pure function of the input.

pub mod dedup;
pub mod merge;
pub mod metrics;
pub mod status;
pub mod sync;

use crate::model::{Benchmark, PersistedStatus, PromptOutcome, TokenUsage};
use crate::normalize;
use dedup::{ModelKey, Totals};
use metrics::ModelMetrics;
use serde::{Deserialize, Serialize};
use status::{Completion, ProgressState};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptView {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<i64>,
    pub outcome: PromptOutcome,
    pub cost: f64,
    pub tokens: TokenUsage,
    pub latency_ms: f64,
    pub attempts: usize,
    pub fragment: usize,
    #[serde(default)]
    pub web_search_used: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledModelView {
    #[serde(flatten)]
    pub key: ModelKey,
    pub fragments: usize,
    pub state: ProgressState,
    /// Prompts with a terminal outcome, success or error.
    pub completed: usize,
    pub succeeded: usize,
    pub errored: usize,
    pub pending: usize,
    /// Distinct prompt texts across all fragments of this model.
    pub total: usize,
    /// Benchmark prompts this model has no record of at all.
    #[serde(default)]
    pub missing_prompts: Vec<String>,
    pub metrics: ModelMetrics,
    pub rollup_totals: Totals,
    pub per_prompt_totals: Totals,
    pub prompts: Vec<PromptView>,
}

impl ReconciledModelView {
    /// Prompts this model is expected to answer, including missing ones.
    pub fn expected(&self) -> usize {
        self.total + self.missing_prompts.len()
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledBenchmarkView {
    pub benchmark_id: i64,
    pub label: String,
    pub persisted_status: PersistedStatus,
    pub state: ProgressState,
    /// Completion derived from data while the stored status still said otherwise.
    pub status_overridden: bool,
    /// Stored status claims completion that the data does not show.
    pub persisted_ahead: bool,
    pub prompts_complete: usize,
    pub prompts_total: usize,
    pub models_complete: usize,
    pub models_total: usize,
    pub totals: Totals,
    pub models: Vec<ReconciledModelView>,
}

impl ReconciledBenchmarkView {
    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    /// Looks a model up by name, or by its `name (provider)` display form.
    pub fn model(&self, name: &str) -> anyhow::Result<&ReconciledModelView> {
        let name = name.trim();
        if let Some(m) = self
            .models
            .iter()
            .find(|m| m.key.model == name || m.key.to_string() == name)
        {
            return Ok(m);
        }

        let mut candidates: Vec<(f64, &str)> = self
            .models
            .iter()
            .map(|m| (strsim::normalized_levenshtein(name, &m.key.model), m.key.model.as_str()))
            .filter(|(score, _)| *score >= 0.5)
            .collect();
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        match candidates.first() {
            Some((_, best)) => anyhow::bail!(
                "model '{}' not found in benchmark {} (did you mean '{}'?)",
                name,
                self.benchmark_id,
                best
            ),
            None => anyhow::bail!(
                "model '{}' not found in benchmark {}",
                name,
                self.benchmark_id
            ),
        }
    }

    /// SHA-256 over the canonical JSON form. Equal snapshots give equal
    /// fingerprints.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        crate::fingerprint::sha256_hex(&canonical)
    }
}

/// Derives the reconciled view of a benchmark from its raw records.
pub fn reconcile(benchmark: &Benchmark) -> ReconciledBenchmarkView {
    let groups = dedup::group_runs(&benchmark.runs);
    let merged: Vec<_> = groups
        .values()
        .map(|g| (g, merge::merge_prompts(g)))
        .collect();

    let universe: BTreeSet<&str> = merged
        .iter()
        .flat_map(|(_, m)| m.prompts.keys().copied())
        .collect();

    let mut models = Vec::with_capacity(merged.len());
    let mut totals = Totals::default();

    for (group, prompts) in &merged {
        let missing_prompts: Vec<String> = universe
            .iter()
            .filter(|p| prompts.get(p).is_none())
            .map(|p| p.to_string())
            .collect();

        let completion = Completion {
            done: prompts.terminal(),
            total: prompts.len(),
            missing: missing_prompts.len(),
        };
        let state = status::model_state(completion, &benchmark.status);

        let per_prompt = metrics::per_prompt_totals(prompts);
        let model_metrics = metrics::aggregate_model(&group.rollup, prompts);
        let gaps = metrics::cross_validate(&group.rollup, &per_prompt, metrics::DEFAULT_TOLERANCE);
        if !gaps.is_empty() {
            tracing::debug!(
                event = "benchlens.reconcile.rollup_mismatch",
                benchmark_id = benchmark.id,
                model = %group.key,
                gaps = ?gaps,
            );
        }
        totals.add(&model_metrics.totals);

        let prompt_views = prompts
            .prompts
            .values()
            .map(|m| PromptView {
                prompt: m.result.prompt.clone(),
                prompt_id: m.result.id,
                outcome: m.outcome,
                cost: m.result.cost.max(0.0),
                tokens: m.result.tokens(),
                latency_ms: normalize::latency_ms(m.result.latency),
                attempts: m.attempts,
                fragment: m.fragment,
                web_search_used: m.result.web_search_used.unwrap_or(false),
            })
            .collect();

        models.push(ReconciledModelView {
            key: group.key.clone(),
            fragments: group.fragments.len(),
            state,
            completed: completion.done,
            succeeded: prompts.count(PromptOutcome::Success),
            errored: prompts.count(PromptOutcome::Error),
            pending: prompts.count(PromptOutcome::Pending),
            total: prompts.len(),
            missing_prompts,
            metrics: model_metrics,
            rollup_totals: group.rollup,
            per_prompt_totals: per_prompt,
            prompts: prompt_views,
        });
    }

    let prompts_complete = universe
        .iter()
        .filter(|p| {
            merged
                .iter()
                .all(|(_, m)| m.get(p).is_some_and(|mp| mp.outcome.is_terminal()))
        })
        .count();
    let models_complete = models.iter().filter(|m| m.is_complete()).count();
    let any_done = models.iter().any(|m| m.completed > 0);

    let decision = status::benchmark_state(
        Completion {
            done: prompts_complete,
            total: universe.len(),
            missing: 0,
        },
        Completion {
            done: models_complete,
            total: models.len(),
            missing: 0,
        },
        any_done,
        &benchmark.status,
    );

    if decision.overridden {
        tracing::info!(
            event = "benchlens.reconcile.status_override",
            benchmark_id = benchmark.id,
            persisted = benchmark.status.as_str(),
            "benchmark {} is complete by its data; stored status '{}' is stale",
            benchmark.id,
            benchmark.status.as_str()
        );
    }
    if decision.persisted_ahead {
        tracing::warn!(
            event = "benchlens.reconcile.persisted_ahead",
            benchmark_id = benchmark.id,
            prompts_complete,
            prompts_total = universe.len(),
            "benchmark {} is stored as completed but {}/{} prompts are terminal on every model",
            benchmark.id,
            prompts_complete,
            universe.len()
        );
    }

    ReconciledBenchmarkView {
        benchmark_id: benchmark.id,
        label: benchmark.label.clone(),
        persisted_status: benchmark.status.clone(),
        state: decision.state,
        status_overridden: decision.overridden,
        persisted_ahead: decision.persisted_ahead,
        prompts_complete,
        prompts_total: universe.len(),
        models_complete,
        models_total: models.len(),
        totals,
        models,
    }
}
