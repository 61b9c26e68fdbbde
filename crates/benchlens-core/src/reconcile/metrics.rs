//! Cost, token and latency aggregation for one logical run.
//!
//! Two strategies exist: summing the backend's per-fragment rollups, and
//! summing per-prompt values over successful merged prompts. Rollups are
//! preferred per metric family when non-zero because the backend may account
//! for things the prompt rows cannot reconstruct (cached-token discounts).

use super::dedup::Totals;
use super::merge::MergedPrompts;
use crate::normalize;
use serde::{Deserialize, Serialize};

/// Relative difference above which the two strategies are reported as
/// disagreeing.
pub const DEFAULT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSource {
    Rollup,
    PerPrompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSources {
    pub cost: MetricSource,
    pub tokens: MetricSource,
    pub latency: MetricSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub totals: Totals,
    pub sources: MetricSources,
    /// Mean latency per successful prompt, from per-prompt values.
    pub avg_latency_ms: Option<f64>,
    pub web_search_prompts: usize,
}

/// Strategy (b): per-prompt sums over successful merged prompts.
pub fn per_prompt_totals(merged: &MergedPrompts<'_>) -> Totals {
    let mut totals = Totals::default();
    for m in merged.successful() {
        totals.add(&Totals {
            cost: m.result.cost.max(0.0),
            tokens: m.result.tokens(),
            latency_ms: normalize::latency_ms(m.result.latency),
        });
    }
    totals
}

/// Combines the fragment rollups (strategy a) with per-prompt sums
/// (strategy b).
pub fn aggregate_model(rollup: &Totals, merged: &MergedPrompts<'_>) -> ModelMetrics {
    let per_prompt = per_prompt_totals(merged);

    let (cost, cost_src) = pick(rollup.cost, per_prompt.cost);
    let (tokens, tokens_src) = if rollup.tokens.is_zero() {
        (per_prompt.tokens, MetricSource::PerPrompt)
    } else {
        (rollup.tokens, MetricSource::Rollup)
    };
    let (latency_ms, latency_src) = pick(rollup.latency_ms, per_prompt.latency_ms);

    let successful = merged.successful().count();
    let avg_latency_ms = (successful > 0).then(|| per_prompt.latency_ms / successful as f64);
    let web_search_prompts = merged
        .prompts
        .values()
        .filter(|m| m.outcome.is_terminal() && m.result.web_search_used == Some(true))
        .count();

    ModelMetrics {
        totals: Totals {
            cost,
            tokens,
            latency_ms,
        },
        sources: MetricSources {
            cost: cost_src,
            tokens: tokens_src,
            latency: latency_src,
        },
        avg_latency_ms,
        web_search_prompts,
    }
}

fn pick(rollup: f64, per_prompt: f64) -> (f64, MetricSource) {
    if rollup > 0.0 {
        (rollup, MetricSource::Rollup)
    } else {
        (per_prompt, MetricSource::PerPrompt)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discrepancy {
    pub metric: &'static str,
    pub rollup: f64,
    pub per_prompt: f64,
}

/// Compares both strategies metric by metric. Only metrics present on both
/// sides are compared; `tolerance` is relative to the larger value.
pub fn cross_validate(rollup: &Totals, per_prompt: &Totals, tolerance: f64) -> Vec<Discrepancy> {
    let pairs = [
        ("cost", rollup.cost, per_prompt.cost),
        (
            "standard_input_tokens",
            rollup.tokens.standard_input as f64,
            per_prompt.tokens.standard_input as f64,
        ),
        (
            "cached_input_tokens",
            rollup.tokens.cached_input as f64,
            per_prompt.tokens.cached_input as f64,
        ),
        (
            "output_tokens",
            rollup.tokens.output as f64,
            per_prompt.tokens.output as f64,
        ),
        ("latency_ms", rollup.latency_ms, per_prompt.latency_ms),
    ];

    pairs
        .into_iter()
        .filter(|(_, a, b)| *a > 0.0 && *b > 0.0)
        .filter(|(_, a, b)| (a - b).abs() > tolerance * a.max(*b))
        .map(|(metric, rollup, per_prompt)| Discrepancy {
            metric,
            rollup,
            per_prompt,
        })
        .collect()
}
