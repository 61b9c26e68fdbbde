use crate::model::{Run, TokenUsage};
use crate::normalize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a logical run across fragments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey {
    #[serde(rename = "model_name")]
    pub model: String,
    pub provider: String,
}

impl ModelKey {
    pub fn new(model: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            provider: provider.into(),
        }
    }

    pub fn of(run: &Run) -> Self {
        Self::new(run.model_name.trim(), run.provider.trim())
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.provider.is_empty() {
            write!(f, "{}", self.model)
        } else {
            write!(f, "{} ({})", self.model, self.provider)
        }
    }
}

/// Cost, tokens and latency in canonical units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub cost: f64,
    pub tokens: TokenUsage,
    pub latency_ms: f64,
}

impl Totals {
    pub fn add(&mut self, other: &Totals) {
        self.cost += other.cost;
        self.tokens.add(&other.tokens);
        self.latency_ms += other.latency_ms;
    }

    pub fn of_run(run: &Run) -> Self {
        Self {
            cost: run.total_cost.max(0.0),
            tokens: run.tokens(),
            latency_ms: normalize::run_latency_ms(run),
        }
    }
}

/// All fragments for one (model, provider), in the order they were stored.
/// A fragment's position in `fragments` is its fragment index; later means
/// more recent.
#[derive(Debug, Clone)]
pub struct RunGroup<'a> {
    pub key: ModelKey,
    pub fragments: Vec<&'a Run>,
    pub rollup: Totals,
}

/// Collapses raw runs into one group per (model, provider).
///
/// Each fragment's rollup is added exactly once; fragments are assumed not
/// to overlap at the rollup level.
pub fn group_runs(runs: &[Run]) -> BTreeMap<ModelKey, RunGroup<'_>> {
    let mut groups: BTreeMap<ModelKey, RunGroup<'_>> = BTreeMap::new();
    for run in runs {
        let key = ModelKey::of(run);
        let group = groups.entry(key.clone()).or_insert_with(|| RunGroup {
            key,
            fragments: Vec::new(),
            rollup: Totals::default(),
        });
        group.rollup.add(&Totals::of_run(run));
        group.fragments.push(run);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(model: &str, provider: &str, cost: f64, latency: f64) -> Run {
        Run {
            model_name: model.into(),
            provider: provider.into(),
            total_cost: cost,
            output_tokens: 10,
            latency,
            ..Default::default()
        }
    }

    #[test]
    fn test_fragments_collapse_per_pair() {
        let runs = vec![
            run("gpt-x", "openai", 0.5, 2.0),
            run("claude-y", "anthropic", 1.0, 1500.0),
            run("gpt-x", "openai", 0.25, 1.0),
            run("gpt-x", "azure", 0.1, 1.0),
        ];
        let groups = group_runs(&runs);
        assert_eq!(groups.len(), 3);

        let g = &groups[&ModelKey::new("gpt-x", "openai")];
        assert_eq!(g.fragments.len(), 2);
        assert_eq!(g.rollup.cost, 0.75);
        assert_eq!(g.rollup.tokens.output, 20);
        assert_eq!(g.rollup.latency_ms, 3000.0);
    }

    #[test]
    fn test_key_ignores_surrounding_whitespace() {
        let runs = vec![run("gpt-x ", "openai", 0.0, 0.0), run("gpt-x", " openai", 0.0, 0.0)];
        assert_eq!(group_runs(&runs).len(), 1);
    }

    #[test]
    fn test_rollup_independent_of_order() {
        let mut runs = vec![
            run("m", "p", 0.5, 2.0),
            run("m", "p", 0.25, 1200.0),
            run("m", "p", 0.125, 0.5),
        ];
        let forward = group_runs(&runs)[&ModelKey::new("m", "p")].rollup;
        runs.reverse();
        let backward = group_runs(&runs)[&ModelKey::new("m", "p")].rollup;
        assert_eq!(forward, backward);
    }
}
