use super::dedup::ModelKey;
use super::ReconciledBenchmarkView;
use crate::model::{PromptOutcome, SyncStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncReason {
    /// The model has a row for the prompt but no terminal outcome yet.
    Pending,
    /// Another model ran the prompt; this one has no row for it.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncItem {
    #[serde(flatten)]
    pub model: ModelKey,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<i64>,
    pub reason: SyncReason,
}

/// Non-terminal (model, prompt) pairs of a benchmark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub benchmark_id: i64,
    pub items: Vec<SyncItem>,
    pub models: BTreeSet<ModelKey>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Expresses the plan in the backend's sync-status shape.
    pub fn to_status(&self) -> SyncStatus {
        let names: BTreeSet<&str> = self.models.iter().map(|m| m.model.as_str()).collect();
        SyncStatus {
            sync_needed: !self.is_empty(),
            models_needing_sync: names.into_iter().map(String::from).collect(),
            total_prompts_to_sync: self.items.len() as u64,
        }
    }

    /// True when the backend's view of what needs syncing matches ours.
    pub fn agrees_with(&self, status: &SyncStatus) -> bool {
        let ours = self.to_status();
        let theirs: BTreeSet<&str> = status
            .models_needing_sync
            .iter()
            .map(String::as_str)
            .collect();
        let mine: BTreeSet<&str> = ours
            .models_needing_sync
            .iter()
            .map(String::as_str)
            .collect();
        ours.sync_needed == status.sync_needed
            && ours.total_prompts_to_sync == status.total_prompts_to_sync
            && mine == theirs
    }
}

/// Selects every pair that still needs work. Terminal outcomes, success or
/// error, are never selected.
pub fn select_sync(view: &ReconciledBenchmarkView) -> SyncPlan {
    let mut plan = SyncPlan {
        benchmark_id: view.benchmark_id,
        ..Default::default()
    };

    for model in &view.models {
        for p in model
            .prompts
            .iter()
            .filter(|p| p.outcome == PromptOutcome::Pending)
        {
            plan.items.push(SyncItem {
                model: model.key.clone(),
                prompt: p.prompt.clone(),
                prompt_id: p.prompt_id,
                reason: SyncReason::Pending,
            });
        }
        for missing in &model.missing_prompts {
            plan.items.push(SyncItem {
                model: model.key.clone(),
                prompt: missing.clone(),
                prompt_id: None,
                reason: SyncReason::Missing,
            });
        }
    }

    plan.models = plan.items.iter().map(|i| i.model.clone()).collect();
    plan
}

/// A user-forced re-execution of one prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RerunRequest {
    pub prompt_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Outcome the prompt had before the rerun, when it is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<PromptOutcome>,
}

/// Builds a forced rerun. Unlike [`select_sync`] there is no terminal check:
/// successful and errored prompts can be redone, and an id absent from the
/// view is still passed through.
pub fn select_rerun(view: Option<&ReconciledBenchmarkView>, prompt_id: i64) -> RerunRequest {
    let found = view.and_then(|v| {
        v.models.iter().find_map(|m| {
            m.prompts
                .iter()
                .find(|p| p.prompt_id == Some(prompt_id))
                .map(|p| (m.key.clone(), p.prompt.clone(), p.outcome))
        })
    });

    match found {
        Some((model, prompt, previous)) => RerunRequest {
            prompt_id,
            model: Some(model),
            prompt: Some(prompt),
            previous: Some(previous),
        },
        None => RerunRequest {
            prompt_id,
            model: None,
            prompt: None,
            previous: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Benchmark, PersistedStatus, PromptResult, Run};
    use crate::reconcile::reconcile;

    fn pr(id: i64, prompt: &str, response: Option<&str>) -> PromptResult {
        PromptResult {
            id: Some(id),
            prompt: prompt.into(),
            response: response.map(String::from),
            ..Default::default()
        }
    }

    fn view() -> ReconciledBenchmarkView {
        reconcile(&Benchmark {
            id: 3,
            status: PersistedStatus::Running,
            runs: vec![
                Run {
                    model_name: "a".into(),
                    provider: "x".into(),
                    prompts: vec![pr(1, "P1", Some("ok")), pr(2, "P2", None)],
                    ..Default::default()
                },
                Run {
                    model_name: "b".into(),
                    provider: "y".into(),
                    prompts: vec![pr(3, "P1", Some("ERROR: quota"))],
                    ..Default::default()
                },
            ],
            ..Default::default()
        })
    }

    #[test]
    fn test_selects_pending_and_missing() {
        let plan = select_sync(&view());
        assert_eq!(plan.items.len(), 2);
        assert_eq!(plan.items[0].prompt, "P2");
        assert_eq!(plan.items[0].reason, SyncReason::Pending);
        assert_eq!(plan.items[0].prompt_id, Some(2));
        assert_eq!(plan.items[1].model, ModelKey::new("b", "y"));
        assert_eq!(plan.items[1].reason, SyncReason::Missing);
        assert_eq!(plan.models.len(), 2);

        let status = plan.to_status();
        assert!(status.sync_needed);
        assert_eq!(status.total_prompts_to_sync, 2);
        assert!(plan.agrees_with(&status));
        assert!(!plan.agrees_with(&SyncStatus::default()));
    }

    #[test]
    fn test_rerun_bypasses_terminal_check() {
        let v = view();
        let req = select_rerun(Some(&v), 1);
        assert_eq!(req.previous, Some(PromptOutcome::Success));
        assert_eq!(req.model, Some(ModelKey::new("a", "x")));

        let req = select_rerun(Some(&v), 3);
        assert_eq!(req.previous, Some(PromptOutcome::Error));

        let req = select_rerun(None, 77);
        assert_eq!(req.prompt_id, 77);
        assert!(req.model.is_none());
    }
}
