use crate::model::PersistedStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    NotStarted,
    InProgress,
    Complete,
}

impl ProgressState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressState::NotStarted => "not_started",
            ProgressState::InProgress => "in_progress",
            ProgressState::Complete => "complete",
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ProgressState::Complete)
    }
}

/// Completion counts a state is derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Completion {
    /// Units with a terminal outcome (success or error).
    pub done: usize,
    /// Units known to exist.
    pub total: usize,
    /// Units expected but absent from the data. Absent never counts as done.
    pub missing: usize,
}

impl Completion {
    pub fn is_full(&self) -> bool {
        self.total > 0 && self.missing == 0 && self.done == self.total
    }
}

/// State of one model. `done`/`total` count prompts, `missing` counts
/// benchmark prompts this model has no record of.
pub fn model_state(c: Completion, persisted: &PersistedStatus) -> ProgressState {
    derive(c.is_full(), c.done == 0, persisted)
}

/// Outcome of reconciling the benchmark-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusDecision {
    pub state: ProgressState,
    /// The data shows completion the persisted status has not caught up with.
    pub overridden: bool,
    /// The persisted status claims completion the data does not support.
    pub persisted_ahead: bool,
}

/// Benchmark-level state. `prompts` counts unique prompt texts complete on
/// every model; `models` counts models complete on every prompt. `any_done`
/// tells whether at least one (model, prompt) pair is terminal.
pub fn benchmark_state(
    prompts: Completion,
    models: Completion,
    any_done: bool,
    persisted: &PersistedStatus,
) -> StatusDecision {
    let full = prompts.is_full() && models.is_full();
    StatusDecision {
        state: derive(full, !any_done, persisted),
        overridden: full && *persisted != PersistedStatus::Completed,
        persisted_ahead: !full && *persisted == PersistedStatus::Completed,
    }
}

fn derive(full: bool, nothing_done: bool, persisted: &PersistedStatus) -> ProgressState {
    if full {
        ProgressState::Complete
    } else if nothing_done && persisted.is_active() {
        ProgressState::NotStarted
    } else {
        ProgressState::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(done: usize, total: usize, missing: usize) -> Completion {
        Completion {
            done,
            total,
            missing,
        }
    }

    #[test]
    fn test_model_states() {
        let running = PersistedStatus::Running;
        assert_eq!(model_state(c(0, 4, 0), &running), ProgressState::NotStarted);
        assert_eq!(model_state(c(2, 4, 0), &running), ProgressState::InProgress);
        assert_eq!(model_state(c(4, 4, 0), &running), ProgressState::Complete);
        // every known prompt done, but one benchmark prompt never recorded
        assert_eq!(model_state(c(3, 3, 1), &running), ProgressState::InProgress);
        assert_eq!(model_state(c(0, 0, 0), &running), ProgressState::NotStarted);
    }

    #[test]
    fn test_untouched_model_on_finished_benchmark_is_stalled() {
        assert_eq!(
            model_state(c(0, 4, 0), &PersistedStatus::Completed),
            ProgressState::InProgress
        );
    }

    #[test]
    fn test_data_overrides_stale_running_flag() {
        let d = benchmark_state(c(2, 2, 0), c(2, 2, 0), true, &PersistedStatus::Running);
        assert_eq!(d.state, ProgressState::Complete);
        assert!(d.overridden);
        assert!(!d.persisted_ahead);
    }

    #[test]
    fn test_persisted_completed_cannot_force_complete() {
        let d = benchmark_state(c(1, 2, 0), c(1, 2, 0), true, &PersistedStatus::Completed);
        assert_eq!(d.state, ProgressState::InProgress);
        assert!(d.persisted_ahead);
        assert!(!d.overridden);
    }

    #[test]
    fn test_empty_benchmark_never_complete() {
        let d = benchmark_state(c(0, 0, 0), c(0, 0, 0), false, &PersistedStatus::Completed);
        assert_ne!(d.state, ProgressState::Complete);
        let d = benchmark_state(c(0, 0, 0), c(0, 0, 0), false, &PersistedStatus::Running);
        assert_eq!(d.state, ProgressState::NotStarted);
    }
}
