use super::dedup::RunGroup;
use crate::model::{PromptOutcome, PromptResult};
use std::collections::BTreeMap;

/// Best-known outcome for one prompt text within a logical run.
#[derive(Debug, Clone)]
pub struct MergedPrompt<'a> {
    pub result: &'a PromptResult,
    pub outcome: PromptOutcome,
    /// Index of the fragment the winning attempt came from.
    pub fragment: usize,
    /// Number of stored attempts seen for this prompt text.
    pub attempts: usize,
}

impl MergedPrompt<'_> {
    /// Whether `candidate`, seen in fragment `fragment`, replaces the current
    /// winner. Terminal outcomes beat pending ones; otherwise the more recent
    /// fragment wins, and within one fragment the later row wins.
    fn superseded_by(&self, candidate: PromptOutcome, fragment: usize) -> bool {
        match (self.outcome.is_terminal(), candidate.is_terminal()) {
            (true, false) => false,
            (false, true) => true,
            _ => fragment >= self.fragment,
        }
    }
}

/// Deduplicated prompt set of one logical run, keyed by prompt text.
#[derive(Debug, Clone, Default)]
pub struct MergedPrompts<'a> {
    pub prompts: BTreeMap<&'a str, MergedPrompt<'a>>,
}

impl<'a> MergedPrompts<'a> {
    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn get(&self, prompt: &str) -> Option<&MergedPrompt<'a>> {
        self.prompts.get(prompt)
    }

    pub fn count(&self, outcome: PromptOutcome) -> usize {
        self.prompts
            .values()
            .filter(|m| m.outcome == outcome)
            .count()
    }

    pub fn terminal(&self) -> usize {
        self.prompts
            .values()
            .filter(|m| m.outcome.is_terminal())
            .count()
    }

    pub fn successful(&self) -> impl Iterator<Item = &MergedPrompt<'a>> {
        self.prompts
            .values()
            .filter(|m| m.outcome == PromptOutcome::Success)
    }
}

/// Merges every attempt across the group's fragments into one result per
/// prompt text.
pub fn merge_prompts<'a>(group: &RunGroup<'a>) -> MergedPrompts<'a> {
    let mut merged = MergedPrompts::default();
    for (fragment, run) in group.fragments.iter().copied().enumerate() {
        for result in &run.prompts {
            let outcome = result.outcome();
            let key = result.prompt.as_str();
            match merged.prompts.get_mut(key) {
                Some(current) => {
                    current.attempts += 1;
                    if current.superseded_by(outcome, fragment) {
                        current.result = result;
                        current.outcome = outcome;
                        current.fragment = fragment;
                    }
                }
                None => {
                    merged.prompts.insert(
                        key,
                        MergedPrompt {
                            result,
                            outcome,
                            fragment,
                            attempts: 1,
                        },
                    );
                }
            }
        }
    }
    merged
}
