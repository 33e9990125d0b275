//! Scripted selectors and confirmers.

use distsync_core::{Candidate, Confirmer, EntityType, NaturalKey, PlanSummary, Selection, Selector};
use std::collections::BTreeSet;

/// A selector that keeps candidates whose description matches a predicate,
/// and records what it was offered.
pub struct ScriptedSelector<F> {
    keep: F,
    /// `(entity, candidate descriptions)` per call, in call order.
    pub offered: Vec<(String, Vec<String>)>,
}

impl<F> ScriptedSelector<F>
where
    F: FnMut(&str, &Candidate) -> bool,
{
    /// Creates a selector keeping candidates for which `keep(entity, candidate)`
    /// returns true.
    pub fn new(keep: F) -> Self {
        Self {
            keep,
            offered: Vec::new(),
        }
    }
}

impl<F> Selector for ScriptedSelector<F>
where
    F: FnMut(&str, &Candidate) -> bool,
{
    fn select(&mut self, entity: &EntityType, candidates: &[Candidate]) -> Selection {
        self.offered.push((
            entity.name().to_string(),
            candidates.iter().map(|c| c.description.clone()).collect(),
        ));
        let chosen: BTreeSet<NaturalKey> = candidates
            .iter()
            .filter(|c| (self.keep)(entity.name(), *c))
            .map(|c| c.key.clone())
            .collect();
        Selection::Chosen(chosen)
    }
}

/// A selector that cancels every selection.
#[derive(Debug, Default)]
pub struct CancelSelector {
    /// Number of times it was asked.
    pub calls: usize,
}

impl Selector for CancelSelector {
    fn select(&mut self, _entity: &EntityType, _candidates: &[Candidate]) -> Selection {
        self.calls += 1;
        Selection::Cancelled
    }
}

/// A confirmer with a fixed answer that keeps the summaries it was shown.
#[derive(Debug, Default)]
pub struct RecordingConfirmer {
    answer: bool,
    /// Summaries shown, in order.
    pub shown: Vec<PlanSummary>,
}

impl RecordingConfirmer {
    /// Always answers yes.
    pub fn accept() -> Self {
        Self {
            answer: true,
            shown: Vec::new(),
        }
    }

    /// Always answers no.
    pub fn decline() -> Self {
        Self {
            answer: false,
            shown: Vec::new(),
        }
    }
}

impl Confirmer for RecordingConfirmer {
    fn confirm(&mut self, summary: &PlanSummary) -> bool {
        self.shown.push(summary.clone());
        self.answer
    }
}
