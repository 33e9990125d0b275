//! Operator decisions: which records to include, and whether to proceed.

use crate::differ::Classification;
use crate::record::NaturalKey;
use crate::report::PlanSummary;
use crate::schema::EntityType;
use std::collections::BTreeSet;

/// A record offered to a [`Selector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Natural key of the record.
    pub key: NaturalKey,
    /// How the record compares to the destination.
    pub class: Classification,
    /// Human-readable description.
    pub description: String,
}

/// Result of a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Include exactly these keys.
    Chosen(BTreeSet<NaturalKey>),
    /// Abort the whole run.
    Cancelled,
}

/// Narrows the candidate records of one entity type.
pub trait Selector {
    /// Chooses among `candidates` or cancels the run.
    fn select(&mut self, entity: &EntityType, candidates: &[Candidate]) -> Selection;
}

/// Selects every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Selector for PassThrough {
    fn select(&mut self, _entity: &EntityType, candidates: &[Candidate]) -> Selection {
        Selection::Chosen(candidates.iter().map(|c| c.key.clone()).collect())
    }
}

/// Decides whether a previewed plan is applied.
pub trait Confirmer {
    /// Returns true to apply.
    fn confirm(&mut self, summary: &PlanSummary) -> bool;
}

/// Always proceeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl Confirmer for AutoConfirm {
    fn confirm(&mut self, _summary: &PlanSummary) -> bool {
        true
    }
}

impl<F> Confirmer for F
where
    F: FnMut(&PlanSummary) -> bool,
{
    fn confirm(&mut self, summary: &PlanSummary) -> bool {
        self(summary)
    }
}
