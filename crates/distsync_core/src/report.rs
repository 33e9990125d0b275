//! Run reports: the preview shown before applying and the counts after.
//!
//! Everything here serializes with serde for `--format json`; the `Display`
//! impls are the text rendering.

use crate::plan::Mode;
use crate::rewriter::ResolutionFailure;
use serde::Serialize;
use std::fmt;

/// How many records of a user-content type are listed before eliding.
pub const USER_CONTENT_LISTING_LIMIT: usize = 5;

/// One line of the change listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listed {
    /// `add`, `update` or `delete`.
    pub action: &'static str,
    /// Human-readable record description.
    pub record: String,
}

impl Listed {
    /// Creates a listing line.
    pub fn new(action: &'static str, record: impl Into<String>) -> Self {
        Self {
            action,
            record: record.into(),
        }
    }

    fn marker(&self) -> char {
        match self.action {
            "add" => '+',
            "update" => '~',
            "delete" => '-',
            _ => ' ',
        }
    }
}

/// Preview counts for one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeSummary {
    /// Entity type name.
    pub entity: String,
    /// Whether the type holds user-generated content.
    pub user_content: bool,
    /// Destination rows removed by a reset.
    pub to_clear: usize,
    /// Records to insert.
    pub to_add: usize,
    /// Records to update.
    pub to_update: usize,
    /// Records left as they are.
    pub to_keep: usize,
    /// Records to delete.
    pub to_delete: usize,
    /// Records skipped for unresolved references.
    pub to_skip: usize,
    /// Candidates the selector left out.
    pub not_selected: usize,
    /// The changes, in apply order.
    pub listing: Vec<Listed>,
    /// Why each skipped record was skipped.
    pub skipped: Vec<ResolutionFailure>,
}

impl TypeSummary {
    /// Number of row-level changes.
    pub fn changes(&self) -> usize {
        self.to_clear + self.to_add + self.to_update + self.to_delete
    }
}

/// Preview of a whole plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    /// Run mode.
    #[serde(flatten)]
    pub mode: Mode,
    /// Per-type previews in dependency order.
    pub types: Vec<TypeSummary>,
    /// Warnings for the operator.
    pub notes: Vec<String>,
}

impl PlanSummary {
    /// Number of row-level changes across all types.
    pub fn changes(&self) -> usize {
        self.types.iter().map(TypeSummary::changes).sum()
    }

    /// Returns true if any included type holds user-generated content.
    pub fn includes_user_content(&self) -> bool {
        self.types.iter().any(|t| t.user_content)
    }

    /// Preview of one type.
    pub fn get(&self, entity: &str) -> Option<&TypeSummary> {
        self.types.iter().find(|t| t.entity == entity)
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mode: {}", self.mode)?;
        for t in &self.types {
            writeln!(f)?;
            write!(f, "{}:", t.entity)?;
            if t.to_clear > 0 {
                write!(f, " clear {},", t.to_clear)?;
            }
            writeln!(
                f,
                " add {}, update {}, keep {}, delete {}, skip {}",
                t.to_add, t.to_update, t.to_keep, t.to_delete, t.to_skip
            )?;
            if t.not_selected > 0 {
                writeln!(f, "  ({} not selected)", t.not_selected)?;
            }
            let limit = if t.user_content {
                USER_CONTENT_LISTING_LIMIT
            } else {
                usize::MAX
            };
            for line in t.listing.iter().take(limit) {
                writeln!(f, "  {} {}", line.marker(), line.record)?;
            }
            if t.listing.len() > limit {
                writeln!(f, "  ... and {} more", t.listing.len() - limit)?;
            }
            for failure in &t.skipped {
                writeln!(f, "  ! skipped {failure}")?;
            }
        }
        for note in &self.notes {
            writeln!(f)?;
            writeln!(f, "WARNING: {note}")?;
        }
        Ok(())
    }
}

/// Counts of what an apply actually did for one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    /// Entity type name.
    pub entity: String,
    /// Rows removed by a reset.
    pub cleared: u64,
    /// Rows inserted.
    pub added: usize,
    /// Rows updated.
    pub updated: usize,
    /// Rows deleted.
    pub deleted: usize,
    /// Records skipped for unresolved references.
    pub skipped: usize,
}

/// Counts of a committed apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    /// Per-type counts in apply order.
    pub types: Vec<TypeCounts>,
}

impl ApplySummary {
    /// Counts of one type.
    pub fn get(&self, entity: &str) -> Option<&TypeCounts> {
        self.types.iter().find(|t| t.entity == entity)
    }

    /// Total rows written (inserted, updated or deleted).
    pub fn written(&self) -> usize {
        self.types
            .iter()
            .map(|t| t.added + t.updated + t.deleted)
            .sum()
    }
}

impl fmt::Display for ApplySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in &self.types {
            write!(f, "{}:", t.entity)?;
            if t.cleared > 0 {
                write!(f, " cleared {},", t.cleared)?;
            }
            writeln!(
                f,
                " added {}, updated {}, deleted {}, skipped {}",
                t.added, t.updated, t.deleted, t.skipped
            )?;
        }
        Ok(())
    }
}
