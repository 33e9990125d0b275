//! # distsync Core
//!
//! Reconciliation engine for distsync.
//!
//! This crate provides:
//! - Entity type descriptions and dependency ordering ([`Schema`])
//! - Lifting of store rows into portable [`Record`]s keyed by natural key
//! - Three-way classification of source against destination ([`classify`])
//! - Foreign-key resolution against the destination ([`resolve`])
//! - Plan building for reset and update runs ([`PlanBuilder`])
//! - Transactional apply with full rollback ([`apply`])
//! - The [`Reconciler`], which runs all of the above
//!
//! Stores only ever see their own identifiers. Natural keys are the sole
//! cross-store identity, so inserts let the destination assign identifiers
//! and updates keep the destination's.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
mod config;
mod differ;
mod engine;
mod error;
mod executor;
mod plan;
mod record;
mod report;
mod rewriter;
mod schema;
mod select;

pub use config::{Direction, RunOptions, StoreConfig, DEFAULT_DIST_PATH, DEFAULT_SOURCE_PATH};
pub use differ::{classify, differs, Classification, Classified};
pub use engine::{CancelStage, Planned, Reconciler, RunOutcome, RunReport};
pub use error::{CoreError, CoreResult};
pub use executor::apply;
pub use plan::{Mode, Operation, Plan, PlanBuilder, TypePlan};
pub use record::{lift_all, KeyLookup, NaturalKey, Record};
pub use report::{
    ApplySummary, Listed, PlanSummary, TypeCounts, TypeSummary, USER_CONTENT_LISTING_LIMIT,
};
pub use rewriter::{resolve, DestinationIndex, ResolutionFailure, ResolvedRecord, Slot, Target};
pub use schema::{EntityType, FieldDescriptor, FieldKind, ForeignKey, Schema};
pub use select::{AutoConfirm, Candidate, Confirmer, PassThrough, Selection, Selector};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
