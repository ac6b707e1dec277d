//! Promotion engine for Depot.
//!
//! Promotion validates and then copies a set of paths from a source store
//! into a target store, with per-path accounting: every path that enters
//! the copy phase ends up in exactly one of `completed`, `skipped`, or
//! `errors`. Validation runs an ordered, pluggable rule pipeline first;
//! a blocking rule failure aborts the whole run before any copy. Rollback
//! undoes a partially-completed run, and a successful promotion clears
//! negative-cache entries for the target and every group it surfaces
//! through.

pub mod error;
pub mod manager;
pub mod model;
pub mod rules;

pub use error::{PromoteError, PromoteResult};
pub use manager::{PromoteConfig, PromotionManager};
pub use model::{PromotionRequest, PromotionResult, ValidationReport};
pub use rules::{
    PathPatternRule, PromotionValidator, ReleaseOnlyRule, RuleContext, RuleSet, SourcePresentRule,
    ValidationRule,
};
