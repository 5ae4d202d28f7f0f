//! Core types and traits for the Waypoint redirect engine.
//!
//! This crate provides the rule and 404 model, path normalization, pattern
//! compilation and validation, and the store and cache contracts shared by
//! the redirector, the 404 tracker and the management plane.

pub mod cache;
pub mod error;
pub mod model;
pub mod path;
pub mod pattern;
pub mod repository;
pub mod settings;
pub mod validate;

pub use cache::{ExactIndex, RegexCandidate, RegexList, RuleCache};
pub use error::{CacheError, PatternError, Result, StorageError};
pub use model::{
    MatchType, NotFoundId, NotFoundObservation, NotFoundQuery, NotFoundRecord, NotFoundSort,
    NotFoundStats, NotFoundStatus, Page, Pagination, RedirectRule, RedirectType, RuleDraft,
    RuleId, RuleQuery, RuleSort, RuleStats, RuleStatus, SortOrder, ValidatedRule,
};
pub use path::NormalizedPath;
pub use pattern::{CompiledPattern, MatchBudget};
pub use repository::{NotFoundStore, ReadRuleStore, RuleStore};
pub use settings::{Settings, SharedSettings};
pub use validate::{validate_rule, ValidationError, Violation};
