//! Time-bounded snapshots of the active redirect rules.
//!
//! [`MokaRuleCache`] keeps two views of the active rule set, an exact-match
//! index and an ordered list of compiled regex candidates, each rebuilt from
//! the store at most once per expiry or invalidation.

pub mod rules;

pub use rules::{MokaRuleCache, RuleCacheConfig, DEFAULT_TTL};
pub use waypoint_core::{CacheError, RuleCache};
