use crate::error::{CacheError, PatternError};
use crate::model::RedirectRule;
use crate::pattern::{CompiledPattern, MatchBudget};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Active exact rules keyed by their normalized source path.
pub type ExactIndex = HashMap<String, RedirectRule>;

/// An active regex rule paired with its compiled pattern.
///
/// A stored pattern that no longer compiles keeps its error here so the
/// matcher can skip it without failing the whole list.
#[derive(Debug, Clone)]
pub struct RegexCandidate {
    pub rule: RedirectRule,
    pub pattern: std::result::Result<Arc<CompiledPattern>, PatternError>,
}

impl RegexCandidate {
    pub fn compile(rule: RedirectRule, budget: &MatchBudget) -> Self {
        let pattern = CompiledPattern::compile(&rule.source, budget).map(Arc::new);
        Self { rule, pattern }
    }
}

/// Active regex rules in evaluation order.
pub type RegexList = Vec<RegexCandidate>;

/// A time-bounded view of the active rule set.
///
/// Implementations publish whole snapshots: a reader observes either the
/// previous complete index or the next one, never a partially built one.
#[async_trait]
pub trait RuleCache: Send + Sync + 'static {
    /// Returns the exact-match index, rebuilding it if absent or expired.
    async fn exact_index(&self) -> Result<Arc<ExactIndex>>;

    /// Returns the regex candidates in creation order, rebuilding them if
    /// absent or expired.
    async fn regex_list(&self) -> Result<Arc<RegexList>>;

    /// Drops both views. The next read rebuilds from the store.
    async fn invalidate(&self);
}

/// Builds an exact index from active exact rules.
pub fn build_exact_index(rules: Vec<RedirectRule>) -> ExactIndex {
    let mut index = HashMap::with_capacity(rules.len());
    for rule in rules {
        // first rule for a source wins, as in creation order
        index.entry(rule.source.clone()).or_insert(rule);
    }
    index
}

/// Compiles active regex rules, preserving their order.
pub fn build_regex_list(rules: Vec<RedirectRule>, budget: &MatchBudget) -> RegexList {
    rules
        .into_iter()
        .map(|rule| RegexCandidate::compile(rule, budget))
        .collect()
}
