use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use waypoint_core::cache::{build_exact_index, build_regex_list, Result};
use waypoint_core::{
    CacheError, ExactIndex, MatchBudget, MatchType, RedirectRule, RedirectType, RegexList,
    RuleCache, RuleId, RuleStatus,
};

/// A rule cache over a fixed rule set, no store behind it.
pub(crate) struct StaticRuleCache {
    exact: Arc<ExactIndex>,
    regex: Arc<RegexList>,
}

impl StaticRuleCache {
    pub(crate) fn new(rules: Vec<RedirectRule>) -> Self {
        let (exact, regex): (Vec<_>, Vec<_>) = rules
            .into_iter()
            .partition(|r| r.match_type == MatchType::Exact);
        Self {
            exact: Arc::new(build_exact_index(exact)),
            regex: Arc::new(build_regex_list(regex, &MatchBudget::default())),
        }
    }
}

#[async_trait]
impl RuleCache for StaticRuleCache {
    async fn exact_index(&self) -> Result<Arc<ExactIndex>> {
        Ok(Arc::clone(&self.exact))
    }

    async fn regex_list(&self) -> Result<Arc<RegexList>> {
        Ok(Arc::clone(&self.regex))
    }

    async fn invalidate(&self) {}
}

pub(crate) struct FailingRuleCache;

#[async_trait]
impl RuleCache for FailingRuleCache {
    async fn exact_index(&self) -> Result<Arc<ExactIndex>> {
        Err(CacheError::Unavailable("rule store offline".to_string()))
    }

    async fn regex_list(&self) -> Result<Arc<RegexList>> {
        Err(CacheError::Unavailable("rule store offline".to_string()))
    }

    async fn invalidate(&self) {}
}

fn rule(id: u64, source: &str, destination: &str, match_type: MatchType) -> RedirectRule {
    RedirectRule {
        id: RuleId(id),
        source: source.to_string(),
        destination: destination.to_string(),
        match_type,
        redirect_type: RedirectType::Permanent,
        hit_count: 0,
        status: RuleStatus::Active,
        created_at: Timestamp::UNIX_EPOCH,
        updated_at: Timestamp::UNIX_EPOCH,
    }
}

pub(crate) fn exact_rule(id: u64, source: &str, destination: &str) -> RedirectRule {
    rule(id, source, destination, MatchType::Exact)
}

pub(crate) fn regex_rule(id: u64, source: &str, destination: &str) -> RedirectRule {
    rule(id, source, destination, MatchType::Regex)
}
