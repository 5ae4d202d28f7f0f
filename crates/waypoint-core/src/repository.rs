use crate::error::Result;
use crate::model::{
    MatchType, NotFoundId, NotFoundObservation, NotFoundQuery, NotFoundRecord, NotFoundStats,
    NotFoundStatus, Page, RedirectRule, RuleId, RuleQuery, RuleStats, RuleStatus, ValidatedRule,
};
use async_trait::async_trait;

/// Read access to redirect rules, as needed by the request path.
#[async_trait]
pub trait ReadRuleStore: Send + Sync + 'static {
    /// Returns every active rule of the given match type in creation order.
    async fn active_rules(&self, match_type: MatchType) -> Result<Vec<RedirectRule>>;

    /// Retrieves a rule by id. Returns `None` if it does not exist.
    async fn get_rule(&self, id: RuleId) -> Result<Option<RedirectRule>>;

    /// Adds one to the rule's hit counter.
    ///
    /// Must be atomic at the storage layer; concurrent calls never lose
    /// increments. Returns `false` if the rule no longer exists.
    async fn increment_hits(&self, id: RuleId) -> Result<bool>;
}

/// Full rule management used by the management plane.
#[async_trait]
pub trait RuleStore: ReadRuleStore {
    /// Inserts a new rule with a zero hit counter and returns it.
    async fn insert_rule(&self, rule: ValidatedRule) -> Result<RedirectRule>;

    /// Replaces the editable fields of a rule, keeping its hit counter.
    /// Returns `None` if the rule does not exist.
    async fn update_rule(&self, id: RuleId, rule: ValidatedRule) -> Result<Option<RedirectRule>>;

    /// Deletes a rule and returns what was removed.
    async fn delete_rule(&self, id: RuleId) -> Result<Option<RedirectRule>>;

    /// Sets the status of every listed rule. Returns the number of rules found.
    async fn set_rule_status(&self, ids: &[RuleId], status: RuleStatus) -> Result<u64>;

    async fn list_rules(&self, query: &RuleQuery) -> Result<Page<RedirectRule>>;

    async fn rule_stats(&self) -> Result<RuleStats>;
}

/// Storage for aggregated 404 observations.
#[async_trait]
pub trait NotFoundStore: Send + Sync + 'static {
    /// Folds one miss into the record for its url.
    ///
    /// Inserts `hit_count = 1, status = new` for an unseen url; otherwise
    /// increments the counter and overwrites `last_seen`, referrer, user
    /// agent and ip hash. Must be a single atomic increment-or-insert so that
    /// concurrent misses of the same url are all counted.
    async fn upsert_not_found(&self, observation: NotFoundObservation) -> Result<()>;

    async fn get_not_found(&self, id: NotFoundId) -> Result<Option<NotFoundRecord>>;

    async fn find_not_found_by_url(&self, url: &str) -> Result<Option<NotFoundRecord>>;

    async fn list_not_found(&self, query: &NotFoundQuery) -> Result<Page<NotFoundRecord>>;

    /// Sets the status of every listed record. Returns the number found.
    async fn set_not_found_status(&self, ids: &[NotFoundId], status: NotFoundStatus)
        -> Result<u64>;

    /// Moves `redirected` records with one of the given urls back to `new`.
    async fn reset_redirected(&self, urls: &[String]) -> Result<u64>;

    async fn delete_not_found(&self, ids: &[NotFoundId]) -> Result<u64>;

    /// Deletes `ignored` records whose `last_seen` is older than `days` days.
    async fn delete_ignored_older_than(&self, days: u32) -> Result<u64>;

    async fn not_found_stats(&self) -> Result<NotFoundStats>;
}
