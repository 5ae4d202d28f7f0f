use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use waypoint_core::{
    validate_rule, MatchType, NotFoundId, NotFoundQuery, NotFoundRecord, NotFoundStatus,
    NotFoundStore, Page, RedirectRule, RuleCache, RuleDraft, RuleId, RuleQuery, RuleStatus,
    RuleStore, Settings, SharedSettings,
};

use crate::error::{AdminError, Result};
use crate::report::Report;

/// Result of turning a 404 record into a redirect rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversion {
    pub rule: RedirectRule,
    /// `true` when the record was deleted instead of marked redirected.
    pub record_deleted: bool,
}

/// The management contract: rule CRUD, 404 triage, reporting and settings.
pub struct RuleAdmin<S, C> {
    store: Arc<S>,
    cache: Arc<C>,
    settings: SharedSettings,
}

impl<S, C> RuleAdmin<S, C>
where
    S: RuleStore + NotFoundStore,
    C: RuleCache,
{
    pub fn new(store: Arc<S>, cache: Arc<C>, settings: SharedSettings) -> Self {
        Self {
            store,
            cache,
            settings,
        }
    }

    pub async fn create_rule(&self, draft: RuleDraft) -> Result<RedirectRule> {
        let validated = validate_rule(&draft)?;
        let rule = self.store.insert_rule(validated).await?;
        self.cache.invalidate().await;

        info!(rule_id = %rule.id, source = %rule.source, "redirect rule created");
        Ok(rule)
    }

    pub async fn update_rule(&self, id: RuleId, draft: RuleDraft) -> Result<RedirectRule> {
        let validated = validate_rule(&draft)?;
        let rule = self
            .store
            .update_rule(id, validated)
            .await?
            .ok_or_else(|| rule_not_found(id))?;
        self.cache.invalidate().await;

        info!(rule_id = %id, "redirect rule updated");
        Ok(rule)
    }

    pub async fn get_rule(&self, id: RuleId) -> Result<RedirectRule> {
        self.store
            .get_rule(id)
            .await?
            .ok_or_else(|| rule_not_found(id))
    }

    /// Deletes a rule. 404 records that were converted into it go back to `new`.
    pub async fn delete_rule(&self, id: RuleId) -> Result<RedirectRule> {
        let deleted = self.store.delete_rule(id).await;
        // the rule may be gone even if a later step fails
        self.cache.invalidate().await;

        let rule = deleted?.ok_or_else(|| rule_not_found(id))?;
        self.store
            .reset_redirected(std::slice::from_ref(&rule.source))
            .await?;

        info!(rule_id = %id, source = %rule.source, "redirect rule deleted");
        Ok(rule)
    }

    pub async fn list_rules(&self, query: &RuleQuery) -> Result<Page<RedirectRule>> {
        Ok(self.store.list_rules(query).await?)
    }

    /// Flips a rule between active and inactive.
    pub async fn toggle_rule(&self, id: RuleId) -> Result<RedirectRule> {
        let rule = self.get_rule(id).await?;
        let status = match rule.status {
            RuleStatus::Active => RuleStatus::Inactive,
            RuleStatus::Inactive => RuleStatus::Active,
        };
        self.set_rule_status(&[id], status).await?;
        self.get_rule(id).await
    }

    /// Sets the status of several rules. Returns how many exist.
    pub async fn set_rule_status(&self, ids: &[RuleId], status: RuleStatus) -> Result<u64> {
        let updated = self.store.set_rule_status(ids, status).await;
        self.cache.invalidate().await;
        let updated = updated?;

        info!(count = updated, status = %status, "redirect rule status changed");
        Ok(updated)
    }

    /// Deletes several rules. Returns how many were deleted.
    pub async fn delete_rules(&self, ids: &[RuleId]) -> Result<u64> {
        let mut sources = Vec::with_capacity(ids.len());
        let deleted = self.delete_each(ids, &mut sources).await;
        self.cache.invalidate().await;
        deleted?;

        self.store.reset_redirected(&sources).await?;

        info!(count = sources.len(), "redirect rules deleted");
        Ok(sources.len() as u64)
    }

    // Stops at the first failure; `sources` keeps what was deleted so far.
    async fn delete_each(&self, ids: &[RuleId], sources: &mut Vec<String>) -> Result<()> {
        for id in ids {
            if let Some(rule) = self.store.delete_rule(*id).await? {
                sources.push(rule.source);
            }
        }
        Ok(())
    }

    pub async fn list_not_found(&self, query: &NotFoundQuery) -> Result<Page<NotFoundRecord>> {
        Ok(self.store.list_not_found(query).await?)
    }

    pub async fn get_not_found(&self, id: NotFoundId) -> Result<NotFoundRecord> {
        self.store
            .get_not_found(id)
            .await?
            .ok_or_else(|| not_found_record_missing(id))
    }

    pub async fn ignore_not_found(&self, ids: &[NotFoundId]) -> Result<u64> {
        self.set_not_found_status(ids, NotFoundStatus::Ignored).await
    }

    pub async fn set_not_found_status(
        &self,
        ids: &[NotFoundId],
        status: NotFoundStatus,
    ) -> Result<u64> {
        let updated = self.store.set_not_found_status(ids, status).await?;
        info!(count = updated, status = %status, "404 record status changed");
        Ok(updated)
    }

    pub async fn delete_not_found(&self, ids: &[NotFoundId]) -> Result<u64> {
        let deleted = self.store.delete_not_found(ids).await?;
        info!(count = deleted, "404 records deleted");
        Ok(deleted)
    }

    /// Creates an active permanent exact rule from a 404 record's url.
    ///
    /// The record is then marked `redirected`, or deleted when
    /// `auto_delete_on_conversion` is set.
    pub async fn convert_not_found(
        &self,
        id: NotFoundId,
        destination: impl Into<String>,
    ) -> Result<Conversion> {
        let record = self.get_not_found(id).await?;

        let rule = self
            .create_rule(RuleDraft {
                source: record.url.clone(),
                destination: destination.into(),
                match_type: Some(MatchType::Exact),
                redirect_type: Some(301),
                active: true,
            })
            .await?;

        let record_deleted = self.settings.auto_delete_on_conversion();
        if record_deleted {
            self.store.delete_not_found(&[id]).await?;
        } else {
            self.store
                .set_not_found_status(&[id], NotFoundStatus::Redirected)
                .await?;
        }

        info!(
            not_found_id = %id,
            rule_id = %rule.id,
            record_deleted,
            "404 record converted into a redirect"
        );
        Ok(Conversion {
            rule,
            record_deleted,
        })
    }

    pub async fn report(&self) -> Result<Report> {
        let rules = self.store.rule_stats().await?;
        let not_found = self.store.not_found_stats().await?;
        Ok(Report::new(rules, not_found))
    }

    pub fn settings(&self) -> Settings {
        self.settings.snapshot()
    }

    pub fn update_settings(&self, settings: Settings) -> Settings {
        info!(
            logging_enabled = settings.logging_enabled,
            retention_days = settings.retention_days,
            "settings updated"
        );
        self.settings.replace(settings.clone());
        settings
    }
}

fn rule_not_found(id: RuleId) -> AdminError {
    AdminError::NotFound(format!("redirect rule {id}"))
}

fn not_found_record_missing(id: NotFoundId) -> AdminError {
    AdminError::NotFound(format!("404 record {id}"))
}
