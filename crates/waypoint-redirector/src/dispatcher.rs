use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace, warn};
use waypoint_core::{NormalizedPath, ReadRuleStore, RedirectType, RuleCache, RuleId};

use crate::matcher::{Matcher, RuleMatch};

/// A redirect to emit instead of serving the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    pub status: RedirectType,
    pub rule_id: RuleId,
}

/// Outcome of the pre-routing phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Short-circuit the request with a redirect.
    Redirect(Redirect),
    /// Let the host serve the request. Carries the normalized path so a
    /// later not-found phase records the same key.
    Continue(NormalizedPath),
}

/// How the hit counter of a matched rule is bumped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HitMode {
    /// On a detached tokio task, off the response path.
    #[default]
    Detached,
    /// Awaited before the redirect is returned.
    Inline,
}

/// The pre-routing phase as seen by a host.
#[async_trait]
pub trait Redirector: Send + Sync + 'static {
    /// Decides whether `raw_path` (path plus optional query) is redirected.
    ///
    /// Never fails: internal errors are logged and yield
    /// [`Dispatch::Continue`].
    async fn dispatch(&self, raw_path: &str) -> Dispatch;
}

/// Matches requests against the rule cache and counts hits in the store.
pub struct Dispatcher<C, S> {
    matcher: Matcher<C>,
    store: Arc<S>,
    hit_mode: HitMode,
}

impl<C: RuleCache, S: ReadRuleStore> Dispatcher<C, S> {
    pub fn new(cache: Arc<C>, store: Arc<S>) -> Self {
        Self {
            matcher: Matcher::new(cache),
            store,
            hit_mode: HitMode::default(),
        }
    }

    pub fn with_hit_mode(mut self, hit_mode: HitMode) -> Self {
        self.hit_mode = hit_mode;
        self
    }

    pub fn matcher(&self) -> &Matcher<C> {
        &self.matcher
    }

    async fn record_hit(&self, rule_id: RuleId) {
        match self.hit_mode {
            HitMode::Inline => increment(self.store.as_ref(), rule_id).await,
            HitMode::Detached => {
                let store = Arc::clone(&self.store);
                tokio::spawn(async move {
                    increment(store.as_ref(), rule_id).await;
                });
            }
        }
    }
}

async fn increment<S: ReadRuleStore>(store: &S, rule_id: RuleId) {
    match store.increment_hits(rule_id).await {
        Ok(true) => trace!(rule_id = %rule_id, "hit counted"),
        Ok(false) => debug!(rule_id = %rule_id, "rule vanished before its hit was counted"),
        Err(err) => warn!(rule_id = %rule_id, error = %err, "failed to count redirect hit"),
    }
}

#[async_trait]
impl<C: RuleCache, S: ReadRuleStore> Redirector for Dispatcher<C, S> {
    async fn dispatch(&self, raw_path: &str) -> Dispatch {
        let path = NormalizedPath::new(raw_path);

        let found = match self.matcher.find(&path).await {
            Ok(found) => found,
            Err(err) => {
                warn!(path = %path, error = %err, "rule lookup failed, serving request as is");
                return Dispatch::Continue(path);
            }
        };

        let Some(RuleMatch { rule, location }) = found else {
            trace!(path = %path, "no redirect rule applies");
            return Dispatch::Continue(path);
        };

        self.record_hit(rule.id).await;

        debug!(
            path = %path,
            rule_id = %rule.id,
            location = %location,
            status = %rule.redirect_type,
            "redirecting"
        );
        Dispatch::Redirect(Redirect {
            location,
            status: rule.redirect_type,
            rule_id: rule.id,
        })
    }
}
