use std::sync::Arc;

use tracing::{trace, warn};
use waypoint_core::cache::Result;
use waypoint_core::{NormalizedPath, RedirectRule, RuleCache};

/// A rule that matched a path, with its destination resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule: RedirectRule,
    /// Final `Location`: the literal destination for exact rules. For regex
    /// rules, the path with every match replaced by the destination template.
    pub location: String,
}

/// Finds the rule that applies to a normalized path.
///
/// Exact rules always take precedence. Regex rules are tried in creation
/// order and the first match wins.
#[derive(Debug)]
pub struct Matcher<C> {
    cache: Arc<C>,
}

impl<C> Clone for Matcher<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<C: RuleCache> Matcher<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    pub async fn find(&self, path: &NormalizedPath) -> Result<Option<RuleMatch>> {
        let exact = self.cache.exact_index().await?;
        if let Some(rule) = exact.get(path.as_str()) {
            trace!(path = %path, rule_id = %rule.id, "exact rule matched");
            return Ok(Some(RuleMatch {
                location: rule.destination.clone(),
                rule: rule.clone(),
            }));
        }

        let candidates = self.cache.regex_list().await?;
        for candidate in candidates.iter() {
            let pattern = match &candidate.pattern {
                Ok(pattern) => pattern,
                Err(err) => {
                    warn!(
                        rule_id = %candidate.rule.id,
                        source = %candidate.rule.source,
                        error = %err,
                        "skipping regex rule that does not compile"
                    );
                    continue;
                }
            };

            if let Some(location) = pattern.substitute(path.as_str(), &candidate.rule.destination) {
                trace!(path = %path, rule_id = %candidate.rule.id, "regex rule matched");
                return Ok(Some(RuleMatch {
                    rule: candidate.rule.clone(),
                    location,
                }));
            }
        }

        Ok(None)
    }
}
