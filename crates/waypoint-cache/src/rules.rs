use async_trait::async_trait;
use moka::future::Cache;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use typed_builder::TypedBuilder;
use waypoint_core::cache::{build_exact_index, build_regex_list, Result};
use waypoint_core::{
    CacheError, ExactIndex, MatchBudget, MatchType, ReadRuleStore, RegexList, RuleCache,
};

/// Lifetime of a rule snapshot when nothing invalidates it sooner.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Configuration for a [`MokaRuleCache`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct RuleCacheConfig {
    /// How long a snapshot may be served before it is rebuilt.
    #[builder(default = DEFAULT_TTL)]
    ttl: Duration,
    /// Limits applied when regex rules are compiled into the snapshot.
    #[builder(default)]
    budget: MatchBudget,
}

impl Default for RuleCacheConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

// A built view tagged with the invalidation generation it was read under.
struct Snapshot<T> {
    generation: u64,
    value: Arc<T>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            generation: self.generation,
            value: Arc::clone(&self.value),
        }
    }
}

/// Rule cache backed by two single-entry Moka caches.
///
/// Each view is rebuilt through `try_get_with`, so concurrent readers that
/// miss together share one store read. Invalidation bumps a generation
/// counter before dropping the entries; a rebuild that started before the
/// bump is detected on read and discarded, so a reader never keeps serving
/// rules from before a management write once that write has returned.
pub struct MokaRuleCache<S> {
    store: Arc<S>,
    exact: Cache<(), Snapshot<ExactIndex>>,
    regex: Cache<(), Snapshot<RegexList>>,
    generation: AtomicU64,
    config: RuleCacheConfig,
}

impl<S: ReadRuleStore> MokaRuleCache<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, RuleCacheConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: RuleCacheConfig) -> Self {
        let exact = Cache::builder()
            .max_capacity(1)
            .time_to_live(config.ttl)
            .build();
        let regex = Cache::builder()
            .max_capacity(1)
            .time_to_live(config.ttl)
            .build();

        Self {
            store,
            exact,
            regex,
            generation: AtomicU64::new(0),
            config,
        }
    }

    /// Returns the store the snapshots are built from.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    async fn load<T, F, Fut>(
        &self,
        cache: &Cache<(), Snapshot<T>>,
        view: &'static str,
        build: F,
    ) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>> + Send,
    {
        let mut latest = None;

        // one retry covers an invalidation racing the first rebuild
        for _ in 0..2 {
            let snapshot = cache
                .try_get_with((), async {
                    let generation = self.generation.load(Ordering::Acquire);
                    trace!(view, generation, "rule snapshot missing, rebuilding");
                    let value = build().await?;
                    debug!(view, generation, "rule snapshot rebuilt");
                    Ok::<_, CacheError>(Snapshot {
                        generation,
                        value: Arc::new(value),
                    })
                })
                .await
                .map_err(|e| e.as_ref().clone())?;

            if snapshot.generation == self.generation.load(Ordering::Acquire) {
                return Ok(snapshot.value);
            }

            trace!(view, stale = snapshot.generation, "discarding stale rule snapshot");
            cache.invalidate(&()).await;
            latest = Some(snapshot.value);
        }

        latest.ok_or_else(|| CacheError::Operation(format!("{view} snapshot unavailable")))
    }
}

#[async_trait]
impl<S: ReadRuleStore> RuleCache for MokaRuleCache<S> {
    async fn exact_index(&self) -> Result<Arc<ExactIndex>> {
        self.load(&self.exact, "exact", move || async move {
            let rules = self.store.active_rules(MatchType::Exact).await?;
            Ok(build_exact_index(rules))
        })
        .await
    }

    async fn regex_list(&self) -> Result<Arc<RegexList>> {
        self.load(&self.regex, "regex", move || async move {
            let rules = self.store.active_rules(MatchType::Regex).await?;
            Ok(build_regex_list(rules, &self.config.budget))
        })
        .await
    }

    async fn invalidate(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.exact.invalidate(&()).await;
        self.regex.invalidate(&()).await;
        debug!(generation, "rule cache invalidated");
    }
}
