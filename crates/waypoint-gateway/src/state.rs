use std::sync::Arc;
use std::time::Duration;

use typed_builder::TypedBuilder;
use waypoint_admin::RuleAdmin;
use waypoint_cache::{MokaRuleCache, RuleCacheConfig, DEFAULT_TTL};
use waypoint_core::{NotFoundStore, RuleStore, SharedSettings};
use waypoint_redirector::{Dispatcher, HitMode, Redirector};
use waypoint_tracker::{IpHasher, MissRecorder, NotFoundRecorder};

/// A backend that holds both rules and 404 records.
pub trait Store: RuleStore + NotFoundStore {}

impl<T: RuleStore + NotFoundStore> Store for T {}

pub type Admin<S> = RuleAdmin<S, MokaRuleCache<S>>;

#[derive(Debug, Clone, TypedBuilder)]
pub struct GatewayConfig {
    #[builder(default = DEFAULT_TTL)]
    pub cache_ttl: Duration,
    /// Falls back to a random per-process salt when unset or blank.
    #[builder(default, setter(strip_option, into))]
    pub ip_hash_salt: Option<String>,
    #[builder(default)]
    pub hit_mode: HitMode,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Everything a request needs, wired once at startup.
pub struct AppState<S> {
    redirector: Arc<dyn Redirector>,
    recorder: Arc<dyn MissRecorder>,
    admin: Arc<Admin<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            redirector: Arc::clone(&self.redirector),
            recorder: Arc::clone(&self.recorder),
            admin: Arc::clone(&self.admin),
        }
    }
}

impl<S: Store> AppState<S> {
    /// Builds the rule cache, dispatcher, recorder and admin service over
    /// one shared store.
    pub fn new(store: Arc<S>, settings: SharedSettings, config: GatewayConfig) -> Self {
        let cache = Arc::new(MokaRuleCache::with_config(
            Arc::clone(&store),
            RuleCacheConfig::builder().ttl(config.cache_ttl).build(),
        ));
        let dispatcher =
            Dispatcher::new(Arc::clone(&cache), Arc::clone(&store)).with_hit_mode(config.hit_mode);
        let recorder = NotFoundRecorder::new(
            Arc::clone(&store),
            settings.clone(),
            IpHasher::from_configured(config.ip_hash_salt),
        );
        let admin = RuleAdmin::new(store, cache, settings);

        Self {
            redirector: Arc::new(dispatcher),
            recorder: Arc::new(recorder),
            admin: Arc::new(admin),
        }
    }
}

impl<S> AppState<S> {
    pub fn redirector(&self) -> &dyn Redirector {
        self.redirector.as_ref()
    }

    pub fn recorder(&self) -> &dyn MissRecorder {
        self.recorder.as_ref()
    }

    pub fn admin(&self) -> &Admin<S> {
        &self.admin
    }
}
