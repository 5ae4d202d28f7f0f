use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};
use waypoint_core::{NormalizedPath, NotFoundObservation, NotFoundStore, SharedSettings};

use crate::exclusion::ExclusionPolicy;
use crate::hasher::IpHasher;

/// A not-found response observed by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Miss {
    pub path: NormalizedPath,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub client_address: Option<IpAddr>,
}

impl Miss {
    pub fn new(path: NormalizedPath) -> Self {
        Self {
            path,
            referrer: None,
            user_agent: None,
            client_address: None,
        }
    }
}

/// What happened to a [`Miss`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Stored,
    LoggingDisabled,
    Excluded,
    /// The store rejected the write; the failure was logged.
    Failed,
}

/// The post-routing not-found phase as seen by a host.
#[async_trait]
pub trait MissRecorder: Send + Sync + 'static {
    /// Records a miss. Never fails the caller.
    async fn record(&self, miss: Miss) -> Recorded;
}

/// Aggregates misses into one [`NotFoundRecord`](waypoint_core::NotFoundRecord)
/// per normalized url.
pub struct NotFoundRecorder<S> {
    store: Arc<S>,
    settings: SharedSettings,
    hasher: IpHasher,
    // compiled once per distinct exclusion text
    exclusions: RwLock<Arc<ExclusionPolicy>>,
}

impl<S: NotFoundStore> NotFoundRecorder<S> {
    pub fn new(store: Arc<S>, settings: SharedSettings, hasher: IpHasher) -> Self {
        let exclusions = settings.with_exclude_patterns(ExclusionPolicy::parse);
        Self {
            store,
            settings,
            hasher,
            exclusions: RwLock::new(Arc::new(exclusions)),
        }
    }

    /// Returns the exclusion policy for the current settings, recompiling it
    /// only when the pattern text changed.
    pub fn exclusion_policy(&self) -> Arc<ExclusionPolicy> {
        self.settings.with_exclude_patterns(|text| {
            {
                let current = self.exclusions.read();
                if current.source() == text {
                    return Arc::clone(&current);
                }
            }

            let mut current = self.exclusions.write();
            if current.source() != text {
                debug!("exclusion patterns changed, recompiling");
                *current = Arc::new(ExclusionPolicy::parse(text));
            }
            Arc::clone(&current)
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[async_trait]
impl<S: NotFoundStore> MissRecorder for NotFoundRecorder<S> {
    async fn record(&self, miss: Miss) -> Recorded {
        if !self.settings.logging_enabled() {
            trace!(path = %miss.path, "404 logging disabled");
            return Recorded::LoggingDisabled;
        }

        if self.exclusion_policy().is_excluded(&miss.path) {
            trace!(path = %miss.path, "404 path excluded");
            return Recorded::Excluded;
        }

        let observation = NotFoundObservation {
            url: miss.path.as_str().to_string(),
            referrer: non_empty(miss.referrer),
            user_agent: non_empty(miss.user_agent),
            ip_hash: miss
                .client_address
                .map(|addr| self.hasher.hash(&addr.to_string())),
            seen_at: Timestamp::now(),
        };

        match self.store.upsert_not_found(observation).await {
            Ok(()) => {
                debug!(path = %miss.path, "404 recorded");
                Recorded::Stored
            }
            Err(err) => {
                warn!(path = %miss.path, error = %err, "failed to record 404");
                Recorded::Failed
            }
        }
    }
}
