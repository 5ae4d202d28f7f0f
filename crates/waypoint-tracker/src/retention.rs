use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use waypoint_core::{NotFoundStore, Result, SharedSettings};

/// Purges ignored 404 records older than the configured retention window.
pub struct RetentionJob<S> {
    store: Arc<S>,
    settings: SharedSettings,
}

impl<S: NotFoundStore> RetentionJob<S> {
    pub fn new(store: Arc<S>, settings: SharedSettings) -> Self {
        Self { store, settings }
    }

    /// Runs one cleanup pass and returns the number of deleted records.
    ///
    /// A retention of `0` days disables cleanup.
    pub async fn run_once(&self) -> Result<u64> {
        let days = self.settings.retention_days();
        if days == 0 {
            debug!("retention disabled, skipping cleanup");
            return Ok(0);
        }

        let deleted = self.store.delete_ignored_older_than(days).await?;
        info!(days, deleted, "purged ignored 404 records");
        Ok(deleted)
    }

    /// Runs [`run_once`](Self::run_once) every `period`, starting immediately.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = self.run_once().await {
                    warn!(error = %err, "404 retention pass failed");
                }
            }
        })
    }
}
