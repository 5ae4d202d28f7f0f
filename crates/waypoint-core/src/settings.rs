use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Operator-tunable behaviour of the 404 pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether not-found responses are recorded at all.
    pub logging_enabled: bool,
    /// Age in days after which ignored records are purged. `0` keeps them.
    pub retention_days: u32,
    /// Newline-separated exclusion patterns; `*` matches any substring.
    pub exclude_patterns: String,
    /// Delete a 404 record instead of marking it redirected when it is
    /// converted into a rule.
    pub auto_delete_on_conversion: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logging_enabled: true,
            retention_days: DEFAULT_RETENTION_DAYS,
            exclude_patterns: String::new(),
            auto_delete_on_conversion: false,
        }
    }
}

/// Settings shared between the request path and the management plane.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Returns a copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        self.inner.read().clone()
    }

    pub fn logging_enabled(&self) -> bool {
        self.inner.read().logging_enabled
    }

    pub fn retention_days(&self) -> u32 {
        self.inner.read().retention_days
    }

    pub fn auto_delete_on_conversion(&self) -> bool {
        self.inner.read().auto_delete_on_conversion
    }

    /// Runs `f` against the current exclusion pattern text.
    pub fn with_exclude_patterns<T>(&self, f: impl FnOnce(&str) -> T) -> T {
        f(&self.inner.read().exclude_patterns)
    }

    pub fn replace(&self, settings: Settings) {
        *self.inner.write() = settings;
    }
}
