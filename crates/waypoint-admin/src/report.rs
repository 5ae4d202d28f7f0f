use serde::Serialize;
use waypoint_core::{NotFoundStats, RuleStats};

/// Dashboard aggregates over rules and 404 records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Report {
    pub rules: RuleStats,
    pub not_found: NotFoundStats,
    /// Share of tracked traffic that was rescued by a permanent redirect,
    /// as a whole percentage.
    pub recovery_rate: u32,
}

impl Report {
    pub fn new(rules: RuleStats, not_found: NotFoundStats) -> Self {
        Self {
            recovery_rate: recovery_rate(rules.saved_visits, not_found.unhandled_hits),
            rules,
            not_found,
        }
    }
}

/// `round(saved / (saved + unhandled) * 100)`, or `0` with no traffic.
pub fn recovery_rate(saved: u64, unhandled: u64) -> u32 {
    let total = saved.saturating_add(unhandled);
    if total == 0 {
        return 0;
    }
    (saved as f64 / total as f64 * 100.0).round() as u32
}
