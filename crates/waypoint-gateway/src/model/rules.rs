use serde::Deserialize;
use waypoint_core::RuleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleBulkAction {
    Activate,
    Deactivate,
    Delete,
}

#[derive(Debug, Deserialize)]
pub struct RuleBulkRequest {
    pub action: RuleBulkAction,
    pub ids: Vec<RuleId>,
}
