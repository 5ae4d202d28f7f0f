mod health;
mod not_found;
mod rules;

pub use health::*;
pub use not_found::*;
pub use rules::*;

use serde::Serialize;
use waypoint_core::Violation;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<Violation>>,
}

/// Number of records touched by a bulk action.
#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub affected: u64,
}
