use serde::Deserialize;
use waypoint_core::NotFoundId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotFoundBulkAction {
    Ignore,
    /// Puts records back into the `new` state.
    Restore,
    Delete,
}

#[derive(Debug, Deserialize)]
pub struct NotFoundBulkRequest {
    pub action: NotFoundBulkAction,
    pub ids: Vec<NotFoundId>,
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub destination: String,
}
