use axum::extract::State;
use axum::Json;
use waypoint_admin::Report;

use crate::error::Result;
use crate::state::{AppState, Store};

pub async fn report_handler<S: Store>(State(state): State<AppState<S>>) -> Result<Json<Report>> {
    Ok(Json(state.admin().report().await?))
}
