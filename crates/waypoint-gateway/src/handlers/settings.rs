use axum::extract::State;
use axum::Json;
use waypoint_core::Settings;

use crate::state::{AppState, Store};

pub async fn get_settings_handler<S: Store>(State(state): State<AppState<S>>) -> Json<Settings> {
    Json(state.admin().settings())
}

/// Replaces the operator settings. Missing fields take their defaults.
pub async fn update_settings_handler<S: Store>(
    State(state): State<AppState<S>>,
    Json(settings): Json<Settings>,
) -> Json<Settings> {
    Json(state.admin().update_settings(settings))
}
