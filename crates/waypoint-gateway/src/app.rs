use std::path::PathBuf;

use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    bulk_not_found_handler, bulk_rules_handler, convert_not_found_handler, create_rule_handler,
    delete_not_found_handler, delete_rule_handler, get_not_found_handler, get_rule_handler,
    get_settings_handler, health_handler, list_not_found_handler, list_rules_handler,
    report_handler, toggle_rule_handler, update_rule_handler, update_settings_handler,
};
use crate::middleware::{not_found_phase, redirect_phase};
use crate::state::{AppState, Store};

pub struct App {}

impl App {
    /// Builds the full router.
    ///
    /// Requests that match no management route fall back to `site_dir`, or
    /// to a bare 404 when no site is served.
    pub fn router<S: Store>(state: AppState<S>, site_dir: Option<PathBuf>) -> Router {
        let router = Router::new()
            .route("/_admin/health", get(health_handler))
            .nest("/_admin/v1", Self::management::<S>());

        let router = match site_dir {
            Some(dir) => router.fallback_service(ServeDir::new(dir)),
            None => router.fallback(|| async { StatusCode::NOT_FOUND }),
        };

        router
            .layer(from_fn_with_state(state.clone(), not_found_phase::<S>))
            .layer(from_fn_with_state(state.clone(), redirect_phase::<S>))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    fn management<S: Store>() -> Router<AppState<S>> {
        Router::new()
            .route(
                "/rules",
                get(list_rules_handler::<S>).post(create_rule_handler::<S>),
            )
            .route("/rules/bulk", post(bulk_rules_handler::<S>))
            .route(
                "/rules/{id}",
                get(get_rule_handler::<S>)
                    .put(update_rule_handler::<S>)
                    .delete(delete_rule_handler::<S>),
            )
            .route("/rules/{id}/toggle", post(toggle_rule_handler::<S>))
            .route("/not-found", get(list_not_found_handler::<S>))
            .route("/not-found/bulk", post(bulk_not_found_handler::<S>))
            .route(
                "/not-found/{id}",
                get(get_not_found_handler::<S>).delete(delete_not_found_handler::<S>),
            )
            .route("/not-found/{id}/convert", post(convert_not_found_handler::<S>))
            .route("/report", get(report_handler::<S>))
            .route(
                "/settings",
                get(get_settings_handler::<S>).put(update_settings_handler::<S>),
            )
    }
}
