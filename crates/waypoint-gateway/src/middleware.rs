//! The two request phases around routing.
//!
//! [`redirect_phase`] runs first and may answer with a redirect before any
//! route is consulted. [`not_found_phase`] wraps the routes and records every
//! `404 Not Found` they produce.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{LOCATION, REFERER, USER_AGENT};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};
use waypoint_core::{NormalizedPath, RedirectType};
use waypoint_redirector::{Dispatch, Redirect};
use waypoint_tracker::Miss;

use crate::state::{AppState, Store};

/// Prefix of the management API, which is never redirected.
pub const ADMIN_PREFIX: &str = "/_admin";

fn is_admin_path(path: &str) -> bool {
    path == ADMIN_PREFIX || path.starts_with("/_admin/")
}

pub async fn redirect_phase<S: Store>(
    State(state): State<AppState<S>>,
    mut request: Request,
    next: Next,
) -> Response {
    if is_admin_path(request.uri().path()) {
        return next.run(request).await;
    }

    let raw = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();

    match state.redirector().dispatch(&raw).await {
        Dispatch::Redirect(redirect) => match redirect_response(&redirect) {
            Some(response) => response,
            None => next.run(request).await,
        },
        Dispatch::Continue(path) => {
            request.extensions_mut().insert(path);
            next.run(request).await
        }
    }
}

fn redirect_response(redirect: &Redirect) -> Option<Response> {
    let location = match HeaderValue::from_str(&redirect.location) {
        Ok(location) => location,
        Err(err) => {
            warn!(
                rule_id = %redirect.rule_id,
                location = %redirect.location,
                error = %err,
                "redirect target is not a valid header value, serving request instead"
            );
            return None;
        }
    };

    debug!(rule_id = %redirect.rule_id, status = %redirect.status, "redirecting");
    Some((status_code(redirect.status), [(LOCATION, location)]).into_response())
}

fn status_code(redirect_type: RedirectType) -> StatusCode {
    match redirect_type {
        RedirectType::Permanent => StatusCode::MOVED_PERMANENTLY,
        RedirectType::Found => StatusCode::FOUND,
        RedirectType::Temporary => StatusCode::TEMPORARY_REDIRECT,
    }
}

pub async fn not_found_phase<S: Store>(
    State(state): State<AppState<S>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request
        .extensions()
        .get::<NormalizedPath>()
        .cloned()
        .unwrap_or_else(|| {
            NormalizedPath::new(
                request
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/"),
            )
        });
    let miss = Miss {
        path,
        referrer: header_string(request.headers(), REFERER),
        user_agent: header_string(request.headers(), USER_AGENT),
        client_address: request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip()),
    };

    let response = next.run(request).await;
    if response.status() == StatusCode::NOT_FOUND {
        state.recorder().record(miss).await;
    }
    response
}

fn header_string(headers: &HeaderMap, name: axum::http::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
