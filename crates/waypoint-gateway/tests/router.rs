use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{CONTENT_TYPE, LOCATION, REFERER};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use waypoint_core::SharedSettings;
use waypoint_gateway::{App, AppState, GatewayConfig};
use waypoint_redirector::HitMode;
use waypoint_storage::InMemoryStore;

fn app_with_site(site_dir: Option<PathBuf>) -> Router {
    let state = AppState::new(
        Arc::new(InMemoryStore::new()),
        SharedSettings::default(),
        GatewayConfig::builder()
            .ip_hash_salt("test-salt")
            .hit_mode(HitMode::Inline)
            .build(),
    );
    App::router(state, site_dir)
}

fn app() -> Router {
    app_with_site(None)
}

fn visit(uri: &str, client: &str) -> Request<Body> {
    let addr: SocketAddr = format!("{client}:40000").parse().unwrap();
    Request::builder()
        .uri(uri)
        .header(REFERER, "https://ref.example/post")
        .extension(ConnectInfo(addr))
        .body(Body::empty())
        .unwrap()
}

fn api(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

async fn create_rule(app: &Router, body: Value) -> Value {
    let (status, _, rule) = send(app, api(Method::POST, "/_admin/v1/rules", Some(body))).await;
    assert_eq!(status, StatusCode::CREATED, "{rule}");
    rule
}

async fn not_found_records(app: &Router) -> Value {
    let (status, _, page) = send(app, api(Method::GET, "/_admin/v1/not-found", None)).await;
    assert_eq!(status, StatusCode::OK);
    page
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, _, body) = send(&app(), api(Method::GET, "/_admin/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn exact_rule_redirects_and_counts_the_hit() {
    let app = app();
    let rule = create_rule(
        &app,
        json!({ "source": "/old", "destination": "/new", "redirect_type": 301, "active": true }),
    )
    .await;

    let (status, headers, _) = send(&app, visit("/old?utm=1", "203.0.113.7")).await;
    assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(headers[LOCATION], "/new");

    let id = rule["id"].as_u64().unwrap();
    let (_, _, rule) = send(&app, api(Method::GET, &format!("/_admin/v1/rules/{id}"), None)).await;
    assert_eq!(rule["hit_count"], 1);
}

#[tokio::test]
async fn regex_rule_expands_captures() {
    let app = app();
    create_rule(
        &app,
        json!({
            "source": "^/blog/(\\d+)$",
            "destination": "/posts/$1",
            "match_type": "regex",
            "redirect_type": 307,
            "active": true
        }),
    )
    .await;

    let (status, headers, _) = send(&app, visit("/blog/42", "203.0.113.7")).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(headers[LOCATION], "/posts/42");
}

#[tokio::test]
async fn unanchored_regex_rewrites_the_matched_prefix() {
    let app = app();
    create_rule(
        &app,
        json!({
            "source": "^/blog/",
            "destination": "/news/",
            "match_type": "regex",
            "active": true
        }),
    )
    .await;

    let (status, headers, _) = send(&app, visit("/blog/post-1", "203.0.113.7")).await;
    assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(headers[LOCATION], "/news/post-1");
}

#[tokio::test]
async fn inactive_rule_is_not_applied_until_toggled() {
    let app = app();
    let rule = create_rule(&app, json!({ "source": "/later", "destination": "/now" })).await;
    assert_eq!(rule["status"], "inactive");

    let (status, _, _) = send(&app, visit("/later", "203.0.113.7")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let id = rule["id"].as_u64().unwrap();
    let (status, _, rule) = send(
        &app,
        api(Method::POST, &format!("/_admin/v1/rules/{id}/toggle"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rule["status"], "active");

    let (status, headers, _) = send(&app, visit("/later", "203.0.113.7")).await;
    assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(headers[LOCATION], "/now");
}

#[tokio::test]
async fn misses_from_two_clients_aggregate_into_one_record() {
    let app = app();

    for client in ["203.0.113.7", "198.51.100.2"] {
        let (status, _, _) = send(&app, visit("/missing-page", client)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let page = not_found_records(&app).await;
    assert_eq!(page["total"], 1);
    let record = &page["items"][0];
    assert_eq!(record["url"], "/missing-page");
    assert_eq!(record["hit_count"], 2);
    assert_eq!(record["referrer"], "https://ref.example/post");
    assert_eq!(record["status"], "new");
    let hash = record["ip_hash"].as_str().unwrap();
    assert_eq!(hash.len(), 64);
    assert_ne!(hash, "198.51.100.2");
}

#[tokio::test]
async fn management_misses_are_not_recorded() {
    let app = app();

    let (status, _, body) = send(&app, api(Method::GET, "/_admin/v1/rules/999", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    assert_eq!(not_found_records(&app).await["total"], 0);
}

#[tokio::test]
async fn self_loop_is_rejected_with_violations() {
    let app = app();

    let (status, _, body) = send(
        &app,
        api(
            Method::POST,
            "/_admin/v1/rules",
            Some(json!({ "source": "/same", "destination": "/same", "active": true })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_failed");
    assert_eq!(body["violations"][0]["code"], "self_loop");

    let (_, _, page) = send(&app, api(Method::GET, "/_admin/v1/rules", None)).await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn self_loop_through_query_string_is_rejected() {
    let app = app();

    let (status, _, body) = send(
        &app,
        api(
            Method::POST,
            "/_admin/v1/rules",
            Some(json!({ "source": "/old?x=1", "destination": "/old", "active": true })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["violations"][0]["code"], "self_loop");

    // nothing was stored
    let (status, _, _) = send(&app, visit("/old", "203.0.113.7")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn nested_quantifier_is_rejected() {
    let app = app();

    let (status, _, body) = send(
        &app,
        api(
            Method::POST,
            "/_admin/v1/rules",
            Some(json!({ "source": "(a+)+", "destination": "/x", "match_type": "regex" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_failed");
}

#[tokio::test]
async fn converted_record_redirects_and_is_marked() {
    let app = app();
    send(&app, visit("/gone", "203.0.113.7")).await;
    let id = not_found_records(&app).await["items"][0]["id"]
        .as_u64()
        .unwrap();

    let (status, _, conversion) = send(
        &app,
        api(
            Method::POST,
            &format!("/_admin/v1/not-found/{id}/convert"),
            Some(json!({ "destination": "/found" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(conversion["record_deleted"], false);
    assert_eq!(conversion["rule"]["source"], "/gone");
    assert_eq!(conversion["rule"]["status"], "active");

    let (status, headers, _) = send(&app, visit("/gone", "203.0.113.7")).await;
    assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(headers[LOCATION], "/found");

    let (_, _, record) = send(
        &app,
        api(Method::GET, &format!("/_admin/v1/not-found/{id}"), None),
    )
    .await;
    assert_eq!(record["status"], "redirected");
}

#[tokio::test]
async fn bulk_actions_report_affected_rows() {
    let app = app();
    let a = create_rule(&app, json!({ "source": "/a", "destination": "/x" })).await;
    let b = create_rule(&app, json!({ "source": "/b", "destination": "/x" })).await;

    let (status, _, body) = send(
        &app,
        api(
            Method::POST,
            "/_admin/v1/rules/bulk",
            Some(json!({ "action": "activate", "ids": [a["id"], b["id"]] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["affected"], 2);

    let (_, _, page) = send(&app, api(Method::GET, "/_admin/v1/rules?status=active", None)).await;
    assert_eq!(page["total"], 2);

    send(&app, visit("/nothing-here", "203.0.113.7")).await;
    let id = not_found_records(&app).await["items"][0]["id"].clone();
    let (_, _, body) = send(
        &app,
        api(
            Method::POST,
            "/_admin/v1/not-found/bulk",
            Some(json!({ "action": "ignore", "ids": [id] })),
        ),
    )
    .await;
    assert_eq!(body["affected"], 1);

    let (_, _, page) = send(
        &app,
        api(Method::GET, "/_admin/v1/not-found?status=ignored", None),
    )
    .await;
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn disabling_logging_through_settings_stops_recording() {
    let app = app();

    let (status, _, settings) = send(
        &app,
        api(
            Method::PUT,
            "/_admin/v1/settings",
            Some(json!({ "logging_enabled": false })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["logging_enabled"], false);
    assert_eq!(settings["retention_days"], 30);

    send(&app, visit("/quiet", "203.0.113.7")).await;
    assert_eq!(not_found_records(&app).await["total"], 0);
}

#[tokio::test]
async fn report_aggregates_rules_and_misses() {
    let app = app();
    create_rule(
        &app,
        json!({ "source": "/old", "destination": "/new", "active": true }),
    )
    .await;
    for _ in 0..3 {
        send(&app, visit("/old", "203.0.113.7")).await;
    }
    send(&app, visit("/lost", "203.0.113.7")).await;

    let (status, _, report) = send(&app, api(Method::GET, "/_admin/v1/report", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["rules"]["active"], 1);
    assert_eq!(report["rules"]["saved_visits"], 3);
    assert_eq!(report["not_found"]["unhandled_hits"], 1);
    assert_eq!(report["recovery_rate"], 75);
}

#[tokio::test]
async fn site_directory_is_served_and_its_misses_recorded() {
    let dir = std::env::temp_dir().join(format!("waypoint-site-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("about.html"), "<h1>about</h1>").unwrap();

    let app = app_with_site(Some(dir.clone()));

    let (status, _, _) = send(&app, visit("/about.html", "203.0.113.7")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&app, visit("/contact.html", "203.0.113.7")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let page = not_found_records(&app).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["url"], "/contact.html");

    std::fs::remove_dir_all(dir).unwrap();
}
