//! End-to-end tests for the admin token API.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; Edge
//! Config is replaced by a wiremock server, so every store read and write the
//! handlers perform is observable (and countable) here.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, SubsecRound, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use edge_tokens::config::{Config, EdgeConfigSettings};
use edge_tokens::models::token::hash_secret;
use edge_tokens::{api, AppState};

const ADMIN: &str = "admin-secret";
const ITEMS_PATH: &str = "/v1/edge-config/ecfg_test/items";

fn app_for(server: &MockServer) -> Router {
    let config = Config {
        port: 0,
        admin_token: Some(ADMIN.into()),
        edge_config: Some(EdgeConfigSettings {
            config_id: "ecfg_test".into(),
            rw_token: "rw-token".into(),
            base_url: format!("{}/v1/edge-config", server.uri()),
        }),
        ..Default::default()
    };
    api::app(Arc::new(AppState::from_config(config).unwrap()))
}

fn request(method: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri("/token")
        .header("authorization", format!("Bearer {}", ADMIN))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn mount_patch_ok(server: &MockServer, expected_calls: u64) {
    Mock::given(method("PATCH"))
        .and(path(ITEMS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_item(server: &MockServer, id: &str, value: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/edge-config/ecfg_test/item/token_{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key": format!("token_{}", id),
            "value": value,
        })))
        .mount(server)
        .await;
}

/// Bodies of every PATCH the store received, in order.
async fn patch_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == "PATCH")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

/// `YYYY-MM-DDTHH:MM:SS.sssZ`
fn assert_millis_timestamp(raw: &str) {
    assert_eq!(raw.len(), 24, "{}", raw);
    assert_eq!(&raw[19..20], ".", "{}", raw);
    assert!(raw[20..23].bytes().all(|b| b.is_ascii_digit()), "{}", raw);
    assert!(raw.ends_with('Z'), "{}", raw);
}

fn stored_record(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "hash": hash_secret("original"),
        "status": status,
        "createdAt": "2024-01-01T00:00:00.000Z",
        "expiresAt": "2024-01-02T00:00:00.000Z",
    })
}

// ── Issue ────────────────────────────────────────────────────

#[tokio::test]
async fn test_issue_with_ttl_returns_plaintext_once_and_stores_digest() {
    let server = MockServer::start().await;
    mount_patch_ok(&server, 1).await;
    let app = app_for(&server);

    let before = Utc::now();
    let (status, body) = send(&app, request("POST", json!({"ttlSeconds": 3600}))).await;
    let after = Utc::now();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "active");
    let token = body["token"].as_str().unwrap();
    assert_eq!(token.len(), 43);
    let id = body["id"].as_str().unwrap();

    let expires_raw = body["expiresAt"].as_str().unwrap();
    assert_millis_timestamp(expires_raw);
    let expires: DateTime<Utc> = expires_raw.parse().unwrap();
    assert!(expires >= before.trunc_subsecs(3) + chrono::Duration::seconds(3600));
    assert!(expires <= after + chrono::Duration::seconds(3600));

    let patches = patch_bodies(&server).await;
    assert_eq!(patches.len(), 1);
    let item = &patches[0]["items"][0];
    assert_eq!(item["operation"], "upsert");
    assert_eq!(item["key"], format!("token_{}", id));
    assert_eq!(item["value"]["hash"], hash_secret(token));
    assert_eq!(item["value"]["status"], "active");
    assert_millis_timestamp(item["value"]["createdAt"].as_str().unwrap());
    assert_eq!(item["value"]["expiresAt"], body["expiresAt"]);
    assert!(!patches[0].to_string().contains(token), "plaintext must not be persisted");
}

#[tokio::test]
async fn test_issue_without_ttl_has_no_expiry() {
    let server = MockServer::start().await;
    mount_patch_ok(&server, 1).await;
    let app = app_for(&server);

    let (status, body) = send(&app, request("POST", json!({}))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body.get("expiresAt").is_none());
    let patches = patch_bodies(&server).await;
    assert!(patches[0]["items"][0]["value"].get("expiresAt").is_none());
}

#[tokio::test]
async fn test_issue_uses_supplied_secret() {
    let server = MockServer::start().await;
    mount_patch_ok(&server, 1).await;
    let app = app_for(&server);

    let (status, body) = send(&app, request("POST", json!({"token": "my-own-secret"}))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["token"], "my-own-secret");
    let patches = patch_bodies(&server).await;
    assert_eq!(
        patches[0]["items"][0]["value"]["hash"],
        hash_secret("my-own-secret")
    );
}

#[tokio::test]
async fn test_issue_generates_secret_for_empty_or_non_string_token() {
    let server = MockServer::start().await;
    mount_patch_ok(&server, 2).await;
    let app = app_for(&server);

    for supplied in [json!(""), json!(12345)] {
        let (status, body) = send(&app, request("POST", json!({"token": supplied}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["token"].as_str().unwrap().len(), 43);
    }
}

#[tokio::test]
async fn test_issue_with_invalid_ttl_writes_nothing() {
    let server = MockServer::start().await;
    mount_patch_ok(&server, 0).await;
    let app = app_for(&server);

    for ttl in [json!(-5), json!("abc"), json!(0)] {
        let (status, body) = send(&app, request("POST", json!({"ttlSeconds": ttl}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "ttl {}", ttl);
        assert_eq!(body["error"]["code"], "invalid_argument");
    }
}

#[tokio::test]
async fn test_issue_reports_store_failure_as_bad_request() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(500).set_body_string("edge config down"))
        .expect(1)
        .mount(&server)
        .await;
    let app = app_for(&server);

    let (status, body) = send(&app, request("POST", json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("500"), "{}", message);
    assert!(message.contains("edge config down"), "{}", message);
}

// ── Delete ───────────────────────────────────────────────────

#[tokio::test]
async fn test_delete_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(ITEMS_PATH))
        .and(body_json(json!({"items": [{"operation": "delete", "key": "token_never-existed"}]})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let app = app_for(&server);

    let (status, body) = send(&app, request("DELETE", json!({"id": "never-existed"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));
}

#[tokio::test]
async fn test_delete_requires_id() {
    let server = MockServer::start().await;
    mount_patch_ok(&server, 0).await;
    let app = app_for(&server);

    let (status, _) = send(&app, request("DELETE", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method("DELETE")
        .uri("/token")
        .header("authorization", format!("Bearer {}", ADMIN))
        .body(Body::from("definitely not json"))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Status ───────────────────────────────────────────────────

#[tokio::test]
async fn test_set_status_on_missing_token_is_not_found_without_write() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_patch_ok(&server, 0).await;
    let app = app_for(&server);

    let (status, body) = send(&app, request("PATCH", json!({"id": "ghost", "status": "disabled"}))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_set_status_coerces_unknown_values_to_active_and_preserves_fields() {
    let server = MockServer::start().await;
    mount_item(&server, "t1", stored_record("t1", "disabled")).await;
    mount_patch_ok(&server, 3).await;
    let app = app_for(&server);

    for raw in [json!("paused"), json!("Disabled"), json!(null)] {
        let (status, body) = send(&app, request("PATCH", json!({"id": "t1", "status": raw}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"id": "t1", "status": "active"}));
    }

    let patches = patch_bodies(&server).await;
    assert_eq!(patches[0]["items"][0]["value"], stored_record("t1", "active"));
}

#[tokio::test]
async fn test_set_status_writes_back_the_stored_record_untouched() {
    let server = MockServer::start().await;
    let mut record = stored_record("t3", "active");
    record["note"] = json!("owner=ops");
    record["scopes"] = json!(["read", "write"]);
    mount_item(&server, "t3", record.clone()).await;
    mount_patch_ok(&server, 1).await;
    let app = app_for(&server);

    let (status, _) = send(&app, request("PATCH", json!({"id": "t3", "status": "disabled"}))).await;
    assert_eq!(status, StatusCode::OK);

    let written = server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .find(|r| r.method.as_str() == "PATCH")
        .unwrap();
    let body = String::from_utf8(written.body).unwrap();
    assert!(body.contains(r#""createdAt":"2024-01-01T00:00:00.000Z""#), "{}", body);
    assert!(body.contains(r#""expiresAt":"2024-01-02T00:00:00.000Z""#), "{}", body);

    let mut expected = record;
    expected["status"] = json!("disabled");
    let sent: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        sent,
        json!({"items": [{"operation": "upsert", "key": "token_t3", "value": expected}]})
    );
}

#[tokio::test]
async fn test_set_status_updates_sparse_records() {
    let server = MockServer::start().await;
    mount_item(&server, "t4", json!({"id": "t4", "hash": "h", "status": "active"})).await;
    mount_patch_ok(&server, 1).await;
    let app = app_for(&server);

    let (status, body) = send(&app, request("PATCH", json!({"id": "t4", "status": "disabled"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": "t4", "status": "disabled"}));
    let patches = patch_bodies(&server).await;
    assert_eq!(
        patches[0]["items"][0]["value"],
        json!({"id": "t4", "hash": "h", "status": "disabled"})
    );
}

#[tokio::test]
async fn test_set_status_requires_id() {
    let server = MockServer::start().await;
    mount_patch_ok(&server, 0).await;
    let app = app_for(&server);

    let (status, _) = send(&app, request("PATCH", json!({"status": "disabled"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Show ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_show_exposes_digest_only() {
    let server = MockServer::start().await;
    mount_item(&server, "t2", stored_record("t2", "active")).await;
    let app = app_for(&server);

    let req = Request::builder()
        .uri("/token?id=t2")
        .header("authorization", format!("Bearer {}", ADMIN))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "t2");
    assert_eq!(body["hash"], hash_secret("original"));
    assert!(body.get("token").is_none());
}

// ── Configuration ────────────────────────────────────────────

#[tokio::test]
async fn test_missing_store_configuration_is_bad_request() {
    let config = Config {
        admin_token: Some(ADMIN.into()),
        ..Default::default()
    };
    let app = api::app(Arc::new(AppState::from_config(config).unwrap()));

    let (status, body) = send(&app, request("POST", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "configuration_missing");
}

// ── Full lifecycle ───────────────────────────────────────────

#[tokio::test]
async fn test_issue_disable_delete_lifecycle() {
    let server = MockServer::start().await;
    mount_patch_ok(&server, 3).await;
    let app = app_for(&server);

    let (status, issued) = send(&app, request("POST", json!({"ttlSeconds": 60}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(issued["status"], "active");
    assert_eq!(issued["token"].as_str().unwrap().len(), 43);
    let expires: DateTime<Utc> = issued["expiresAt"].as_str().unwrap().parse().unwrap();
    let remaining = (expires - Utc::now()).num_seconds();
    assert!((55..=60).contains(&remaining), "{}", remaining);

    let id = issued["id"].as_str().unwrap().to_string();
    let stored = patch_bodies(&server).await[0]["items"][0]["value"].clone();
    mount_item(&server, &id, stored).await;

    let (status, body) = send(&app, request("PATCH", json!({"id": id, "status": "disabled"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": id, "status": "disabled"}));

    let (status, body) = send(&app, request("DELETE", json!({"id": id}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    let patches = patch_bodies(&server).await;
    assert_eq!(patches.len(), 3);
    assert_eq!(patches[1]["items"][0]["value"]["status"], "disabled");
    assert_eq!(patches[2]["items"][0]["operation"], "delete");
}
