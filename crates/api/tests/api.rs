//! End-to-end tests of the record service over an in-memory store.

use std::sync::Arc;

use api::{router, AppState};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use db::MemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    router(AppState::new(Arc::new(MemoryStore::new())))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

fn start_node(trigger: &str, cron: Option<&str>) -> Value {
    json!({
        "id": "start", "type": "start", "name": "Start",
        "config": { "trigger": trigger, "triggerCron": cron },
    })
}

async fn create_access(app: &Router, body: Value) -> String {
    let (status, created) = send(app, "POST", "/api/accesses", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    created["id"].as_str().unwrap().to_string()
}

/// Creates the accesses and a manual workflow: start → apply → deploy(local).
async fn renewal_workflow(app: &Router) -> (String, String) {
    let dns = create_access(
        app,
        json!({ "name": "aliyun", "provider": "aliyun", "usage": "apply",
                "config": { "accessKeyId": "id", "accessKeySecret": "secret" } }),
    )
    .await;
    let host = create_access(
        app,
        json!({ "name": "this host", "provider": "local", "usage": "deploy", "config": {} }),
    )
    .await;

    let content = json!({
        "root": "start",
        "nodes": [
            { "id": "start", "type": "start", "name": "Start", "config": { "trigger": "manual" }, "next": "apply" },
            { "id": "apply", "type": "apply", "name": "Apply", "next": "deploy", "config": {
                "domains": "example.com", "contactEmail": "ops@example.com",
                "provider": "aliyun-dns", "providerAccessId": dns, "keyAlgorithm": "RSA2048" } },
            { "id": "deploy", "type": "deploy", "name": "Deploy", "validated": true, "config": {
                "certificate": "apply#certificate", "provider": "local", "providerAccessId": host,
                "providerConfig": { "format": "PEM", "certPath": "/etc/ssl/a.crt", "keyPath": "/etc/ssl/a.key" } } },
        ],
    });
    let (status, created) = send(
        app,
        "POST",
        "/api/workflows",
        Some(json!({ "name": "renew example.com", "trigger": "manual", "content": content })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    (created["id"].as_str().unwrap().to_string(), host)
}

#[tokio::test]
async fn workflow_listing_pages_and_filters() {
    let app = app();
    for i in 0..3 {
        let body = json!({ "name": format!("wf-{i}"), "trigger": "manual" });
        assert_eq!(send(&app, "POST", "/api/workflows", Some(body)).await.0, StatusCode::CREATED);
    }

    let (status, page) = send(&app, "GET", "/api/workflows?page=1&perPage=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalItems"], 3);
    assert_eq!(page["perPage"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["items"][0]["name"], "wf-2");

    let (_, page) = send(&app, "GET", "/api/workflows?enabled=true", None).await;
    assert_eq!(page["totalItems"], 0);
}

#[tokio::test]
async fn enabling_auto_workflow_with_three_field_cron_is_409() {
    let app = app();
    let content = json!({ "root": "start", "nodes": [start_node("auto", Some("* * *"))] });
    let (_, created) = send(
        &app,
        "POST",
        "/api/workflows",
        Some(json!({ "name": "nightly", "trigger": "auto", "triggerCron": "* * *", "content": content })),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, body) =
        send(&app, "PATCH", &format!("/api/workflows/{id}"), Some(json!({ "enabled": true }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 409);
    assert_eq!(body["errors"]["fields"][0]["field"], "triggerCron");

    let (_, stored) = send(&app, "GET", &format!("/api/workflows/{id}"), None).await;
    assert_eq!(stored["enabled"], false);
}

#[tokio::test]
async fn enabling_configured_workflow_persists() {
    let app = app();
    let (id, _) = renewal_workflow(&app).await;

    let (status, body) =
        send(&app, "PATCH", &format!("/api/workflows/{id}"), Some(json!({ "enabled": true }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["enabled"], true);

    let (_, page) = send(&app, "GET", "/api/workflows?enabled=true", None).await;
    assert_eq!(page["totalItems"], 1);

    let (status, cards) = send(&app, "GET", &format!("/api/workflows/{id}/nodes"), None).await;
    assert_eq!(status, StatusCode::OK);
    let cards = cards.as_array().unwrap();
    assert_eq!(cards.len(), 3);
    assert!(cards.iter().all(|c| c["validated"] == true));
}

#[tokio::test]
async fn created_tree_content_reads_back_as_returned() {
    let app = app();
    let tree = json!({
        "id": "start", "type": "start", "name": "Start",
        "config": { "trigger": "manual" },
        "inputs": [],
        "next": { "id": "n", "type": "notify", "name": "Notify", "outputs": [{ "name": "x" }] },
    });
    let (status, created) = send(
        &app,
        "POST",
        "/api/workflows",
        Some(json!({ "name": "tree", "trigger": "manual", "content": tree })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");

    let (_, fetched) = send(&app, "GET", &format!("/api/workflows/{}", created["id"].as_str().unwrap()), None).await;
    assert_eq!(fetched["content"], created["content"]);

    let nodes = fetched["content"]["nodes"].as_array().unwrap();
    let notify = nodes.iter().find(|n| n["id"] == "n").unwrap();
    assert_eq!(notify["outputs"], json!([{ "name": "x" }]));
    let start = nodes.iter().find(|n| n["id"] == "start").unwrap();
    assert_eq!(start["inputs"], json!([]));
    assert_eq!(start["next"], "n");
}

#[tokio::test]
async fn patched_tree_content_replaces_the_stored_graph() {
    let app = app();
    let (id, _) = renewal_workflow(&app).await;
    let uri = format!("/api/workflows/{id}");

    let tree = json!({
        "id": "start", "type": "start", "name": "Start",
        "config": { "trigger": "manual" },
        "next": { "id": "n", "type": "notify", "name": "Notify" },
    });
    let (status, patched) = send(&app, "PATCH", &uri, Some(json!({ "content": tree }))).await;
    assert_eq!(status, StatusCode::OK, "{patched}");

    let (_, fetched) = send(&app, "GET", &uri, None).await;
    assert_eq!(fetched["content"], patched["content"]);
    let ids: Vec<&str> =
        fetched["content"]["nodes"].as_array().unwrap().iter().map(|n| n["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["n", "start"]);
}

#[tokio::test]
async fn referenced_access_cannot_be_deleted() {
    let app = app();
    let (id, host) = renewal_workflow(&app).await;

    let (status, body) = send(&app, "DELETE", &format!("/api/accesses/{host}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errors"]["workflows"][0], id.as_str());

    assert_eq!(send(&app, "DELETE", &format!("/api/workflows/{id}"), None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(send(&app, "DELETE", &format!("/api/accesses/{host}"), None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(send(&app, "DELETE", &format!("/api/accesses/{host}"), None).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn access_payloads_are_validated_server_side() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/accesses",
        Some(json!({ "name": "bp", "provider": "byteplus", "usage": "deploy",
                     "config": { "accessKey": "", "secretKey": "s" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "accessKey");

    let (status, body) = send(
        &app,
        "POST",
        "/api/accesses",
        Some(json!({ "name": "x", "provider": "carrier-pigeon", "usage": "all", "config": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "provider");
}

#[tokio::test]
async fn reported_runs_refresh_the_last_run_cache() {
    let app = app();
    let (_, created) =
        send(&app, "POST", "/api/workflows", Some(json!({ "name": "wf", "trigger": "manual" }))).await;
    let id = created["id"].as_str().unwrap();

    let (status, run) = send(
        &app,
        "POST",
        &format!("/api/workflows/{id}/runs"),
        Some(json!({ "status": "succeeded", "trigger": "manual", "startedAt": chrono::Utc::now() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{run}");

    let (_, stored) = send(&app, "GET", &format!("/api/workflows/{id}"), None).await;
    assert_eq!(stored["lastRunId"], run["id"]);
    assert_eq!(stored["lastRunStatus"], "succeeded");

    let (_, runs) = send(&app, "GET", &format!("/api/workflows/{id}/runs"), None).await;
    assert_eq!(runs.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/workflows/{id}/runs"),
        Some(json!({ "status": "vanished", "trigger": "manual", "startedAt": chrono::Utc::now() })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn provider_catalog_filters_by_usage() {
    let app = app();
    let (status, catalog) = send(&app, "GET", "/api/providers?usage=apply", None).await;
    assert_eq!(status, StatusCode::OK);
    let accesses = catalog["accesses"].as_array().unwrap();
    assert!(accesses.iter().all(|a| a["usage"] == "apply" || a["usage"] == "all"));
    assert!(accesses.iter().all(|a| a["provider"] != "local"));
    assert!(!catalog["applyDns"].as_array().unwrap().is_empty());

    let (status, _) = send(&app, "GET", "/api/providers?usage=sometimes", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_requests_get_the_error_envelope() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/workflows")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], 400);

    let (status, _) = send(&app, "POST", "/api/workflows", Some(json!({ "trigger": "manual" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::new_v4();
    let (status, body) = send(&app, "GET", &format!("/api/workflows/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}
