use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use filebox::{
    api::{self, handlers::SIGNATURE_HEADER},
    storage::models::PendingUpload,
    testutil::*,
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> (tempfile::TempDir, Arc<AppState>, Router) {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("data"));
    let router = api::create_router(Arc::clone(&state));
    (dir, state, router)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).method("GET");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn delete(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).method("DELETE");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, cookie: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn callback_request(body: &Value, signature: Option<String>) -> Request<Body> {
    let raw = body.to_string();
    let mut builder = Request::builder()
        .uri("/upload/callback")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(raw)).unwrap()
}

fn signed_callback(body: &Value) -> Request<Body> {
    let signature = callback_signature(body.to_string().as_bytes());
    callback_request(body, Some(signature))
}

fn completion_body(file_id: &str, key: &str, name: &str, size: u64, content_type: &str) -> Value {
    json!({
        "metadata": { "file_id": file_id },
        "file": {
            "name": name,
            "size": size,
            "type": content_type,
            "url": format!("{TEST_FILE_HOST}/f/{key}"),
        }
    })
}

/// Value of the named cookie in the response's Set-Cookie headers.
fn set_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| {
            let pair = v.split(';').next()?;
            let (k, value) = pair.split_once('=')?;
            (k == name).then(|| value.to_string())
        })
}

fn location(headers: &HeaderMap) -> String {
    headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Initiate and complete an upload as the given session; returns the file id.
async fn upload_as(router: &Router, cookie: &str, name: &str, size: u64, content_type: &str) -> String {
    let (status, _, body) = send(
        router,
        post_json(
            "/upload",
            Some(cookie),
            &json!({ "files": [{ "name": name, "size": size, "type": content_type }] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "initiate failed: {body}");

    let file_id = body["data"][0]["file_id"].as_str().unwrap().to_string();
    let key = body["data"][0]["key"].as_str().unwrap().to_string();

    let (status, _, body) = send(
        router,
        signed_callback(&completion_body(&file_id, &key, name, size, content_type)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "callback failed: {body}");

    file_id
}

// ============================================================================
// Session gate
// ============================================================================

#[tokio::test]
async fn test_session_requires_authentication() {
    let (_dir, _state, router) = setup();

    let (status, _, body) = send(&router, get("/session", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "fail");
    assert!(body["data"].get("sub").is_none());
}

#[tokio::test]
async fn test_session_with_unknown_cookie_is_rejected() {
    let (_dir, _state, router) = setup();

    let (status, _, _) = send(&router, get("/session", Some("filebox_session=forged"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_returns_user() {
    let (_dir, state, router) = setup();
    let session = create_session(&state, "alice");

    let (status, _, body) = send(&router, get("/session", Some(&cookie_header(&session)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sub"], "alice");
    assert_eq!(body["data"]["email"], "alice@example.com");
}

#[tokio::test]
async fn test_expired_session_is_rejected() {
    let (_dir, state, router) = setup();
    let mut session = create_session(&state, "alice");
    session.expires_at = Utc::now() - Duration::seconds(1);
    state.db.put_session(&session).unwrap();

    let (status, _, _) = send(&router, get("/files", Some(&cookie_header(&session)))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_reject_without_session() {
    let (_dir, state, router) = setup();
    let alice = create_session(&state, "alice");
    let file_id = upload_as(&router, &cookie_header(&alice), "a.txt", 10, "text/plain").await;

    for request in [
        get("/files", None),
        get("/files/stats", None),
        get(&format!("/files/{file_id}"), None),
        delete(&format!("/files/{file_id}"), None),
        post_json("/upload", None, &json!({ "files": [] })),
    ] {
        let (status, _, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["data"]["message"], "Authentication required");
    }

    assert!(state.db.get_file(&file_id).unwrap().is_some());
}

// ============================================================================
// Ownership
// ============================================================================

#[tokio::test]
async fn test_upload_and_delete_ownership_scenario() {
    let (_dir, state, router) = setup();
    let alice = cookie_header(&create_session(&state, "alice"));
    let bob = cookie_header(&create_session(&state, "bob"));

    let file_id = upload_as(&router, &alice, "report.csv", 500_000, "text/csv").await;

    let record = state.db.get_file(&file_id).unwrap().unwrap();
    assert_eq!(record.owner_id, "alice");
    assert_eq!(record.content_type.as_deref(), Some("text/csv"));
    assert_eq!(record.size, 500_000);

    // Another user cannot delete it, and cannot tell it exists
    let (status, _, body) = send(&router, delete(&format!("/files/{file_id}"), Some(&bob))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["message"], "File not found");
    assert!(state.db.get_file(&file_id).unwrap().is_some());

    // The owner can
    let (status, _, body) = send(&router, delete(&format!("/files/{file_id}"), Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (status, _, body) = send(&router, get("/files", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 0);
    assert_eq!(body["data"]["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_foreign_and_missing_files_look_identical() {
    let (_dir, state, router) = setup();
    let alice = cookie_header(&create_session(&state, "alice"));
    let bob = cookie_header(&create_session(&state, "bob"));
    let file_id = upload_as(&router, &alice, "pic.png", 2048, "image/png").await;

    let foreign = send(&router, get(&format!("/files/{file_id}"), Some(&bob))).await;
    let missing = send(&router, get("/files/does-not-exist", Some(&bob))).await;

    assert_eq!(foreign.0, StatusCode::NOT_FOUND);
    assert_eq!(missing.0, StatusCode::NOT_FOUND);
    assert_eq!(foreign.2, missing.2);
}

#[tokio::test]
async fn test_get_file_returns_signed_url() {
    let (_dir, state, router) = setup();
    let alice = cookie_header(&create_session(&state, "alice"));
    let file_id = upload_as(&router, &alice, "notes.md", 300, "text/markdown").await;

    let (status, _, body) = send(&router, get(&format!("/files/{file_id}"), Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], file_id.as_str());
    assert_eq!(body["data"]["name"], "notes.md");
    assert_eq!(body["data"]["kind"], "text");

    let signed = body["data"]["signed_url"].as_str().unwrap();
    assert!(signed.starts_with(&format!("{TEST_FILE_HOST}/f/{file_id}?expires=")));
    assert!(signed.contains("signature=hmac-sha256="));
}

#[tokio::test]
async fn test_list_files_is_scoped_and_paginated() {
    let (_dir, state, router) = setup();
    let alice = cookie_header(&create_session(&state, "alice"));
    let bob = cookie_header(&create_session(&state, "bob"));

    for i in 0..3 {
        upload_as(&router, &alice, &format!("a{i}.txt"), 10, "text/plain").await;
    }
    upload_as(&router, &bob, "b.txt", 10, "text/plain").await;

    let (status, _, body) = send(&router, get("/files?limit=2&offset=1", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["pagination"]["total"], 3);
    assert_eq!(body["data"]["pagination"]["limit"], 2);
    assert_eq!(body["data"]["pagination"]["offset"], 1);
    assert!(body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .all(|f| f["owner_id"] == "alice"));

    let (status, _, _) = send(&router, get("/files?limit=0", Some(&alice))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(&router, get("/files?limit=abc", Some(&alice))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");
}

#[tokio::test]
async fn test_file_stats() {
    let (_dir, state, router) = setup();
    let alice = cookie_header(&create_session(&state, "alice"));

    upload_as(&router, &alice, "a.png", 1000, "image/png").await;
    upload_as(&router, &alice, "b.csv", 500, "text/csv").await;

    let (status, _, body) = send(&router, get("/files/stats", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_files"], 2);
    assert_eq!(body["data"]["total_bytes"], 1500);
    assert_eq!(body["data"]["images"], 1);
    assert_eq!(body["data"]["text"], 1);
    assert_eq!(body["data"]["other"], 0);
    assert_eq!(body["data"]["recent"], 2);
}

// ============================================================================
// Uploads
// ============================================================================

#[tokio::test]
async fn test_initiate_upload_returns_presigned_url() {
    let (_dir, state, router) = setup();
    let alice = cookie_header(&create_session(&state, "alice"));

    let (status, _, body) = send(
        &router,
        post_json(
            "/upload",
            Some(&alice),
            &json!({ "files": [{ "name": "report.csv", "size": 500000 }] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let file_id = body["data"][0]["file_id"].as_str().unwrap();
    let upload_url = body["data"][0]["upload_url"].as_str().unwrap();
    assert!(upload_url.starts_with(&format!("https://ingest.test/{file_id}?")));

    let pending = state.db.get_pending_upload(file_id).unwrap().unwrap();
    assert_eq!(pending.owner_id, "alice");
    assert_eq!(pending.content_type.as_deref(), Some("text/csv"));
}

#[tokio::test]
async fn test_initiate_upload_validation() {
    let (_dir, state, router) = setup();
    let alice = cookie_header(&create_session(&state, "alice"));

    let cases = [
        (json!({ "files": [] }), StatusCode::BAD_REQUEST),
        (
            json!({ "files": [{ "name": "doc.pdf", "size": 10, "type": "application/pdf" }] }),
            StatusCode::BAD_REQUEST,
        ),
        (
            json!({ "files": [{ "name": "big.png", "size": 3 * 1024 * 1024, "type": "image/png" }] }),
            StatusCode::PAYLOAD_TOO_LARGE,
        ),
        (json!({ "nope": true }), StatusCode::BAD_REQUEST),
    ];

    for (body, expected) in cases {
        let (status, _, response) = send(&router, post_json("/upload", Some(&alice), &body)).await;
        assert_eq!(status, expected, "body {body} gave {response}");
        assert_eq!(response["status"], "fail");
    }
}

#[tokio::test]
async fn test_callback_rejects_bad_signature() {
    let (_dir, state, router) = setup();
    let alice = cookie_header(&create_session(&state, "alice"));

    let (_, _, body) = send(
        &router,
        post_json(
            "/upload",
            Some(&alice),
            &json!({ "files": [{ "name": "a.txt", "size": 5, "type": "text/plain" }] }),
        ),
    )
    .await;
    let file_id = body["data"][0]["file_id"].as_str().unwrap().to_string();
    let completion = completion_body(&file_id, &file_id, "a.txt", 5, "text/plain");

    let (status, _, _) = send(&router, callback_request(&completion, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = callback_signature(b"something else");
    let (status, _, _) = send(&router, callback_request(&completion, Some(forged))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(state.db.get_file(&file_id).unwrap().is_none());
    assert!(state.db.get_pending_upload(&file_id).unwrap().is_some());
}

#[tokio::test]
async fn test_callback_for_unknown_upload() {
    let (_dir, state, router) = setup();

    let completion = completion_body("never-initiated", "k", "a.txt", 5, "text/plain");
    let (status, _, _) = send(&router, signed_callback(&completion)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(state.db.get_file("never-initiated").unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_callback_does_not_overwrite() {
    let (_dir, state, router) = setup();
    let alice = cookie_header(&create_session(&state, "alice"));
    let file_id = upload_as(&router, &alice, "report.csv", 500_000, "text/csv").await;

    let replay = completion_body(&file_id, "other-key", "renamed.csv", 1, "text/csv");
    let (status, _, _) = send(&router, signed_callback(&replay)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let record = state.db.get_file(&file_id).unwrap().unwrap();
    assert_eq!(record.owner_id, "alice");
    assert_eq!(record.name, "report.csv");
    assert_eq!(record.storage_url, format!("{TEST_FILE_HOST}/f/{file_id}"));
}

#[tokio::test]
async fn test_callback_for_expired_upload_before_sweep() {
    let (_dir, state, router) = setup();
    state
        .db
        .put_pending_upload(&PendingUpload {
            file_id: "stale-file".to_string(),
            owner_id: "alice".to_string(),
            name: "a.txt".to_string(),
            size: 5,
            content_type: Some("text/plain".to_string()),
            created_at: Utc::now() - Duration::hours(2),
        })
        .unwrap();

    let completion = completion_body("stale-file", "stale-file", "a.txt", 5, "text/plain");
    let (status, _, body) = send(&router, signed_callback(&completion)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["message"], "File not found");
    assert!(state.db.get_file("stale-file").unwrap().is_none());
}

#[tokio::test]
async fn test_callback_keeps_declared_type_over_disallowed_report() {
    let (_dir, state, router) = setup();
    let alice = cookie_header(&create_session(&state, "alice"));

    let (_, _, body) = send(
        &router,
        post_json(
            "/upload",
            Some(&alice),
            &json!({ "files": [{ "name": "a.txt", "size": 5, "type": "text/plain" }] }),
        ),
    )
    .await;
    let file_id = body["data"][0]["file_id"].as_str().unwrap().to_string();

    let completion = completion_body(&file_id, &file_id, "a.txt", 5, "application/x-msdownload");
    let (status, _, body) = send(&router, signed_callback(&completion)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content_type"], "text/plain");

    let record = state.db.get_file(&file_id).unwrap().unwrap();
    assert_eq!(record.content_type.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn test_initiate_batch_binds_every_file() {
    let (_dir, state, router) = setup();
    let alice = cookie_header(&create_session(&state, "alice"));

    let (status, _, body) = send(
        &router,
        post_json(
            "/upload",
            Some(&alice),
            &json!({ "files": [
                { "name": "a.png", "size": 10 },
                { "name": "b.txt", "size": 20 },
            ] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    for item in items {
        let file_id = item["file_id"].as_str().unwrap();
        let pending = state.db.get_pending_upload(file_id).unwrap().unwrap();
        assert_eq!(pending.owner_id, "alice");
    }
}

#[tokio::test]
async fn test_callback_with_malformed_body() {
    let (_dir, _state, router) = setup();
    let body = json!({ "metadata": {} });

    let (status, _, response) = send(&router, signed_callback(&body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["status"], "fail");
}

// ============================================================================
// Login flow
// ============================================================================

#[tokio::test]
async fn test_login_redirects_with_state_cookie() {
    let (_dir, _state, router) = setup();

    let (status, headers, _) = send(&router, get("/login?screen_hint=signup", None)).await;
    assert_eq!(status, StatusCode::SEE_OTHER);

    let state_value = set_cookie_value(&headers, "filebox_auth_state").unwrap();
    let target = location(&headers);
    assert!(target.starts_with("https://idp.test/authorize?"));
    assert!(target.contains(&format!("state={state_value}")));
    assert!(target.contains("screen_hint=signup"));
}

#[tokio::test]
async fn test_full_login_and_logout() {
    let (_dir, _state, router) = setup();

    let (_, headers, _) = send(&router, get("/login", None)).await;
    let oauth_state = set_cookie_value(&headers, "filebox_auth_state").unwrap();

    let (status, headers, _) = send(
        &router,
        get(
            &format!("/callback?code=code-alice&state={oauth_state}"),
            Some(&format!("filebox_auth_state={oauth_state}")),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/upload");

    let set_cookies: Vec<String> = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect();
    let session_cookie = set_cookies
        .iter()
        .find(|c| c.starts_with("filebox_session="))
        .unwrap();
    assert!(session_cookie.contains("HttpOnly"));
    assert!(session_cookie.contains("SameSite=Lax"));
    assert!(session_cookie.contains("Max-Age=604800"));

    let session_id = set_cookie_value(&headers, "filebox_session").unwrap();
    let cookie = format!("filebox_session={session_id}");

    let (status, _, body) = send(&router, get("/session", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sub"], "alice");

    let (status, headers, _) = send(&router, get("/logout", Some(&cookie))).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "https://idp.test/v2/logout");
    assert_eq!(
        set_cookie_value(&headers, "filebox_session").as_deref(),
        Some("")
    );

    // The server-side session is gone even if the browser replays the old cookie
    let (status, _, _) = send(&router, get("/session", Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_callback_error_redirects() {
    let (_dir, _state, router) = setup();

    let (status, headers, _) = send(&router, get("/callback", None)).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/?error=no_code");

    let (_, headers, _) = send(
        &router,
        get(
            "/callback?code=code-alice&state=wrong",
            Some("filebox_auth_state=right"),
        ),
    )
    .await;
    assert_eq!(location(&headers), "/?error=invalid_state");

    let (_, headers, _) = send(&router, get("/callback?code=code-alice&state=s", None)).await;
    assert_eq!(location(&headers), "/?error=invalid_state");

    let (_, headers, _) = send(
        &router,
        get(
            "/callback?code=code-mallory&state=s",
            Some("filebox_auth_state=s"),
        ),
    )
    .await;
    assert_eq!(location(&headers), "/?error=auth_failed");
    assert!(set_cookie_value(&headers, "filebox_session").is_none());
}

#[tokio::test]
async fn test_health() {
    let (_dir, _state, router) = setup();

    let (status, _, body) = send(&router, get("/_internal/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}
