use std::time::Duration;

use rama::http::{
    Body, BodyExtractExt as _, StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde_json::{Value, json};

use super::*;

const BOUNDARY: &str = "printapi-mock-boundary";

fn new_state() -> MockState {
    MockState::new(UploadRouteConfig::default())
}

fn get(path: &str) -> Request {
    Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

fn post_json(path: &str, payload: Value) -> Request {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn upload(method: &str, path: &str, file_name: &str, content: &str) -> Request {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/pdf\r\n\r\n\
         {content}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method(method)
        .uri(path)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::from(body))
        .unwrap()
}

async fn serve(state: &MockState, req: Request) -> Response {
    web_svc(state.clone()).serve(req).await.unwrap()
}

async fn serve_json(state: &MockState, req: Request) -> (StatusCode, Value) {
    let resp = serve(state, req).await;
    let status = resp.status();
    let payload: Value = resp.try_into_json().await.unwrap();
    (status, payload)
}

#[tokio::test]
#[tracing_test::traced_test]
async fn normal_upload_is_accepted_and_recorded() {
    let state = new_state();

    let (status, payload) = serve_json(
        &state,
        upload("POST", "/upload", "doc.pdf", "%PDF-1.4 hello"),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(
        json!({ "ok": true, "message": "PDF received", "filename": "doc.pdf" }),
        payload
    );

    let (status, inbox) = serve_json(&state, get("/api/inbox")).await;
    assert_eq!(StatusCode::OK, status);

    let entries = inbox.as_array().unwrap();
    assert_eq!(1, entries.len());
    let entry = &entries[0];
    assert_eq!("POST", entry["method"]);
    assert_eq!("/upload", entry["path"]);
    assert_eq!("doc.pdf", entry["fileName"]);
    assert_eq!(14, entry["fileSize"]);
    assert_eq!(true, entry["hasAuth"]);
    assert_eq!(200, entry["responseStatus"]);
    assert_eq!("normal", entry["chaosMode"]);
    assert_eq!(Value::Null, entry["note"]);
    assert!(logs_contain("upload request recorded (mode: normal)"));
}

#[tokio::test]
async fn error_mode_uses_phrase_for_code() {
    let state = new_state();

    let (status, behavior) = serve_json(
        &state,
        post_json("/api/behavior", json!({ "mode": "error", "errorCode": 503 })),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(
        json!({ "mode": "error", "errorCode": 503, "errorMessage": null, "delayMs": 0 }),
        behavior
    );

    let (status, payload) =
        serve_json(&state, upload("POST", "/upload", "doc.pdf", "%PDF")).await;
    assert_eq!(StatusCode::SERVICE_UNAVAILABLE, status);
    assert_eq!(json!({ "error": "Service Unavailable" }), payload);

    let entries = state.inbox.list();
    assert_eq!(1, entries.len());
    assert_eq!(503, entries[0].response_status);
    assert_eq!(Some("chaos: Service Unavailable"), entries[0].note.as_deref());
    assert_eq!(crate::chaos::ChaosMode::Error, entries[0].chaos_mode);
}

#[tokio::test]
async fn error_mode_with_custom_message() {
    let state = new_state();

    let (status, _) = serve_json(
        &state,
        post_json(
            "/api/behavior",
            json!({ "mode": "error", "errorCode": 400, "errorMessage": "Invalid PDF" }),
        ),
    )
    .await;
    assert_eq!(StatusCode::OK, status);

    let (status, payload) =
        serve_json(&state, upload("POST", "/upload", "doc.pdf", "%PDF")).await;
    assert_eq!(StatusCode::BAD_REQUEST, status);
    assert_eq!(json!({ "error": "Invalid PDF" }), payload);
    assert_eq!(
        Some("chaos: Invalid PDF"),
        state.inbox.list()[0].note.as_deref()
    );
}

#[tokio::test(start_paused = true)]
async fn timeout_mode_never_answers() {
    let state = new_state();

    let (status, _) = serve_json(
        &state,
        post_json("/api/behavior", json!({ "mode": "timeout" })),
    )
    .await;
    assert_eq!(StatusCode::OK, status);

    let result = tokio::time::timeout(
        Duration::from_secs(30),
        serve(&state, upload("POST", "/upload", "doc.pdf", "%PDF")),
    )
    .await;
    assert!(result.is_err(), "expected no response in timeout mode");

    let entries = state.inbox.list();
    assert_eq!(1, entries.len());
    assert_eq!(0, entries[0].response_status);
    assert_eq!(
        Some("timeout (no response sent)"),
        entries[0].note.as_deref()
    );
    assert_eq!(crate::chaos::ChaosMode::Timeout, entries[0].chaos_mode);
}

#[tokio::test(start_paused = true)]
async fn delay_is_applied_in_normal_mode() {
    let state = new_state();

    let (status, _) = serve_json(
        &state,
        post_json("/api/behavior", json!({ "mode": "normal", "delayMs": 1000 })),
    )
    .await;
    assert_eq!(StatusCode::OK, status);

    let start = tokio::time::Instant::now();
    let resp = serve(&state, upload("POST", "/upload", "doc.pdf", "%PDF")).await;
    assert_eq!(StatusCode::OK, resp.status());
    assert!(start.elapsed() >= Duration::from_millis(1000));
}

#[tokio::test]
#[tracing_test::traced_test]
async fn invalid_mode_is_rejected() {
    let state = new_state();

    let (status, payload) = serve_json(
        &state,
        post_json("/api/behavior", json!({ "mode": "chaos", "delayMs": 10 })),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, status);
    assert_eq!(
        json!({ "error": "mode must be normal, error, or timeout" }),
        payload
    );

    let (_, behavior) = serve_json(&state, get("/api/behavior")).await;
    assert_eq!(
        json!({ "mode": "normal", "errorCode": 500, "errorMessage": null, "delayMs": 0 }),
        behavior
    );
    assert!(logs_contain("reject behavior update"));
}

#[tokio::test]
async fn informational_error_code_falls_back_to_500() {
    let state = new_state();

    let (status, behavior) = serve_json(
        &state,
        post_json("/api/behavior", json!({ "mode": "error", "errorCode": 101 })),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(500, behavior["errorCode"]);

    let (status, payload) =
        serve_json(&state, upload("POST", "/upload", "doc.pdf", "%PDF")).await;
    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, status);
    assert_eq!(json!({ "error": "Internal Server Error" }), payload);
    assert_eq!(500, state.inbox.list()[0].response_status);
}

#[tokio::test]
async fn partial_behavior_update_keeps_other_fields() {
    let state = new_state();

    serve_json(
        &state,
        post_json(
            "/api/behavior",
            json!({ "mode": "error", "errorCode": 502, "delayMs": 25 }),
        ),
    )
    .await;
    let (status, behavior) = serve_json(
        &state,
        post_json("/api/behavior", json!({ "errorMessage": "Upstream down" })),
    )
    .await;

    assert_eq!(StatusCode::OK, status);
    assert_eq!(
        json!({ "mode": "error", "errorCode": 502, "errorMessage": "Upstream down", "delayMs": 25 }),
        behavior
    );
}

#[tokio::test]
async fn reset_restores_defaults() {
    let state = new_state();

    serve_json(
        &state,
        post_json(
            "/api/behavior",
            json!({ "mode": "timeout", "errorCode": 404, "errorMessage": "gone", "delayMs": 300 }),
        ),
    )
    .await;

    let (status, behavior) =
        serve_json(&state, post_json("/api/behavior/reset", json!({}))).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(
        json!({ "mode": "normal", "errorCode": 500, "errorMessage": null, "delayMs": 0 }),
        behavior
    );

    let (_, behavior) = serve_json(&state, get("/api/behavior")).await;
    assert_eq!("normal", behavior["mode"]);
}

#[tokio::test]
async fn inbox_is_newest_first_and_can_be_cleared() {
    let state = new_state();

    for file_name in ["first.pdf", "second.pdf", "third.pdf"] {
        let resp = serve(&state, upload("POST", "/upload", file_name, "%PDF")).await;
        assert_eq!(StatusCode::OK, resp.status());
    }

    let (_, inbox) = serve_json(&state, get("/api/inbox")).await;
    let names: Vec<_> = inbox
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["fileName"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(vec!["third.pdf", "second.pdf", "first.pdf"], names);

    let (status, payload) =
        serve_json(&state, post_json("/api/inbox/clear", json!({}))).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(json!({ "ok": true }), payload);

    let (_, inbox) = serve_json(&state, get("/api/inbox")).await;
    assert_eq!(json!([]), inbox);
}

#[tokio::test]
async fn health_and_ping() {
    let state = new_state();

    for (path, expected) in [
        ("/health", json!({ "status": "ok" })),
        ("/printapi/ping", json!({ "status": "ok", "message": "pong" })),
    ] {
        let (status, payload) = serve_json(&state, get(path)).await;
        assert_eq!(StatusCode::OK, status, "path: {path}");
        assert_eq!(expected, payload, "path: {path}");
    }

    assert!(state.inbox.is_empty(), "control requests are not recorded");
}

#[tokio::test]
async fn routes_reports_default_upload_route() {
    let state = new_state();

    let (status, payload) = serve_json(&state, get("/api/routes")).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(
        json!({ "upload": { "method": "POST", "paths": ["/upload"] } }),
        payload
    );
}

#[tokio::test]
async fn control_panel_is_served_as_html() {
    let state = new_state();

    let resp = serve(&state, get("/")).await;
    assert_eq!(StatusCode::OK, resp.status());
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    assert!(content_type.starts_with("text/html"), "{content_type}");

    let page = resp.try_into_string().await.unwrap();
    assert!(page.contains("/api/behavior"));
    assert!(page.contains("/api/inbox"));
}

#[tokio::test]
#[tracing_test::traced_test]
async fn configured_upload_routes() {
    let state = MockState::new(UploadRouteConfig::from_json(
        r#"{"upload": {"method": "PUT", "paths": ["/printapi/upload", "v2/upload"]}}"#,
    ));

    for path in ["/printapi/upload", "/v2/upload"] {
        let resp = serve(&state, upload("PUT", path, "doc.pdf", "%PDF")).await;
        assert_eq!(StatusCode::OK, resp.status(), "path: {path}");
    }

    let resp = serve(&state, upload("POST", "/printapi/upload", "doc.pdf", "%PDF")).await;
    assert_ne!(StatusCode::OK, resp.status());
    let resp = serve(&state, upload("PUT", "/upload", "doc.pdf", "%PDF")).await;
    assert_eq!(StatusCode::NOT_FOUND, resp.status());

    let entries = state.inbox.list();
    assert_eq!(2, entries.len());
    assert_eq!("/v2/upload", entries[0].path);
    assert_eq!("PUT", entries[0].method);
    assert_eq!("/printapi/upload", entries[1].path);

    let (_, payload) = serve_json(&state, get("/api/routes")).await;
    assert_eq!(
        json!({ "upload": { "method": "PUT", "paths": ["/printapi/upload", "/v2/upload"] } }),
        payload
    );
    assert!(logs_contain("bind upload responder to: PUT /printapi/upload"));
    assert!(logs_contain("bind upload responder to: PUT /v2/upload"));
}

#[tokio::test]
async fn control_api_paths_cannot_be_taken_by_upload_route() {
    let state = MockState::new(UploadRouteConfig::from_json(
        r#"{"upload": {"method": "GET", "paths": ["/health", "/api/inbox"]}}"#,
    ));

    let (status, payload) = serve_json(&state, get("/health")).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(json!({ "status": "ok" }), payload);

    let (_, payload) = serve_json(&state, get("/api/routes")).await;
    assert_eq!(
        json!({ "upload": { "method": "GET", "paths": ["/upload"] } }),
        payload
    );

    let resp = serve(&state, get("/upload")).await;
    assert_eq!(StatusCode::OK, resp.status());
    assert_eq!(1, state.inbox.len());
}
